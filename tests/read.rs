mod common;

use std::fs;

use common::*;
use quantools::{
    format,
    nrrd::{self, Encoding, WriteOptions},
    volume::Volume,
    zarr,
};
use serde_json::json;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_zarr_float_array() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("maps.zarr");
    write_zarr_array(&store, "T1", &SHAPE, "float32", &f32_bytes(&T1));

    let volume = zarr::read_array(&store, "/T1").unwrap();
    assert_eq!(volume.shape(), SHAPE);
    assert!(volume.get(&[1, 1, 1]).is_some_and(|&v| close(v, 3.5)));
    assert!(volume.get(&[0, 0, 1]).is_some_and(|&v| close(v, 1.1)));

    let through_registry = format::read_volume(&store.join("T1")).unwrap();
    assert_eq!(through_registry, volume);
}

#[test]
fn test_zarr_mask() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("masks.zarr");
    write_zarr_array(&store, "lesion", &SHAPE, "uint8", &LESION);

    let mask = format::read_volume(&store.join("lesion")).unwrap().to_mask();
    assert_eq!(mask.count(), 2);
    assert_eq!(mask.get(&[1, 1, 0]), Some(&true));
}

#[test]
fn test_zarr_missing_array() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("maps.zarr");
    write_zarr_array(&store, "T1", &SHAPE, "float32", &f32_bytes(&T1));
    assert!(zarr::read_array(&store, "/T2").is_err());
}

#[test]
fn test_zarr_v2_array() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("legacy.zarr");
    write_zarr_v2_array(&store, "T2", &SHAPE, "<f4", &f32_bytes(&T2));

    let volume = format::read_volume(&store.join("T2")).unwrap();
    assert_eq!(volume.shape(), SHAPE);
    assert!(volume.get(&[1, 1, 1]).is_some_and(|&v| close(v, 0.4)));
    assert!(volume.get(&[0, 1, 0]).is_some_and(|&v| close(v, 0.07)));
}

#[test]
fn test_zarr_gzip_codec() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("maps.zarr");
    let codecs = json!([
        bytes_codec("float32"),
        {"name": "gzip", "configuration": {"level": 5}}
    ]);
    let chunk = gzip(&f32_bytes(&M0));
    write_zarr_array_with_codecs(&store, "M0", &SHAPE, "float32", codecs, &chunk);

    let volume = zarr::read_array(&store, "/M0").unwrap();
    assert_eq!(volume.shape(), SHAPE);
    assert!(volume.get(&[0, 0, 0]).is_some_and(|&v| close(v, 10.0)));
    assert!(volume.get(&[1, 1, 1]).is_some_and(|&v| close(v, 31.0)));
}

#[test]
fn test_zarr_bool_mask() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("masks.zarr");
    write_zarr_array(&store, "lesion", &SHAPE, "bool", &LESION);

    let volume = zarr::read_array(&store, "/lesion").unwrap();
    assert_eq!(volume.as_slice(), [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
    assert_eq!(volume.to_mask().count(), 2);
}

#[test]
fn test_zarr_64_bit_integers() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("labels.zarr");

    let signed: Vec<i64> = vec![-3, -2, -1, 0, 1, 2, 3, 1 << 40];
    let bytes: Vec<u8> = signed.iter().flat_map(|v| v.to_le_bytes()).collect();
    write_zarr_array(&store, "signed", &SHAPE, "int64", &bytes);
    let volume = zarr::read_array(&store, "/signed").unwrap();
    assert_eq!(volume.get(&[0, 0, 0]), Some(&-3.0));
    assert_eq!(volume.get(&[1, 1, 1]), Some(&1_099_511_627_776.0));

    let unsigned: Vec<u64> = (0..8).map(|v| v * 1000).collect();
    let bytes: Vec<u8> = unsigned.iter().flat_map(|v| v.to_le_bytes()).collect();
    write_zarr_array(&store, "unsigned", &SHAPE, "uint64", &bytes);
    let volume = zarr::read_array(&store, "/unsigned").unwrap();
    assert_eq!(volume.get(&[1, 0, 1]), Some(&5000.0));
    assert_eq!(volume.min_max(), Some((0.0, 7000.0)));
}

#[test]
fn test_nrrd_gzip_with_key_values() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t1.nrrd");
    let volume = Volume::new(SHAPE.to_vec(), T1.to_vec()).unwrap();
    let options = WriteOptions {
        encoding: Encoding::Gzip,
        key_values: vec![
            ("modality".into(), "T1 map".into()),
            ("sequence".into(), "SPACE".into()),
        ],
    };
    nrrd::write(&path, &volume, &options).unwrap();

    let (header, read) = nrrd::read(&path).unwrap();
    assert_eq!(header.encoding, Encoding::Gzip);
    assert_eq!(header.key_values.get("modality").map(String::as_str), Some("T1 map"));
    assert_eq!(header.key_values.get("sequence").map(String::as_str), Some("SPACE"));
    assert_eq!(read.shape(), SHAPE);
    for (&a, &b) in read.as_slice().iter().zip(T1.iter()) {
        assert_eq!(a, f64::from(b));
    }
}

#[test]
fn test_nrrd_attached() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.nrrd");
    let data: Vec<i16> = (0..24).collect();
    write_nrrd(&path, &[2, 3, 4], data);

    let (header, volume) = nrrd::read(&path).unwrap();
    assert_eq!(header.sizes, vec![4, 3, 2]);
    assert_eq!(volume.shape(), [2, 3, 4]);
    assert_eq!(volume.get(&[1, 2, 3]), Some(&23.0));
    assert_eq!(format::read_volume(&path).unwrap(), volume);
}

#[test]
fn test_nrrd_detached() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let values: Vec<u8> = (0..6).map(|v| v * 10).collect();
    fs::write(dir.path().join("mask.raw"), &values).unwrap();
    fs::write(
        dir.path().join("mask.nhdr"),
        "NRRD0004\ntype: uchar\ndimension: 2\nsizes: 3 2\nencoding: raw\ndata file: mask.raw\n",
    )
    .unwrap();

    let volume = format::read_volume(&dir.path().join("mask.nhdr")).unwrap();
    assert_eq!(volume.shape(), [2, 3]);
    assert_eq!(volume.get(&[1, 0]), Some(&30.0));
}

#[test]
fn test_unknown_format() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("volume.mha");
    fs::write(&path, b"").unwrap();
    let err = format::read_volume(&path).unwrap_err();
    assert!(err.to_string().contains("nrrd"));
}
