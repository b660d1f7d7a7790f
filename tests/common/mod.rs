#![allow(dead_code)]
use std::{fs, io::Write, path::Path};

use flate2::{Compression, write::GzEncoder};

use quantools::{
    nrrd::{self, NrrdElement, WriteOptions},
    volume::Volume,
};
use serde_json::{Value, json};

pub fn init_logging() {
    env_logger::try_init().ok();
}

/// Write a single-chunk zarr v3 array at `store/name`.
pub fn write_zarr_array(store: &Path, name: &str, shape: &[usize], data_type: &str, bytes: &[u8]) {
    let codecs = json!([bytes_codec(data_type)]);
    write_zarr_array_with_codecs(store, name, shape, data_type, codecs, bytes);
}

/// The `bytes` codec for `data_type`; single-byte types carry no endianness.
pub fn bytes_codec(data_type: &str) -> Value {
    if data_type.ends_with('8') || data_type == "bool" {
        json!({"name": "bytes"})
    } else {
        json!({"name": "bytes", "configuration": {"endian": "little"}})
    }
}

/// Write a single-chunk zarr v3 array whose chunk is `chunk`, already encoded by `codecs`.
pub fn write_zarr_array_with_codecs(
    store: &Path,
    name: &str,
    shape: &[usize],
    data_type: &str,
    codecs: Value,
    chunk: &[u8],
) {
    let root = store.join("zarr.json");
    if !root.exists() {
        fs::create_dir_all(store).unwrap();
        let group = json!({"zarr_format": 3, "node_type": "group", "attributes": {}});
        fs::write(&root, serde_json::to_vec_pretty(&group).unwrap()).unwrap();
    }

    let array_dir = store.join(name);
    let fill_value = if data_type.starts_with("float") {
        json!(0.0)
    } else if data_type == "bool" {
        json!(false)
    } else {
        json!(0)
    };
    let metadata = json!({
        "zarr_format": 3,
        "node_type": "array",
        "shape": shape,
        "data_type": data_type,
        "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": shape}},
        "chunk_key_encoding": {"name": "default", "configuration": {"separator": "/"}},
        "fill_value": fill_value,
        "codecs": codecs,
        "attributes": {}
    });
    let mut chunk_path = array_dir.join("c");
    for _ in shape {
        chunk_path.push("0");
    }
    fs::create_dir_all(chunk_path.parent().unwrap()).unwrap();
    fs::write(array_dir.join("zarr.json"), serde_json::to_vec_pretty(&metadata).unwrap()).unwrap();
    fs::write(chunk_path, chunk).unwrap();
}

/// Write a single-chunk, uncompressed zarr v2 array at `store/name`.
/// `dtype` is a numpy type string such as `<f4`.
pub fn write_zarr_v2_array(store: &Path, name: &str, shape: &[usize], dtype: &str, bytes: &[u8]) {
    let group = store.join(".zgroup");
    if !group.exists() {
        fs::create_dir_all(store).unwrap();
        fs::write(&group, serde_json::to_vec(&json!({"zarr_format": 2})).unwrap()).unwrap();
    }

    let array_dir = store.join(name);
    fs::create_dir_all(&array_dir).unwrap();
    let metadata = json!({
        "zarr_format": 2,
        "shape": shape,
        "chunks": shape,
        "dtype": dtype,
        "compressor": null,
        "fill_value": 0,
        "order": "C",
        "filters": null
    });
    fs::write(array_dir.join(".zarray"), serde_json::to_vec_pretty(&metadata).unwrap()).unwrap();
    let key = vec!["0"; shape.len()].join(".");
    fs::write(array_dir.join(key), bytes).unwrap();
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn write_nrrd<T: NrrdElement>(path: &Path, shape: &[usize], data: Vec<T>) {
    let volume = Volume::new(shape.to_vec(), data).unwrap();
    nrrd::write(path, &volume, &WriteOptions::default()).unwrap();
}

pub const SHAPE: [usize; 3] = [2, 2, 2];
pub const T1: [f32; 8] = [1.0, 1.1, 1.2, 2.0, 2.1, 2.2, 3.0, 3.5];
pub const T2: [f32; 8] = [0.05, 0.06, 0.07, 0.1, 0.11, 0.12, 0.3, 0.4];
pub const M0: [f32; 8] = [10.0, 11.0, 12.0, 20.0, 21.0, 22.0, 30.0, 31.0];
pub const IP: [f32; 8] = [0.9, 0.91, 0.92, 0.95, 0.96, 0.97, 0.8, 0.85];
/// Labels 1 and 2 cover three voxels each, the last two voxels are background.
pub const LABELS: [u8; 8] = [1, 1, 1, 2, 2, 2, 0, 0];
pub const LESION: [u8; 8] = [0, 0, 0, 0, 0, 0, 1, 1];

/// A dataset directory with maps in zarr, a lesion mask and a label map in NRRD,
/// and a manifest `dataset.toml` referencing them.
pub fn write_dataset(dir: &Path, extra: &str) {
    let store = dir.join("maps.zarr");
    for (name, values) in [("T1", &T1), ("T2", &T2), ("M0", &M0), ("IP", &IP)] {
        write_zarr_array(&store, name, &SHAPE, "float32", &f32_bytes(values));
    }
    fs::create_dir_all(dir.join("masks")).unwrap();
    write_nrrd(&dir.join("masks/lesion.nrrd"), &SHAPE, LESION.to_vec());
    write_nrrd(&dir.join("labels.nrrd"), &SHAPE, LABELS.to_vec());

    let manifest = format!(
        r#"{extra}
[maps]
T1 = "maps.zarr/T1"
T2 = "maps.zarr/T2"
M0 = "maps.zarr/M0"
IP = "maps.zarr/IP"

[[masks]]
name = "lesion"
path = "masks/lesion.nrrd"

[labels]
path = "labels.nrrd"
[labels.names]
1 = "white matter"
2 = "grey matter"
3 = "csf"
"#
    );
    fs::write(dir.join("dataset.toml"), manifest).unwrap();
}
