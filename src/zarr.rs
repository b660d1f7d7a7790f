//! Reading quantitative maps and masks from zarr hierarchies on disk.
use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    sync::Arc,
};

use zarrs::{array::Array, filesystem::FilesystemStore, storage::ReadableListableStorage};

use crate::{Error, Result, format::VolumeFormat, volume::Volume};

inventory::submit! {
    VolumeFormat::new("zarr", &["zarr"], read_volume)
}

/// Split `a/b.zarr/masks/wm` into the store root `a/b.zarr` and the array path `/masks/wm`.
///
/// Returns None if no component of the path has a `.zarr` extension.
pub fn split_store_path(path: &Path) -> Option<(PathBuf, String)> {
    let root = path.ancestors().find(|p| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zarr"))
    })?;
    let inner = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = inner
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some((root.to_path_buf(), format!("/{}", parts.join("/"))))
}

fn open_store(root: &Path) -> Result<ReadableListableStorage> {
    let store = FilesystemStore::new(root).map_err(Error::wrap)?;
    Ok(Arc::new(store))
}

/// Read the whole array at `array_path` within the store rooted at `store_root`.
pub fn read_array(store_root: &Path, array_path: &str) -> Result<Volume<f64>> {
    let store = open_store(store_root)?;
    let array = Array::open(store, array_path).map_err(Error::wrap)?;
    let shape: Vec<usize> = array.shape().iter().map(|&n| n as usize).collect();
    let subset = array.subset_all();
    let data_type = array
        .data_type()
        .name_v3()
        .map_or_else(String::new, Cow::into_owned);
    log::debug!(
        "reading zarr array {array_path} of shape {shape:?} ({data_type}) from {}",
        store_root.display()
    );

    macro_rules! retrieve {
        ($t:ty) => {{
            let values: Vec<$t> = array
                .retrieve_array_subset(&subset)
                .map_err(Error::wrap)?;
            values.into_iter().map(|v| v as f64).collect::<Vec<f64>>()
        }};
    }

    let data = match data_type.as_str() {
        "bool" => {
            let values: Vec<bool> = array
                .retrieve_array_subset(&subset)
                .map_err(Error::wrap)?;
            values
                .into_iter()
                .map(|b| if b { 1.0 } else { 0.0 })
                .collect()
        }
        "int8" => retrieve!(i8),
        "int16" => retrieve!(i16),
        "int32" => retrieve!(i32),
        "int64" => retrieve!(i64),
        "uint8" => retrieve!(u8),
        "uint16" => retrieve!(u16),
        "uint32" => retrieve!(u32),
        "uint64" => retrieve!(u64),
        "float32" => retrieve!(f32),
        "float64" => retrieve!(f64),
        s => {
            return Err(Error::general(format!(
                "unsupported zarr data type '{s}' for {array_path}"
            )));
        }
    };
    Volume::new(shape, data)
}

/// Read the array addressed by a path below a `.zarr` store root.
pub fn read_volume(path: &Path) -> Result<Volume<f64>> {
    let (root, array_path) = split_store_path(path).ok_or_else(|| {
        Error::general(format!("'{}' is not inside a .zarr store", path.display()))
    })?;
    read_array(&root, &array_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_store_and_array_path() {
        let (root, inner) = split_store_path(Path::new("data/s1.zarr/masks/wm")).unwrap();
        assert_eq!(root, PathBuf::from("data/s1.zarr"));
        assert_eq!(inner, "/masks/wm");

        let (root, inner) = split_store_path(Path::new("maps.zarr")).unwrap();
        assert_eq!(root, PathBuf::from("maps.zarr"));
        assert_eq!(inner, "/");

        assert!(split_store_path(Path::new("data/wm.nrrd")).is_none());
    }
}
