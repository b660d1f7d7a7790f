//! Registry of volume file formats.
//!
//! Readers register themselves with [inventory::submit!] and are looked up by file extension.
use std::path::Path;

use crate::{Error, Result, volume::Volume};

/// A volume reader keyed on file extension.
#[derive(Debug)]
pub struct VolumeFormat {
    pub name: &'static str,
    /// Lowercase extensions without the leading dot.
    pub extensions: &'static [&'static str],
    pub read: fn(&Path) -> Result<Volume<f64>>,
}

inventory::collect!(VolumeFormat);

impl VolumeFormat {
    pub const fn new(
        name: &'static str,
        extensions: &'static [&'static str],
        read: fn(&Path) -> Result<Volume<f64>>,
    ) -> Self {
        Self {
            name,
            extensions,
            read,
        }
    }

    /// Whether the final component of `path` carries one of this format's extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                self.extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(e))
            })
    }

    pub fn all() -> impl Iterator<Item = &'static VolumeFormat> {
        inventory::iter::<VolumeFormat>.into_iter()
    }

    pub fn by_name(name: &str) -> Option<&'static VolumeFormat> {
        Self::all().find(|f| f.name == name)
    }
}

/// Find the format of the nearest ancestor of `path` (including itself) with a known extension.
///
/// Hierarchical formats are addressed below their root, e.g. `maps.zarr/T1` resolves to zarr.
pub fn resolve(path: &Path) -> Option<&'static VolumeFormat> {
    path.ancestors()
        .find_map(|p| VolumeFormat::all().find(|f| f.matches(p)))
}

/// Read any registered format into a `f64` volume.
pub fn read_volume(path: &Path) -> Result<Volume<f64>> {
    let format = resolve(path).ok_or_else(|| {
        let known: Vec<_> = VolumeFormat::all()
            .flat_map(|f| f.extensions.iter().copied())
            .collect();
        Error::general(format!(
            "no volume format for '{}' (known extensions: {})",
            path.display(),
            known.join(", ")
        ))
    })?;
    log::debug!("reading {} as {}", path.display(), format.name);
    (format.read)(path)
}
