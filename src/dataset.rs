//! Datasets described by a TOML manifest.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    format::read_volume,
    segmentation::{ParameterMaps, Segmentation, SortOrder, TissueRoi},
    unit::Unit,
    volume::Mask,
};

/// Locations of the four parameter maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapSources {
    #[serde(rename = "T1")]
    pub t1: PathBuf,
    #[serde(rename = "T2")]
    pub t2: PathBuf,
    #[serde(rename = "M0")]
    pub m0: PathBuf,
    #[serde(rename = "IP")]
    pub ip: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaskSource {
    pub name: String,
    pub path: PathBuf,
}

/// An integer label map and the tissue name of each label value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelSource {
    pub path: PathBuf,
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

impl LabelSource {
    /// `(value, name)` pairs in ascending value order.
    pub fn labels(&self) -> Result<Vec<(u32, String)>> {
        let mut labels = self
            .names
            .iter()
            .map(|(key, name)| {
                key.trim()
                    .parse::<u32>()
                    .map(|value| (value, name.clone()))
                    .map_err(|_| Error::general(format!("label key '{key}' is not an integer")))
            })
            .collect::<Result<Vec<_>>>()?;
        labels.sort_by_key(|(value, _)| *value);
        Ok(labels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub unit: Unit,
    #[serde(default)]
    pub sort: SortOrder,
    pub maps: MapSources,
    #[serde(default)]
    pub masks: Vec<MaskSource>,
    #[serde(default)]
    pub labels: Option<LabelSource>,
}

fn resolve_against(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, base)
    }

    /// Parse manifest text; relative paths are taken relative to `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self> {
        let mut manifest: Self = toml::from_str(text)?;
        let maps = &mut manifest.maps;
        for path in [&mut maps.t1, &mut maps.t2, &mut maps.m0, &mut maps.ip] {
            resolve_against(base_dir, path);
        }
        for mask in &mut manifest.masks {
            resolve_against(base_dir, &mut mask.path);
        }
        if let Some(labels) = &mut manifest.labels {
            resolve_against(base_dir, &mut labels.path);
            labels.labels()?;
        }
        Ok(manifest)
    }

    pub fn load(&self) -> Result<Dataset> {
        let maps = ParameterMaps::new(
            read_volume(&self.maps.t1)?,
            read_volume(&self.maps.t2)?,
            read_volume(&self.maps.m0)?,
            read_volume(&self.maps.ip)?,
        )?;

        let mut masks = Vec::new();
        for source in &self.masks {
            masks.push((source.name.clone(), read_volume(&source.path)?.to_mask()));
        }
        if let Some(source) = &self.labels {
            let label_map = read_volume(&source.path)?;
            for (name, mask) in label_map.split_labels(&source.labels()?) {
                if mask.count() == 0 {
                    log::warn!(
                        "label '{name}' does not occur in {}, skipping",
                        source.path.display()
                    );
                    continue;
                }
                masks.push((name, mask));
            }
        }
        log::debug!("loaded {} masks of shape {:?}", masks.len(), maps.shape());
        Ok(Dataset {
            unit: self.unit,
            sort: self.sort,
            maps,
            masks,
        })
    }
}

/// Volumes of a loaded manifest.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub unit: Unit,
    pub sort: SortOrder,
    pub maps: ParameterMaps,
    /// Explicit masks first, then label masks in ascending label order.
    pub masks: Vec<(String, Mask)>,
}

impl Dataset {
    /// Tissues in manifest order, then sorted as the manifest asks.
    pub fn segmentation(&self) -> Result<Segmentation> {
        let tissues = self
            .masks
            .iter()
            .map(|(name, mask)| {
                TissueRoi::create_from(name.as_str(), &self.maps, mask.clone(), self.unit)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Segmentation::new(tissues, self.sort))
    }
}
