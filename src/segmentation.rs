//! Programmatic access to segmented quantitative maps.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    unit::Unit,
    volume::{Mask, Volume},
};

/// One of the quantitative maps produced per acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Parameter {
    /// Spin-lattice relaxation time.
    T1,
    /// Spin-spin relaxation time.
    T2,
    /// Equilibrium magnetization.
    M0,
    /// Inner product of the dictionary match.
    IP,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [Parameter::T1, Parameter::T2, Parameter::M0, Parameter::IP];

    pub fn name(&self) -> &'static str {
        match self {
            Parameter::T1 => "T1",
            Parameter::T2 => "T2",
            Parameter::M0 => "M0",
            Parameter::IP => "IP",
        }
    }

    /// T1 and T2 carry a time unit, the others are in arbitrary units.
    pub fn is_relaxation_time(&self) -> bool {
        matches!(self, Parameter::T1 | Parameter::T2)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::general(format!("unknown parameter '{s}'")))
    }
}

/// The four co-registered parameter maps of one acquisition.
#[derive(Debug, Clone)]
pub struct ParameterMaps {
    t1: Volume<f64>,
    t2: Volume<f64>,
    m0: Volume<f64>,
    ip: Volume<f64>,
}

impl ParameterMaps {
    pub fn new(t1: Volume<f64>, t2: Volume<f64>, m0: Volume<f64>, ip: Volume<f64>) -> Result<Self> {
        for other in [&t2, &m0, &ip] {
            if other.shape() != t1.shape() {
                return Err(Error::shape(t1.shape(), other.shape()));
            }
        }
        Ok(Self { t1, t2, m0, ip })
    }

    pub fn get(&self, parameter: Parameter) -> &Volume<f64> {
        match parameter {
            Parameter::T1 => &self.t1,
            Parameter::T2 => &self.t2,
            Parameter::M0 => &self.m0,
            Parameter::IP => &self.ip,
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.t1.shape()
    }
}

/// Values of one parameter inside one region.
#[derive(Clone, PartialEq)]
pub struct ParameterRoi {
    pub parameter: Parameter,
    pub values: Vec<f64>,
    pub unit: Unit,
}

impl ParameterRoi {
    pub fn name(&self) -> &'static str {
        self.parameter.name()
    }
}

impl fmt::Debug for ParameterRoi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterRoi")
            .field("name", &self.parameter.name())
            .field("values", &format_args!("({},)", self.values.len()))
            .field("unit", &self.unit)
            .finish()
    }
}

/// All parameters of a single tissue region.
#[derive(Debug, Clone)]
pub struct TissueRoi {
    name: String,
    t1: ParameterRoi,
    t2: ParameterRoi,
    m0: ParameterRoi,
    ip: ParameterRoi,
    mask: Mask,
    volume: usize,
}

impl TissueRoi {
    pub fn new(
        name: impl Into<String>,
        t1: ParameterRoi,
        t2: ParameterRoi,
        m0: ParameterRoi,
        ip: ParameterRoi,
        mask: Mask,
    ) -> Self {
        let volume = mask.count();
        Self {
            name: name.into(),
            t1,
            t2,
            m0,
            ip,
            mask,
            volume,
        }
    }

    /// Extract the region selected by `mask` from every map.
    ///
    /// Relaxation times carry `unit`; M0 and IP are unitless.
    pub fn create_from(
        name: impl Into<String>,
        maps: &ParameterMaps,
        mask: Mask,
        unit: Unit,
    ) -> Result<Self> {
        let roi = |parameter: Parameter| -> Result<ParameterRoi> {
            Ok(ParameterRoi {
                parameter,
                values: maps.get(parameter).masked(&mask)?,
                unit: if parameter.is_relaxation_time() {
                    unit
                } else {
                    Unit::None
                },
            })
        };
        let t1 = roi(Parameter::T1)?;
        let t2 = roi(Parameter::T2)?;
        let m0 = roi(Parameter::M0)?;
        let ip = roi(Parameter::IP)?;
        Ok(Self::new(name, t1, t2, m0, ip, mask))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of voxels in the mask.
    pub fn volume(&self) -> usize {
        self.volume
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn parameter(&self, parameter: Parameter) -> &ParameterRoi {
        match parameter {
            Parameter::T1 => &self.t1,
            Parameter::T2 => &self.t2,
            Parameter::M0 => &self.m0,
            Parameter::IP => &self.ip,
        }
    }

    /// Parameters in the order T1, T2, M0, IP.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterRoi> {
        [&self.t1, &self.t2, &self.m0, &self.ip].into_iter()
    }
}

impl<'a> IntoIterator for &'a TissueRoi {
    type Item = &'a ParameterRoi;
    type IntoIter = std::array::IntoIter<&'a ParameterRoi, 4>;

    fn into_iter(self) -> Self::IntoIter {
        [&self.t1, &self.t2, &self.m0, &self.ip].into_iter()
    }
}

/// Ordering of tissues by volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    None,
    Increasing,
    #[default]
    Decreasing,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(SortOrder::None),
            "increasing" => Ok(SortOrder::Increasing),
            "decreasing" => Ok(SortOrder::Decreasing),
            other => Err(Error::general(format!("unknown sort order '{other}'"))),
        }
    }
}

/// A set of tissue regions over the same maps.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    tissues: Vec<TissueRoi>,
}

impl Segmentation {
    pub fn new(tissues: Vec<TissueRoi>, sort: SortOrder) -> Self {
        Self { tissues }.with_sort(sort)
    }

    /// Re-sort by volume.
    ///
    /// Decreasing order is the reverse of the stable increasing order,
    /// so tissues of equal volume also swap places.
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        match sort {
            SortOrder::None => {}
            SortOrder::Increasing => self.tissues.sort_by_key(TissueRoi::volume),
            SortOrder::Decreasing => {
                self.tissues.sort_by_key(TissueRoi::volume);
                self.tissues.reverse();
            }
        }
        self
    }

    /// One tissue per named mask, sorted by decreasing volume.
    pub fn create_from<I, S>(maps: &ParameterMaps, masks: I, unit: Unit) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Mask)>,
        S: Into<String>,
    {
        let tissues = masks
            .into_iter()
            .map(|(name, mask)| TissueRoi::create_from(name, maps, mask, unit))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(tissues, SortOrder::Decreasing))
    }

    pub fn get(&self, index: usize) -> Option<&TissueRoi> {
        self.tissues.get(index)
    }

    /// First tissue with the given name.
    pub fn by_name(&self, name: &str) -> Option<&TissueRoi> {
        self.tissues.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TissueRoi> {
        self.tissues.iter()
    }

    pub fn len(&self) -> usize {
        self.tissues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tissues.is_empty()
    }
}

impl<'a> IntoIterator for &'a Segmentation {
    type Item = &'a TissueRoi;
    type IntoIter = std::slice::Iter<'a, TissueRoi>;

    fn into_iter(self) -> Self::IntoIter {
        self.tissues.iter()
    }
}
