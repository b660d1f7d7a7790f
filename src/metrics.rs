//! Descriptive statistics of segmented quantitative maps.
use std::{collections::BTreeMap, io};

use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    Error, Result,
    segmentation::{Parameter, Segmentation, TissueRoi},
};

/// Summary statistics of one set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f64,
    /// Sample standard deviation (n - 1 in the denominator).
    pub stdev: f64,
    pub max: f64,
    pub min: f64,
    pub median: f64,
    pub q_95: f64,
    pub q_05: f64,
}

impl Statistics {
    fn nan() -> Self {
        Self {
            mean: f64::NAN,
            stdev: f64::NAN,
            max: f64::NAN,
            min: f64::NAN,
            median: f64::NAN,
            q_95: f64::NAN,
            q_05: f64::NAN,
        }
    }
}

/// Quantile of sorted data, interpolating linearly between closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Statistics of `values`. Any NaN makes every statistic NaN.
pub fn compute_statistic(values: &[f64]) -> Result<Statistics> {
    if values.is_empty() {
        return Err(Error::EmptyRegion("<values>".into()));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Ok(Statistics::nan());
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let stdev = if values.len() > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(Statistics {
        mean,
        stdev,
        max: sorted[sorted.len() - 1],
        min: sorted[0],
        median: quantile(&sorted, 0.5),
        q_95: quantile(&sorted, 0.95),
        q_05: quantile(&sorted, 0.05),
    })
}

/// Statistics of every parameter of one tissue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueStatistics {
    #[serde(skip)]
    pub name: String,
    #[serde(flatten)]
    pub parameters: BTreeMap<Parameter, Statistics>,
    /// Number of voxels.
    pub volume: usize,
}

impl TissueStatistics {
    pub fn get(&self, parameter: Parameter) -> Option<&Statistics> {
        self.parameters.get(&parameter)
    }
}

/// Voxel count of a tissue, taken from its first parameter.
pub fn compute_volume(tissue: &TissueRoi) -> usize {
    tissue
        .iter()
        .next()
        .map_or(0, |parameter| parameter.values.len())
}

pub fn compute_tissue_statistics(tissue: &TissueRoi) -> Result<TissueStatistics> {
    let parameters = tissue
        .iter()
        .map(|p| {
            let stats = compute_statistic(&p.values).map_err(|e| match e {
                Error::EmptyRegion(_) => Error::EmptyRegion(tissue.name().to_string()),
                e => e,
            })?;
            Ok((p.parameter, stats))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    Ok(TissueStatistics {
        name: tissue.name().to_string(),
        parameters,
        volume: compute_volume(tissue),
    })
}

/// Statistics of all tissues, keyed by tissue name in segmentation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsReport {
    tissues: Vec<TissueStatistics>,
}

impl StatisticsReport {
    /// Add a tissue; a repeated name replaces the earlier entry in place.
    pub fn insert(&mut self, stats: TissueStatistics) {
        match self.tissues.iter_mut().find(|t| t.name == stats.name) {
            Some(existing) => *existing = stats,
            None => self.tissues.push(stats),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TissueStatistics> {
        self.tissues.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TissueStatistics> {
        self.tissues.iter()
    }

    pub fn len(&self) -> usize {
        self.tissues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tissues.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One CSV row per tissue and parameter.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        for tissue in &self.tissues {
            for (parameter, s) in &tissue.parameters {
                csv.serialize(CsvRow {
                    tissue: &tissue.name,
                    parameter: parameter.name(),
                    mean: s.mean,
                    stdev: s.stdev,
                    min: s.min,
                    max: s.max,
                    median: s.median,
                    q_05: s.q_05,
                    q_95: s.q_95,
                    volume: tissue.volume,
                })?;
            }
        }
        csv.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a StatisticsReport {
    type Item = &'a TissueStatistics;
    type IntoIter = std::slice::Iter<'a, TissueStatistics>;

    fn into_iter(self) -> Self::IntoIter {
        self.tissues.iter()
    }
}

impl FromIterator<TissueStatistics> for StatisticsReport {
    fn from_iter<I: IntoIterator<Item = TissueStatistics>>(iter: I) -> Self {
        let mut report = Self::default();
        for stats in iter {
            report.insert(stats);
        }
        report
    }
}

impl Serialize for StatisticsReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.tissues.iter().map(|t| (&t.name, t)))
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    tissue: &'a str,
    parameter: &'a str,
    mean: f64,
    stdev: f64,
    min: f64,
    max: f64,
    median: f64,
    q_05: f64,
    q_95: f64,
    volume: usize,
}

/// Statistics of every tissue in the segmentation, computed in parallel.
pub fn compute_statistics(segmentation: &Segmentation) -> Result<StatisticsReport> {
    let tissues: Vec<&TissueRoi> = segmentation.iter().collect();
    let stats = tissues
        .par_iter()
        .map(|t| compute_tissue_statistics(t))
        .collect::<Result<Vec<_>>>()?;
    log::debug!("computed statistics for {} tissues", stats.len());
    Ok(stats.into_iter().collect())
}

/// Report holding a single tissue.
pub fn compute_statistics_for(tissue: &TissueRoi) -> Result<StatisticsReport> {
    Ok(std::iter::once(compute_tissue_statistics(tissue)?).collect())
}

/// `(mean, stdev)` of a parameter.
pub fn value_and_uncertainty(stats: &TissueStatistics, parameter: Parameter) -> Result<(f64, f64)> {
    let s = stats.get(parameter).ok_or_else(|| {
        Error::general(format!(
            "no {parameter} statistics for tissue '{}'",
            stats.name
        ))
    })?;
    Ok((s.mean, s.stdev))
}
