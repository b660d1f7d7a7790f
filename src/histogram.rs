//! Equal-width binning in one and two dimensions, and power-law color normalization.
use crate::{Error, Result};

/// Bin range of the finite values: `[min, max]`, widened by 0.5 on both sides when degenerate.
fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    if lo == hi {
        Some((lo - 0.5, hi + 0.5))
    } else {
        Some((lo, hi))
    }
}

fn edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let width = (hi - lo) / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect()
}

/// Bin index of `v` in `[lo, hi]`; the last bin is closed on the right.
fn bin_of(v: f64, lo: f64, hi: f64, bins: usize) -> Option<usize> {
    if !v.is_finite() || v < lo || v > hi {
        return None;
    }
    let idx = ((v - lo) / (hi - lo) * bins as f64) as usize;
    Some(idx.min(bins - 1))
}

/// Upper bound on the number of cells of one histogram.
pub const MAX_CELLS: usize = 1 << 24;

/// Validate `bins` per axis over `axes` axes and return the total cell count.
fn cell_count(bins: usize, axes: u32) -> Result<usize> {
    if bins == 0 {
        return Err(Error::general("histogram needs at least one bin"));
    }
    bins.checked_pow(axes)
        .filter(|&cells| cells <= MAX_CELLS)
        .ok_or_else(|| {
            Error::general(format!(
                "{bins} bins per axis exceed the limit of {MAX_CELLS} histogram cells"
            ))
        })
}

/// One-dimensional histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` monotonically increasing edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn new(values: &[f64], bins: usize) -> Result<Self> {
        let cells = cell_count(bins, 1)?;
        let (lo, hi) = finite_range(values.iter().copied())
            .ok_or_else(|| Error::general("histogram of data without finite values"))?;
        let mut counts = vec![0; cells];
        for &v in values {
            if let Some(i) = bin_of(v, lo, hi, bins) {
                counts[i] += 1;
            }
        }
        Ok(Self {
            edges: edges(lo, hi, bins),
            counts,
        })
    }

    /// `(left, right, count)` per bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.counts)
            .map(|(w, &c)| (w[0], w[1], c))
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }
}

/// Two-dimensional histogram over paired samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2d {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    /// Row-major, `counts[ix * y_bins + iy]`.
    pub counts: Vec<usize>,
}

impl Histogram2d {
    pub fn new(x: &[f64], y: &[f64], bins: usize) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::general(format!(
                "paired samples differ in length: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        let cells = cell_count(bins, 2)?;
        let paired = || {
            x.iter()
                .zip(y)
                .filter(|(a, b)| a.is_finite() && b.is_finite())
        };
        let no_data = || Error::general("2D histogram of data without finite pairs");
        let (x_lo, x_hi) = finite_range(paired().map(|(a, _)| *a)).ok_or_else(no_data)?;
        let (y_lo, y_hi) = finite_range(paired().map(|(_, b)| *b)).ok_or_else(no_data)?;

        let mut counts = vec![0; cells];
        for (&a, &b) in paired() {
            if let (Some(ix), Some(iy)) = (bin_of(a, x_lo, x_hi, bins), bin_of(b, y_lo, y_hi, bins))
            {
                counts[ix * bins + iy] += 1;
            }
        }
        Ok(Self {
            x_edges: edges(x_lo, x_hi, bins),
            y_edges: edges(y_lo, y_hi, bins),
            counts,
        })
    }

    /// Count of cell `(ix, iy)`, or None outside the grid.
    pub fn count(&self, ix: usize, iy: usize) -> Option<usize> {
        let x_bins = self.x_edges.len() - 1;
        let y_bins = self.y_edges.len() - 1;
        if ix >= x_bins || iy >= y_bins {
            return None;
        }
        self.counts.get(ix * y_bins + iy).copied()
    }

    /// `(x_left, x_right, y_bottom, y_top, count)` per cell.
    pub fn cells(&self) -> impl Iterator<Item = (f64, f64, f64, f64, usize)> + '_ {
        let y_bins = self.y_edges.len() - 1;
        self.counts.iter().enumerate().map(move |(i, &c)| {
            let (ix, iy) = (i / y_bins, i % y_bins);
            (
                self.x_edges[ix],
                self.x_edges[ix + 1],
                self.y_edges[iy],
                self.y_edges[iy + 1],
                c,
            )
        })
    }
}

/// Maps `[vmin, vmax]` onto `[0, 1]` following a power law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerNorm {
    pub gamma: f64,
    pub vmin: f64,
    pub vmax: f64,
}

impl PowerNorm {
    pub fn new(gamma: f64, vmin: f64, vmax: f64) -> Self {
        Self { gamma, vmin, vmax }
    }

    pub fn apply(&self, v: f64) -> f64 {
        if self.vmax <= self.vmin {
            return 0.0;
        }
        ((v - self.vmin) / (self.vmax - self.vmin))
            .clamp(0.0, 1.0)
            .powf(self.gamma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_with_closed_last_bin() {
        let h = Histogram::new(&[0.0, 1.0, 2.0, 3.0, 4.0], 4).unwrap();
        assert_eq!(h.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(h.counts, vec![1, 1, 1, 2]);
        assert_eq!(h.max_count(), 2);
    }

    #[test]
    fn skips_non_finite() {
        let h = Histogram::new(&[f64::NAN, 1.0, 3.0, f64::INFINITY], 2).unwrap();
        assert_eq!(h.counts, vec![1, 1]);
        assert_eq!(h.range(), (1.0, 3.0));
    }

    #[test]
    fn degenerate_range_is_widened() {
        let h = Histogram::new(&[2.0, 2.0], 1).unwrap();
        assert_eq!(h.range(), (1.5, 2.5));
        assert_eq!(h.counts, vec![2]);
    }

    #[test]
    fn invalid_input() {
        assert!(Histogram::new(&[], 10).is_err());
        assert!(Histogram::new(&[1.0], 0).is_err());
        assert!(Histogram2d::new(&[1.0], &[1.0, 2.0], 2).is_err());
    }

    #[test]
    fn absurd_bin_counts_are_rejected() {
        assert!(Histogram::new(&[1.0, 2.0], MAX_CELLS + 1).is_err());
        assert!(Histogram2d::new(&[1.0], &[1.0], 1 << 13).is_err());
        assert!(Histogram2d::new(&[1.0], &[1.0], usize::MAX).is_err());
        assert!(Histogram2d::new(&[1.0, 2.0], &[1.0, 2.0], 1 << 12).is_ok());
    }

    #[test]
    fn two_dimensional() {
        let x = [0.0, 0.0, 1.0, 1.0, f64::NAN];
        let y = [0.0, 10.0, 10.0, 10.0, 5.0];
        let h = Histogram2d::new(&x, &y, 2).unwrap();
        assert_eq!(h.count(0, 0), Some(1));
        assert_eq!(h.count(0, 1), Some(1));
        assert_eq!(h.count(1, 1), Some(2));
        assert_eq!(h.count(1, 0), Some(0));
        assert_eq!(h.count(0, 2), None);
        assert_eq!(h.count(2, 0), None);
        assert_eq!(h.cells().count(), 4);
        assert_eq!(h.y_edges, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn power_norm() {
        let n = PowerNorm::new(0.5, 0.0, 4.0);
        assert_eq!(n.apply(0.0), 0.0);
        assert_eq!(n.apply(1.0), 0.5);
        assert_eq!(n.apply(8.0), 1.0);
        assert_eq!(PowerNorm::new(0.3, 1.0, 1.0).apply(1.0), 0.0);
    }
}
