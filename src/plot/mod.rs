//! Plots of quantitative maps and their statistics.
//!
//! Every plot draws into a caller-provided [DrawingArea], so several plots can share one figure.
use std::{collections::BTreeMap, path::Path};

use plotters::{coord::Shift, prelude::*};

use crate::{Error, Result, segmentation::Parameter, unit::Unit};

pub mod histograms;
pub mod slice;
pub mod values;

/// Default figure size in pixels.
pub const DEFAULT_SIZE: (u32, u32) = (800, 600);

pub(crate) const FONT: &str = "sans-serif";

/// matplotlib's default property cycle.
pub(crate) const PALETTE: [RGBColor; 10] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0x17, 0xbe, 0xcf),
];

pub(crate) fn palette_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// Vertical axis scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    #[default]
    Linear,
    Log,
}

/// Display name of a parameter, e.g. `T₁`.
pub fn parameter_label(parameter: Parameter) -> &'static str {
    match parameter {
        Parameter::T1 => "T₁",
        Parameter::T2 => "T₂",
        Parameter::M0 => "M₀",
        Parameter::IP => "IP",
    }
}

/// Display name with user overrides applied.
pub fn remapped_label(parameter: Parameter, remapping: &BTreeMap<Parameter, String>) -> String {
    remapping
        .get(&parameter)
        .cloned()
        .unwrap_or_else(|| parameter_label(parameter).to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLabels {
    pub x: String,
    pub y: String,
}

impl AxisLabels {
    /// Replace labels with the given overrides, where present.
    pub fn with_overrides(mut self, x: Option<&str>, y: Option<&str>) -> Self {
        if let Some(x) = x {
            self.x = x.to_string();
        }
        if let Some(y) = y {
            self.y = y.to_string();
        }
        self
    }
}

/// Axis description of a relaxation time, e.g. `T₁ spin-lattice relaxation time [s]`.
pub fn relaxation_label(parameter: Parameter, unit: Unit) -> String {
    match parameter {
        Parameter::T1 => format!("T₁ spin-lattice relaxation time [{}]", unit.symbol()),
        Parameter::T2 => format!("T₂ spin-spin relaxation time [{}]", unit.symbol()),
        Parameter::M0 => "M₀ magnetization [a.u.]".to_string(),
        Parameter::IP => "Inner product value [a.u.]".to_string(),
    }
}

/// Canonical histogram axis labels for a parameter.
pub fn canonical_axis_labels(parameter: Parameter, unit: Unit) -> AxisLabels {
    AxisLabels {
        x: relaxation_label(parameter, unit),
        y: "Absolute frequency".to_string(),
    }
}

/// Create an SVG file at `path` and let `draw` fill it.
pub fn render_svg<F>(path: &Path, size: (u32, u32), draw: F) -> Result<()>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
{
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(Error::plot)?;
    draw(&root)?;
    root.present().map_err(Error::plot)?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// Extend `[lo, hi]` by `fraction` of its width on both sides; degenerate ranges get a unit pad.
pub(crate) fn padded(lo: f64, hi: f64, fraction: f64) -> (f64, f64) {
    let width = hi - lo;
    if !width.is_finite() || width <= 0.0 {
        let pad = if lo.is_finite() && lo != 0.0 {
            lo.abs() * 0.5
        } else {
            1.0
        };
        return (lo - pad, hi + pad);
    }
    (lo - width * fraction, hi + width * fraction)
}

/// Dashed vertical segments at `x` between `y0` and `y1`.
pub(crate) fn dashes(x: f64, y0: f64, y1: f64, count: usize) -> Vec<Vec<(f64, f64)>> {
    let step = (y1 - y0) / (2 * count) as f64;
    (0..count)
        .map(|i| {
            let start = y0 + step * (2 * i) as f64;
            vec![(x, start), (x, start + step)]
        })
        .collect()
}

/// Line segments of an error bar around `(x, y)`, with caps of half-width `cap`.
pub(crate) fn error_bar(
    (x, y): (f64, f64),
    xerr: Option<(f64, f64)>,
    yerr: Option<(f64, f64)>,
) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    if let Some((err, cap)) = yerr.filter(|(e, _)| e.is_finite()) {
        out.push(vec![(x, y - err), (x, y + err)]);
        out.push(vec![(x - cap, y - err), (x + cap, y - err)]);
        out.push(vec![(x - cap, y + err), (x + cap, y + err)]);
    }
    if let Some((err, cap)) = xerr.filter(|(e, _)| e.is_finite()) {
        out.push(vec![(x - err, y), (x + err, y)]);
        out.push(vec![(x - err, y - cap), (x - err, y + cap)]);
        out.push(vec![(x + err, y - cap), (x + err, y + cap)]);
    }
    out
}
