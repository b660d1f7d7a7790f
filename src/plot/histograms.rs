//! Histograms of relaxation times, magnetization and inner product values.
use std::collections::BTreeMap;

use plotters::{
    coord::{Shift, cartesian::Cartesian2d, ranged1d::Ranged, types::RangedCoordf64},
    prelude::*,
    style::colors::colormaps::{ColorMap, ViridisRGB},
};

use super::{
    FONT, Scale, canonical_axis_labels, dashes, palette_color, relaxation_label, remapped_label,
};
use crate::{
    Error, Result,
    histogram::{Histogram, Histogram2d, PowerNorm},
    segmentation::{Parameter, Segmentation, TissueRoi},
    unit::Unit,
};

/// Options for [plot_parameter].
#[derive(Debug, Clone)]
pub struct HistogramOptions {
    pub parameter: Parameter,
    pub bins: usize,
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    pub yscale: Scale,
    /// Display names replacing the defaults in the legend.
    pub parameter_remapping: BTreeMap<Parameter, String>,
    pub title: String,
    /// Mark each tissue's mean with a dashed line.
    pub draw_mean: bool,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            parameter: Parameter::T2,
            bins: 60,
            xlabel: None,
            ylabel: None,
            yscale: Scale::Linear,
            parameter_remapping: BTreeMap::new(),
            title: String::new(),
            draw_mean: true,
        }
    }
}

struct Series {
    label: String,
    color: RGBColor,
    histogram: Histogram,
    mean: f64,
}

fn legend_label(tissue: &str, parameter: &str, mean: f64, unit: Unit) -> String {
    let unit = match unit.symbol() {
        "" => String::new(),
        s => format!(" {s}"),
    };
    format!("{tissue} ⟨{parameter}⟩ = {mean:.3}{unit}")
}

/// Overlay the histograms of one parameter for every tissue of the segmentation.
pub fn plot_parameter<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    segmentation: &Segmentation,
    options: &HistogramOptions,
) -> Result<()> {
    let first = segmentation
        .get(0)
        .ok_or_else(|| Error::general("segmentation has no tissues to plot"))?;
    let labels = canonical_axis_labels(options.parameter, first.parameter(options.parameter).unit)
        .with_overrides(options.xlabel.as_deref(), options.ylabel.as_deref());
    let parameter_name = remapped_label(options.parameter, &options.parameter_remapping);

    let mut series = Vec::with_capacity(segmentation.len());
    for (index, tissue) in segmentation.iter().enumerate() {
        let roi = tissue.parameter(options.parameter);
        let mean = roi.values.iter().sum::<f64>() / roi.values.len() as f64;
        let histogram = Histogram::new(&roi.values, options.bins).map_err(|e| {
            Error::general(format!("cannot histogram {} of '{}': {e}", roi.name(), tissue.name()))
        })?;
        series.push(Series {
            label: legend_label(tissue.name(), &parameter_name, mean, roi.unit),
            color: palette_color(index),
            histogram,
            mean,
        });
    }

    let (x_lo, x_hi) = series
        .iter()
        .map(|s| s.histogram.range())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
            (lo.min(a), hi.max(b))
        });
    let max_count = series
        .iter()
        .map(|s| s.histogram.max_count())
        .max()
        .unwrap_or(0)
        .max(1);
    let y_max = max_count as f64 * 1.05;

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60);
    if !options.title.is_empty() {
        builder.caption(&options.title, (FONT, 22).into_font());
    }

    match options.yscale {
        Scale::Linear => {
            let mut chart = builder
                .build_cartesian_2d(x_lo..x_hi, 0.0..y_max)
                .map_err(Error::plot)?;
            chart
                .configure_mesh()
                .x_desc(labels.x.as_str())
                .y_desc(labels.y.as_str())
                .draw()
                .map_err(Error::plot)?;
            draw_series(&mut chart, &series, 0.0, y_max, options.draw_mean)?;
            draw_legend(&mut chart)
        }
        Scale::Log => {
            let bottom = 0.5;
            let mut chart = builder
                .build_cartesian_2d(x_lo..x_hi, (bottom..y_max).log_scale())
                .map_err(Error::plot)?;
            chart
                .configure_mesh()
                .x_desc(labels.x.as_str())
                .y_desc(labels.y.as_str())
                .draw()
                .map_err(Error::plot)?;
            draw_series(&mut chart, &series, bottom, y_max, options.draw_mean)?;
            draw_legend(&mut chart)
        }
    }
}

fn draw_series<DB, Y>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, Y>>,
    series: &[Series],
    baseline: f64,
    top: f64,
    draw_mean: bool,
) -> Result<()>
where
    DB: DrawingBackend,
    Y: Ranged<ValueType = f64>,
{
    for s in series {
        let color = s.color;
        chart
            .draw_series(s.histogram.bins().filter(|&(_, _, c)| c > 0).map(
                |(left, right, count)| {
                    let corners = [(left, baseline), (right, count as f64)];
                    Rectangle::new(corners, color.mix(0.7).filled())
                },
            ))
            .map_err(Error::plot)?
            .label(s.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));

        if draw_mean && s.mean.is_finite() {
            chart
                .draw_series(
                    dashes(s.mean, baseline, top, 30)
                        .into_iter()
                        .map(|segment| PathElement::new(segment, color.stroke_width(2))),
                )
                .map_err(Error::plot)?;
        }
    }
    Ok(())
}

fn draw_legend<'a, DB, Y>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<RangedCoordf64, Y>>,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    Y: Ranged<ValueType = f64>,
{
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(Error::plot)
}

/// Options for [plot_2d_histogram].
#[derive(Debug, Clone)]
pub struct Histogram2dOptions {
    /// T1 or T2.
    pub x: Parameter,
    /// T1 or T2, different from `x`.
    pub y: Parameter,
    pub bins: usize,
    pub title: String,
    /// Exponent of the power-law color normalization.
    pub gamma: f64,
    /// Unit shown in the axis labels; defaults to the tissue's T1 unit.
    pub unit: Option<Unit>,
}

impl Default for Histogram2dOptions {
    fn default() -> Self {
        Self {
            x: Parameter::T1,
            y: Parameter::T2,
            bins: 100,
            title: String::new(),
            gamma: 0.3,
            unit: None,
        }
    }
}

/// Viridis color of a bin count under `norm`.
fn cell_color(norm: &PowerNorm, count: usize) -> RGBColor {
    ViridisRGB.get_color(norm.apply(count as f64) as f32)
}

/// Heat map of T1 against T2 (or the reverse) for a single tissue.
pub fn plot_2d_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    tissue: &TissueRoi,
    options: &Histogram2dOptions,
) -> Result<()> {
    let valid = |p: Parameter| p.is_relaxation_time();
    if !valid(options.x) || !valid(options.y) || options.x == options.y {
        return Err(Error::general(format!(
            "invalid axis specification {} / {}: must be T1 and T2",
            options.x, options.y
        )));
    }
    let unit = options
        .unit
        .unwrap_or(tissue.parameter(Parameter::T1).unit);
    let x = &tissue.parameter(options.x).values;
    let y = &tissue.parameter(options.y).values;
    let histogram = Histogram2d::new(x, y, options.bins)?;

    let (vmin, vmax) = histogram
        .counts
        .iter()
        .fold((usize::MAX, 0), |(lo, hi), &c| (lo.min(c), hi.max(c)));
    let norm = PowerNorm::new(options.gamma, vmin as f64, vmax as f64);

    let x_range = histogram.x_edges[0]..histogram.x_edges[histogram.x_edges.len() - 1];
    let y_range = histogram.y_edges[0]..histogram.y_edges[histogram.y_edges.len() - 1];

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60);
    if !options.title.is_empty() {
        builder.caption(&options.title, (FONT, 22).into_font());
    }
    let mut chart = builder
        .build_cartesian_2d(x_range, y_range)
        .map_err(Error::plot)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(relaxation_label(options.x, unit))
        .y_desc(relaxation_label(options.y, unit))
        .draw()
        .map_err(Error::plot)?;
    chart
        .draw_series(histogram.cells().map(|(x0, x1, y0, y1, count)| {
            Rectangle::new([(x0, y0), (x1, y1)], cell_color(&norm, count).filled())
        }))
        .map_err(Error::plot)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use plotters::prelude::SVGBackend;

    use super::*;
    use crate::volume::Volume;

    fn segmentation() -> Segmentation {
        let n = 40;
        let ramp = |scale: f64| {
            Volume::new(vec![n], (0..n).map(|i| (i as f64 + 1.0) * scale).collect()).unwrap()
        };
        let maps = crate::segmentation::ParameterMaps::new(
            ramp(0.1),
            ramp(0.01),
            ramp(1.0),
            ramp(0.001),
        )
        .unwrap();
        let mask = |pred: fn(usize) -> bool| {
            Volume::new(vec![n], (0..n).map(pred).collect()).unwrap()
        };
        Segmentation::create_from(
            &maps,
            vec![("wm", mask(|i| i < 25)), ("gm", mask(|i| i >= 25))],
            Unit::Seconds,
        )
        .unwrap()
    }

    fn render(draw: impl FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>) -> String {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (640, 480)).into_drawing_area();
            root.fill(&WHITE).unwrap();
            draw(&root).unwrap();
            root.present().unwrap();
        }
        svg
    }

    #[test]
    fn legend_label_format() {
        assert_eq!(legend_label("wm", "T₂", 0.08123, Unit::Seconds), "wm ⟨T₂⟩ = 0.081 s");
        assert_eq!(legend_label("wm", "IP", 2.0, Unit::None), "wm ⟨IP⟩ = 2.000");
    }

    #[test]
    fn parameter_histograms_render() {
        let seg = segmentation();
        let options = HistogramOptions {
            bins: 10,
            title: "session 1".into(),
            ..Default::default()
        };
        let svg = render(|area| plot_parameter(area, &seg, &options));
        assert!(svg.contains("<svg"));
        assert!(svg.contains("gm ⟨T₂⟩"));
        assert!(svg.contains("wm ⟨T₂⟩"));
        assert!(svg.contains("session 1"));
        assert!(svg.contains("Absolute frequency"));
    }

    #[test]
    fn log_scale_renders() {
        let seg = segmentation();
        let options = HistogramOptions {
            parameter: Parameter::M0,
            yscale: Scale::Log,
            ylabel: Some("voxels".into()),
            ..Default::default()
        };
        let svg = render(|area| plot_parameter(area, &seg, &options));
        assert!(svg.contains("voxels"));
        assert!(svg.contains("M₀ magnetization [a.u.]"));
    }

    #[test]
    fn empty_segmentation_is_an_error() {
        let seg = Segmentation::default();
        let mut svg = String::new();
        let root = SVGBackend::with_string(&mut svg, (100, 100)).into_drawing_area();
        assert!(plot_parameter(&root, &seg, &HistogramOptions::default()).is_err());
    }

    #[test]
    fn heat_map_renders_and_validates_axes() {
        let seg = segmentation();
        let tissue = seg.by_name("wm").unwrap();
        let options = Histogram2dOptions {
            x: Parameter::T2,
            y: Parameter::T1,
            bins: 8,
            ..Default::default()
        };
        let svg = render(|area| plot_2d_histogram(area, tissue, &options));
        assert!(svg.contains("T₂ spin-spin relaxation time [s]"));

        let mut svg = String::new();
        let root = SVGBackend::with_string(&mut svg, (100, 100)).into_drawing_area();
        let same = Histogram2dOptions {
            x: Parameter::T1,
            y: Parameter::T1,
            ..Default::default()
        };
        assert!(plot_2d_histogram(&root, tissue, &same).is_err());
        let m0 = Histogram2dOptions {
            x: Parameter::M0,
            ..Default::default()
        };
        assert!(plot_2d_histogram(&root, tissue, &m0).is_err());
    }

    #[test]
    fn heat_map_colors_follow_power_norm() {
        let norm = PowerNorm::new(0.3, 0.0, 10.0);
        assert_eq!(cell_color(&norm, 0), ViridisRGB.get_color(0.0f32));
        assert_eq!(cell_color(&norm, 10), ViridisRGB.get_color(1.0f32));
        assert_eq!(cell_color(&norm, 25), ViridisRGB.get_color(1.0f32));
        assert_ne!(cell_color(&norm, 1), cell_color(&norm, 0));
    }
}
