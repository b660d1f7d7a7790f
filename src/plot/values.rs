//! Error-bar plots of tissue statistics.
use plotters::{
    coord::{Shift, cartesian::Cartesian2d, types::RangedCoordf64},
    prelude::*,
};

use super::{AxisLabels, FONT, error_bar, padded, palette_color, relaxation_label};
use crate::{
    Error, Result,
    metrics::{StatisticsReport, TissueStatistics, value_and_uncertainty},
    segmentation::Parameter,
    unit::Unit,
};

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Options for the categorical per-tissue plots.
#[derive(Debug, Clone)]
pub struct ValuePlotOptions {
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    /// Unit of the plotted statistics, used in labels and default limits.
    pub unit: Unit,
    /// Automatic when None.
    pub ylim: Option<(f64, f64)>,
    /// Cap half-width in category spacings.
    pub capsize: f64,
    pub title: String,
}

impl Default for ValuePlotOptions {
    fn default() -> Self {
        Self {
            xlabel: None,
            ylabel: None,
            unit: Unit::Seconds,
            ylim: None,
            capsize: 0.08,
            title: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Marker {
    #[default]
    Circle,
    Square,
    Triangle,
}

fn auto_limits(points: impl Iterator<Item = (f64, f64)>) -> Option<(f64, f64)> {
    points
        .flat_map(|(value, err)| {
            let err = if err.is_finite() { err } else { 0.0 };
            [value - err, value + err]
        })
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn draw_marker<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    marker: Marker,
    at: (f64, f64),
    color: RGBColor,
    label: &str,
) -> Result<()> {
    let style = color.filled();
    let anno = match marker {
        Marker::Circle => chart
            .draw_series(std::iter::once(Circle::new(at, 5, style)))
            .map_err(Error::plot)?,
        Marker::Square => chart
            .draw_series(std::iter::once(
                EmptyElement::at(at) + Rectangle::new([(-4, -4), (4, 4)], style),
            ))
            .map_err(Error::plot)?,
        Marker::Triangle => chart
            .draw_series(std::iter::once(TriangleMarker::new(at, 6, style)))
            .map_err(Error::plot)?,
    };
    anno.label(label)
        .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    Ok(())
}

fn draw_error_bars<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    segments: Vec<Vec<(f64, f64)>>,
    color: RGBColor,
) -> Result<()> {
    chart
        .draw_series(
            segments
                .into_iter()
                .map(|s| PathElement::new(s, color.stroke_width(2))),
        )
        .map_err(Error::plot)?;
    Ok(())
}

fn draw_legend<'a, DB: DrawingBackend + 'a>(chart: &mut Chart<'a, DB>) -> Result<()> {
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(Error::plot)
}

fn chart_builder<'a, 'b, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    title: &str,
) -> ChartBuilder<'a, 'b, DB> {
    let mut builder = ChartBuilder::on(area);
    builder
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60);
    if !title.is_empty() {
        builder.caption(title, (FONT, 22).into_font());
    }
    builder
}

/// Plot one parameter of every tissue as mean ± standard deviation, one category per tissue.
pub fn plot_parameter_single<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    report: &StatisticsReport,
    parameter: Parameter,
    options: &ValuePlotOptions,
) -> Result<()> {
    if report.is_empty() {
        return Err(Error::general("statistics report has no tissues to plot"));
    }
    let points = report
        .iter()
        .map(|t| value_and_uncertainty(t, parameter))
        .collect::<Result<Vec<_>>>()?;
    let names: Vec<&str> = report.iter().map(|t| t.name.as_str()).collect();
    let labels = AxisLabels {
        x: "Tissue Index".to_string(),
        y: "Parameter Value".to_string(),
    }
    .with_overrides(options.xlabel.as_deref(), options.ylabel.as_deref());

    let (y_lo, y_hi) = match options.ylim {
        Some(lim) => lim,
        None => {
            let (lo, hi) = auto_limits(points.iter().copied()).unwrap_or((0.0, 1.0));
            padded(lo, hi, 0.05)
        }
    };
    let x_hi = names.len() as f64 - 0.5;

    let mut chart = chart_builder(area, &options.title)
        .build_cartesian_2d(-0.5..x_hi, y_lo..y_hi)
        .map_err(Error::plot)?;
    let category = |x: &f64| {
        let i = x.round();
        if (x - i).abs() < 1e-6 && i >= 0.0 {
            names.get(i as usize).map_or_else(String::new, |n| n.to_string())
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(names.len() * 2 + 1)
        .x_label_formatter(&category)
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .draw()
        .map_err(Error::plot)?;

    for (index, (&(mean, stdev), name)) in points.iter().zip(&names).enumerate() {
        let color = palette_color(index);
        let at = (index as f64, mean);
        draw_error_bars(
            &mut chart,
            error_bar(at, None, Some((stdev, options.capsize))),
            color,
        )?;
        draw_marker(&mut chart, Marker::Circle, at, color, name)?;
    }
    draw_legend(&mut chart)
}

/// Default y limits in seconds, rescaled for milliseconds.
fn default_limits(limits: (f64, f64), unit: Unit) -> (f64, f64) {
    match unit {
        Unit::Milliseconds => (limits.0 * 1000.0, limits.1 * 1000.0),
        _ => limits,
    }
}

fn plot_relaxation_single<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    report: &StatisticsReport,
    parameter: Parameter,
    limits: (f64, f64),
    options: &ValuePlotOptions,
) -> Result<()> {
    let options = ValuePlotOptions {
        xlabel: Some(
            options
                .xlabel
                .clone()
                .unwrap_or_else(|| "Tissue Index".to_string()),
        ),
        ylabel: Some(
            options
                .ylabel
                .clone()
                .unwrap_or_else(|| relaxation_label(parameter, options.unit)),
        ),
        ylim: Some(options.ylim.unwrap_or(default_limits(limits, options.unit))),
        ..options.clone()
    };
    plot_parameter_single(area, report, parameter, &options)
}

/// T1 per tissue, by default limited to 1.75 s..5 s.
pub fn plot_t1_single<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    report: &StatisticsReport,
    options: &ValuePlotOptions,
) -> Result<()> {
    plot_relaxation_single(area, report, Parameter::T1, (1.75, 5.0), options)
}

/// T2 per tissue, by default limited to 0.01 s..2 s.
pub fn plot_t2_single<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    report: &StatisticsReport,
    options: &ValuePlotOptions,
) -> Result<()> {
    plot_relaxation_single(area, report, Parameter::T2, (0.01, 2.0), options)
}

/// Options for [plot_grouping].
#[derive(Debug, Clone)]
pub struct GroupingOptions {
    pub x: Parameter,
    pub y: Parameter,
    /// Cap half-width as a fraction of the perpendicular axis span.
    pub capsize: f64,
    pub unit: Unit,
    pub prefix: String,
    pub postfix: String,
    pub marker: Marker,
    pub title: String,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            x: Parameter::T1,
            y: Parameter::T2,
            capsize: 0.01,
            unit: Unit::Seconds,
            prefix: String::new(),
            postfix: String::new(),
            marker: Marker::Circle,
            title: String::new(),
        }
    }
}

/// Place tissues in the (T1, T2) plane with error bars on both axes.
pub fn plot_grouping<'r, DB, I>(
    area: &DrawingArea<DB, Shift>,
    elements: I,
    options: &GroupingOptions,
) -> Result<()>
where
    DB: DrawingBackend,
    I: IntoIterator<Item = &'r TissueStatistics>,
{
    let valid = |p: Parameter| p.is_relaxation_time();
    if !valid(options.x) || !valid(options.y) || options.x == options.y {
        return Err(Error::general(format!(
            "invalid axis specification {} and {}",
            options.x, options.y
        )));
    }

    struct Point<'n> {
        name: &'n str,
        x: (f64, f64),
        y: (f64, f64),
    }
    let points = elements
        .into_iter()
        .map(|t| {
            Ok(Point {
                name: t.name.as_str(),
                x: value_and_uncertainty(t, options.x)?,
                y: value_and_uncertainty(t, options.y)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if points.is_empty() {
        return Err(Error::general("no elements to plot"));
    }

    let (x_lo, x_hi) = auto_limits(points.iter().map(|p| p.x)).unwrap_or((0.0, 1.0));
    let (y_lo, y_hi) = auto_limits(points.iter().map(|p| p.y)).unwrap_or((0.0, 1.0));
    let (x_lo, x_hi) = padded(x_lo, x_hi, 0.1);
    let (y_lo, y_hi) = padded(y_lo, y_hi, 0.1);
    let x_cap = (y_hi - y_lo) * options.capsize;
    let y_cap = (x_hi - x_lo) * options.capsize;

    let mut chart = chart_builder(area, &options.title)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(Error::plot)?;
    chart
        .configure_mesh()
        .x_desc(relaxation_label(options.x, options.unit))
        .y_desc(relaxation_label(options.y, options.unit))
        .draw()
        .map_err(Error::plot)?;

    for (index, p) in points.iter().enumerate() {
        let color = palette_color(index);
        let at = (p.x.0, p.y.0);
        draw_error_bars(
            &mut chart,
            error_bar(at, Some((p.x.1, x_cap)), Some((p.y.1, y_cap))),
            color,
        )?;
        let label = format!("{}{}{}", options.prefix, p.name, options.postfix);
        draw_marker(&mut chart, options.marker, at, color, &label)?;
    }
    draw_legend(&mut chart)
}
