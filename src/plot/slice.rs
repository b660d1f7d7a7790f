//! Axis-aligned slices of a volume with semi-transparent label overlays.
use plotters::{coord::Shift, prelude::*};

use crate::{
    Error, Result,
    volume::{Plane, Volume},
};

pub const LABEL_COLORS: [&str; 4] = ["#03fc20", "#fc0303", "#0307fc", "#f003fc"];
pub const LABEL_ALPHAS: [f64; 4] = [1.0, 0.60, 0.33, 0.33];

/// RGB triple with components in [0, 1].
pub type Rgb = (f64, f64, f64);

/// Parse `#rrggbb` (the `#` is optional).
pub fn hex_to_rgb(hex: &str) -> Result<Rgb> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(Error::general(format!("invalid hex color '{hex}'")));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map(|c| f64::from(c) / 255.0)
            .map_err(|_| Error::general(format!("invalid hex color '{hex}'")))
    };
    Ok((channel(0)?, channel(2)?, channel(4)?))
}

/// A single color whose opacity grows with the mapped value.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaColormap {
    pub color: Rgb,
    pub max_alpha: f64,
    pub ticks: usize,
}

impl AlphaColormap {
    pub fn new(color: Rgb, max_alpha: f64) -> Self {
        Self {
            color,
            max_alpha,
            ticks: 50,
        }
    }

    /// Opacity of `value`: the entry `floor(value * ticks)` of `ticks` evenly spaced
    /// steps in `[0, max_alpha]`.
    pub fn alpha(&self, value: f64) -> f64 {
        if self.ticks < 2 || value.is_nan() {
            return 0.0;
        }
        let last = self.ticks - 1;
        let step = ((value.clamp(0.0, 1.0) * self.ticks as f64) as usize).min(last);
        self.max_alpha * step as f64 / last as f64
    }

    pub fn rgba(&self, value: f64) -> (f64, f64, f64, f64) {
        let (r, g, b) = self.color;
        (r, g, b, self.alpha(value))
    }
}

/// A named label volume drawn over the gray image.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelOverlay {
    pub name: String,
    pub data: Volume<f64>,
    color: Rgb,
    alpha: f64,
}

impl LabelOverlay {
    pub fn new(
        name: impl Into<String>,
        data: Volume<f64>,
        color: &str,
        alpha: f64,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            data,
            color: hex_to_rgb(color)?,
            alpha: alpha.clamp(0.0, 1.0),
        })
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_color(&mut self, hex: &str) -> Result<()> {
        self.color = hex_to_rgb(hex)?;
        Ok(())
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn colormap(&self) -> AlphaColormap {
        AlphaColormap::new(self.color, self.alpha)
    }
}

/// Overlays in drawing order; the last one ends up on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelOverlayContainer {
    overlays: Vec<LabelOverlay>,
}

impl LabelOverlayContainer {
    /// Build overlays, cycling through `colors` and `alphas`.
    /// Empty or absent sequences fall back to [LABEL_COLORS] and [LABEL_ALPHAS].
    pub fn from_labels<S: Into<String>>(
        labels: impl IntoIterator<Item = (S, Volume<f64>)>,
        colors: Option<&[&str]>,
        alphas: Option<&[f64]>,
    ) -> Result<Self> {
        let colors = colors.filter(|c| !c.is_empty()).unwrap_or(&LABEL_COLORS);
        let alphas = alphas.filter(|a| !a.is_empty()).unwrap_or(&LABEL_ALPHAS);
        let overlays = labels
            .into_iter()
            .enumerate()
            .map(|(i, (name, data))| {
                LabelOverlay::new(name, data, colors[i % colors.len()], alphas[i % alphas.len()])
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { overlays })
    }

    pub fn get(&self, name: &str) -> Option<&LabelOverlay> {
        self.overlays.iter().find(|o| o.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut LabelOverlay> {
        self.overlays.iter_mut().find(|o| o.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabelOverlay> {
        self.overlays.iter()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}

/// A 3-D volume shown one plane at a time, with label overlays.
#[derive(Debug, Clone)]
pub struct LabeledSliceDisplay {
    volume: Volume<f64>,
    labels: LabelOverlayContainer,
    axis: usize,
    index: usize,
    vmin: f64,
    vmax: f64,
}

impl LabeledSliceDisplay {
    pub fn new(volume: Volume<f64>, labels: LabelOverlayContainer) -> Result<Self> {
        let volume = volume.squeeze();
        if volume.ndim() != 3 {
            return Err(Error::general(format!(
                "slice display requires a 3-D volume, got shape {:?}",
                volume.shape()
            )));
        }
        let mut labels = labels;
        for overlay in &mut labels.overlays {
            let data = std::mem::replace(&mut overlay.data, Volume::filled(vec![0], 0.0));
            overlay.data = data.squeeze();
            if overlay.data.shape() != volume.shape() {
                return Err(Error::shape(volume.shape(), overlay.data.shape()));
            }
        }
        let (vmin, vmax) = volume.min_max().unwrap_or((0.0, 1.0));
        Ok(Self {
            volume,
            labels,
            axis: 0,
            index: 0,
            vmin,
            vmax,
        })
    }

    pub fn axis(&self) -> usize {
        self.axis
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn max_index(&self) -> usize {
        self.volume.shape()[self.axis].saturating_sub(1)
    }

    pub fn window(&self) -> (f64, f64) {
        (self.vmin, self.vmax)
    }

    pub fn labels(&self) -> &LabelOverlayContainer {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelOverlayContainer {
        &mut self.labels
    }

    pub fn set_index(&mut self, index: usize) -> Result<()> {
        if index > self.max_index() {
            return Err(Error::general(format!(
                "index {index} exceeds {} on axis {}",
                self.max_index(),
                self.axis
            )));
        }
        self.index = index;
        Ok(())
    }

    /// Switch the slicing axis; the index restarts at 0.
    pub fn set_axis(&mut self, axis: usize) -> Result<()> {
        if axis > 2 {
            return Err(Error::general(format!("invalid axis {axis}")));
        }
        self.axis = axis;
        self.index = 0;
        Ok(())
    }

    pub fn current_plane(&self) -> Result<Plane<f64>> {
        self.volume.plane(self.axis, self.index)
    }

    fn gray(&self, value: f64) -> f64 {
        if value.is_nan() || self.vmax <= self.vmin {
            return 0.0;
        }
        ((value - self.vmin) / (self.vmax - self.vmin)).clamp(0.0, 1.0)
    }

    /// Composited color of every pixel of the current plane.
    pub fn composite(&self) -> Result<Plane<RGBColor>> {
        let plane = self.current_plane()?;
        let overlays = self
            .labels
            .iter()
            .map(|o| Ok((o.colormap(), o.data.plane(self.axis, self.index)?)))
            .collect::<Result<Vec<_>>>()?;
        let data = plane
            .data
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let g = self.gray(v);
                let mut rgb = (g, g, g);
                for (cmap, label) in &overlays {
                    let (r, gr, b, a) = cmap.rgba(label.data[i]);
                    rgb = (
                        r * a + rgb.0 * (1.0 - a),
                        gr * a + rgb.1 * (1.0 - a),
                        b * a + rgb.2 * (1.0 - a),
                    );
                }
                let byte = |c: f64| (c * 255.0).round() as u8;
                RGBColor(byte(rgb.0), byte(rgb.1), byte(rgb.2))
            })
            .collect();
        Ok(Plane {
            rows: plane.rows,
            cols: plane.cols,
            data,
        })
    }

    /// Draw the current plane to fill `area`, one rectangle per voxel.
    pub fn render<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<()> {
        let image = self.composite()?;
        let (width, height) = area.dim_in_pixel();
        let cell_w = f64::from(width) / image.cols as f64;
        let cell_h = f64::from(height) / image.rows as f64;
        for (i, color) in image.data.iter().enumerate() {
            let (r, c) = (i / image.cols, i % image.cols);
            let x0 = (c as f64 * cell_w).floor() as i32;
            let y0 = (r as f64 * cell_h).floor() as i32;
            let x1 = ((c + 1) as f64 * cell_w).ceil() as i32;
            let y1 = ((r + 1) as f64 * cell_h).ceil() as i32;
            area.draw(&Rectangle::new([(x0, y0), (x1, y1)], color.filled()))
                .map_err(Error::plot)?;
        }
        log::debug!(
            "rendered plane {} of axis {} ({}x{})",
            self.index,
            self.axis,
            image.rows,
            image.cols
        );
        Ok(())
    }
}
