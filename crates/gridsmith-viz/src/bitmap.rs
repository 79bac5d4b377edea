use std::path::Path;

use gridsmith_core::{GridError, GridResult};
use plotters::prelude::*;

use crate::{PlotData, PlotInfo, PlotRenderer};

const PALETTE: [RGBColor; 3] = [
    RGBColor(30, 144, 255),
    RGBColor(34, 139, 34),
    RGBColor(200, 0, 100),
];

fn render_err(err: impl std::fmt::Display) -> GridError {
    GridError::Render(err.to_string())
}

/// PNG renderer. Draws lines and anomaly markers only; no text, so no font
/// backend is needed.
#[derive(Debug, Clone)]
pub struct BitmapRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for BitmapRenderer {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 500,
        }
    }
}

fn bounds<'a>(values: impl Iterator<Item = &'a f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if !lo.is_finite() {
        return None;
    }
    if hi > lo {
        let pad = (hi - lo) * 0.05;
        Some((lo - pad, hi + pad))
    } else {
        Some((lo - 1.0, hi + 1.0))
    }
}

/// Runs of consecutive finite points.
fn segments(x: &[f64], y: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (&xi, &yi) in x.iter().zip(y) {
        if xi.is_finite() && yi.is_finite() {
            current.push((xi, yi));
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

impl PlotRenderer for BitmapRenderer {
    fn id(&self) -> &str {
        "bitmap"
    }

    fn render(&self, _info: &PlotInfo, data: &PlotData, path: &Path) -> GridResult<()> {
        let (x_lo, x_hi) = bounds(data.x.iter())
            .ok_or_else(|| GridError::Render("no finite x values to plot".into()))?;
        let (y_lo, y_hi) = bounds(data.series.iter().flat_map(|(_, ys)| ys.iter()))
            .ok_or_else(|| GridError::Render("no finite values to plot".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(render_err)?;

        for (i, (_, ys)) in data.series.iter().enumerate() {
            let color = &PALETTE[i % PALETTE.len()];
            for segment in segments(&data.x, ys) {
                chart
                    .draw_series(LineSeries::new(segment, color))
                    .map_err(render_err)?;
            }
        }

        if let Some((_, first)) = data.series.first() {
            let marked: Vec<(f64, f64)> = data
                .markers
                .iter()
                .zip(data.x.iter().zip(first))
                .filter(|(flag, (x, y))| **flag && x.is_finite() && y.is_finite())
                .map(|(_, (x, y))| (*x, *y))
                .collect();
            chart
                .draw_series(marked.into_iter().map(|p| Circle::new(p, 4, RED.filled())))
                .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
        Ok(())
    }
}
