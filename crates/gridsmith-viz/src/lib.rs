//! # gridsmith-viz: pipeline figures
//!
//! The plot helpers extract the columns a figure needs, then hand them to an
//! optional [`PlotRenderer`]. Whatever happens, a file is written at the
//! reported path: the image when rendering succeeds, otherwise the
//! [`PlotInfo`] record as JSON next to the requested image (`<stem>.json`).

#[cfg(feature = "render")]
mod bitmap;

#[cfg(feature = "render")]
pub use bitmap::BitmapRenderer;

use std::path::{Path, PathBuf};

use gridsmith_core::{GridError, GridResult};
use gridsmith_io::frame::{column_bool, column_f64, column_i64, require_column};
use gridsmith_io::save_json;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    TimeSeries,
    Anomalies,
    Forecast,
}

/// What a figure shows and where it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotInfo {
    pub kind: PlotKind,
    pub title: String,
    /// `None` plots against the row number
    pub x_column: Option<String>,
    pub y_columns: Vec<String>,
    pub marker_column: Option<String>,
    /// (rows, columns) of the source table
    pub data_shape: (usize, usize),
    pub output_path: PathBuf,
    pub rendered: bool,
}

/// Numbers handed to a renderer. Missing values are NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotData {
    pub x: Vec<f64>,
    pub series: Vec<(String, Vec<f64>)>,
    /// Rows to highlight on the first series
    pub markers: Vec<bool>,
}

/// Draws a figure to an image file.
pub trait PlotRenderer: Send + Sync {
    fn id(&self) -> &str;

    fn render(&self, info: &PlotInfo, data: &PlotData, path: &Path) -> GridResult<()>;
}

/// Where the metadata record goes when no image is produced.
pub fn metadata_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("json")
}

fn x_values(df: &DataFrame, x_column: Option<&str>) -> GridResult<Vec<f64>> {
    match x_column {
        None => Ok((0..df.height()).map(|i| i as f64).collect()),
        Some(name) => {
            require_column(df, name)?;
            if matches!(df.column(name)?.dtype(), DataType::Datetime(_, _) | DataType::Date) {
                Ok(column_i64(df, name)?
                    .into_iter()
                    .map(|v| v.map_or(f64::NAN, |v| v as f64))
                    .collect())
            } else {
                column_f64(df, name)
            }
        }
    }
}

fn finish(
    mut info: PlotInfo,
    data: &PlotData,
    output_path: &Path,
    renderer: Option<&dyn PlotRenderer>,
) -> GridResult<PlotInfo> {
    if let Some(renderer) = renderer {
        match renderer.render(&info, data, output_path) {
            Ok(()) => {
                info.output_path = output_path.to_path_buf();
                info.rendered = true;
                info!(path = %output_path.display(), renderer = renderer.id(), "rendered figure");
                return Ok(info);
            }
            Err(err) => warn!(
                renderer = renderer.id(),
                error = %err,
                "rendering failed, writing plot metadata instead"
            ),
        }
    }
    info.output_path = metadata_path(output_path);
    info.rendered = false;
    save_json(&info, &info.output_path)?;
    info!(path = %info.output_path.display(), "wrote plot metadata");
    Ok(info)
}

/// One line per `y_columns` entry against `x_column`.
pub fn plot_time_series(
    df: &DataFrame,
    x_column: Option<&str>,
    y_columns: &[&str],
    title: &str,
    output_path: &Path,
    renderer: Option<&dyn PlotRenderer>,
) -> GridResult<PlotInfo> {
    if y_columns.is_empty() {
        return Err(GridError::Validation("a time series plot needs at least one column".into()));
    }
    let data = PlotData {
        x: x_values(df, x_column)?,
        series: y_columns
            .iter()
            .map(|name| column_f64(df, name).map(|values| (name.to_string(), values)))
            .collect::<GridResult<_>>()?,
        markers: Vec::new(),
    };
    let info = PlotInfo {
        kind: PlotKind::TimeSeries,
        title: title.to_string(),
        x_column: x_column.map(str::to_string),
        y_columns: y_columns.iter().map(|s| s.to_string()).collect(),
        marker_column: None,
        data_shape: df.shape(),
        output_path: output_path.to_path_buf(),
        rendered: false,
    };
    finish(info, &data, output_path, renderer)
}

/// `value_column` with rows flagged in `anomaly_column` marked.
pub fn plot_anomalies(
    df: &DataFrame,
    x_column: Option<&str>,
    value_column: &str,
    anomaly_column: &str,
    title: &str,
    output_path: &Path,
    renderer: Option<&dyn PlotRenderer>,
) -> GridResult<PlotInfo> {
    let data = PlotData {
        x: x_values(df, x_column)?,
        series: vec![(value_column.to_string(), column_f64(df, value_column)?)],
        markers: column_bool(df, anomaly_column)?,
    };
    let info = PlotInfo {
        kind: PlotKind::Anomalies,
        title: title.to_string(),
        x_column: x_column.map(str::to_string),
        y_columns: vec![value_column.to_string()],
        marker_column: Some(anomaly_column.to_string()),
        data_shape: df.shape(),
        output_path: output_path.to_path_buf(),
        rendered: false,
    };
    finish(info, &data, output_path, renderer)
}

/// Observed values and forecasts on one axis; gaps (nulls) break the lines.
pub fn plot_forecast(
    df: &DataFrame,
    x_column: Option<&str>,
    actual_column: &str,
    forecast_column: &str,
    title: &str,
    output_path: &Path,
    renderer: Option<&dyn PlotRenderer>,
) -> GridResult<PlotInfo> {
    let data = PlotData {
        x: x_values(df, x_column)?,
        series: vec![
            (actual_column.to_string(), column_f64(df, actual_column)?),
            (forecast_column.to_string(), column_f64(df, forecast_column)?),
        ],
        markers: Vec::new(),
    };
    let info = PlotInfo {
        kind: PlotKind::Forecast,
        title: title.to_string(),
        x_column: x_column.map(str::to_string),
        y_columns: vec![actual_column.to_string(), forecast_column.to_string()],
        marker_column: None,
        data_shape: df.shape(),
        output_path: output_path.to_path_buf(),
        rendered: false,
    };
    finish(info, &data, output_path, renderer)
}
