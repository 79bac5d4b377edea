//! # gridsmith-io: loading and persisting pipeline data
//!
//! - [`load_csv`] / [`load_parquet`] / [`load_frame`] read a table and
//!   optionally parse one column into `Datetime(ms)`
//! - [`save_frame`] writes Parquet, CSV or JSON records
//! - [`save_json`] writes any serialisable value (used for `metrics.json`)
//! - [`sources`] builds the seeded synthetic tables used when no input file exists
//! - [`frame`] converts columns to and from plain vectors
//!
//! Writers create parent directories and write through a temporary file that
//! is renamed into place, so a reported path always names a complete file.

pub mod frame;
pub mod sources;

use std::{
    ffi::OsStr,
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use gridsmith_core::{GridError, GridResult};
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

/// On-disk table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Parquet,
    Csv,
    Json,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> GridResult<Self> {
        let extension = extension_of(path);
        match extension.as_str() {
            "parquet" => Ok(TableFormat::Parquet),
            "csv" => Ok(TableFormat::Csv),
            "json" => Ok(TableFormat::Json),
            other => Err(GridError::Validation(format!(
                "unsupported file format '.{other}' (use .parquet, .csv or .json)"
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Parquet => "parquet",
            TableFormat::Csv => "csv",
            TableFormat::Json => "json",
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// True if [`load_frame`] can read this path's extension.
pub fn is_supported_input(path: &Path) -> bool {
    matches!(extension_of(path).as_str(), "csv" | "parquet")
}

pub fn load_csv(path: &Path, timestamp_column: Option<&str>) -> GridResult<DataFrame> {
    let mut file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut df = CsvReader::new(&mut file)
        .has_header(true)
        .finish()
        .with_context(|| format!("reading CSV file {}", path.display()))?;
    parse_timestamps(&mut df, timestamp_column)?;
    Ok(df)
}

pub fn load_parquet(path: &Path, timestamp_column: Option<&str>) -> GridResult<DataFrame> {
    let mut file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut df = ParquetReader::new(&mut file)
        .finish()
        .with_context(|| format!("reading Parquet file {}", path.display()))?;
    parse_timestamps(&mut df, timestamp_column)?;
    Ok(df)
}

/// Load a CSV or Parquet table, choosing the reader from the extension.
pub fn load_frame(path: &Path, timestamp_column: Option<&str>) -> GridResult<DataFrame> {
    let extension = extension_of(path);
    match extension.as_str() {
        "csv" => load_csv(path, timestamp_column),
        "parquet" => load_parquet(path, timestamp_column),
        other => Err(GridError::Validation(format!(
            "Unsupported file format: '.{other}' (use .csv or .parquet)"
        ))),
    }
}

fn parse_timestamps(df: &mut DataFrame, timestamp_column: Option<&str>) -> GridResult<()> {
    match timestamp_column {
        Some(column) if frame::has_column(df, column) => parse_timestamp_column(df, column),
        _ => Ok(()),
    }
}

/// Convert `column` to `Datetime(Milliseconds)` in place.
///
/// Accepts strings (RFC 3339, `%Y-%m-%d %H:%M:%S`, ISO `T` form, bare dates),
/// dates, and integers interpreted as epoch milliseconds.
pub fn parse_timestamp_column(df: &mut DataFrame, column: &str) -> GridResult<()> {
    let series = df.column(column)?.clone();
    let millis = match series.dtype() {
        DataType::Datetime(_, _) => return Ok(()),
        DataType::Utf8 => {
            let parsed: Vec<Option<i64>> = series
                .utf8()?
                .into_iter()
                .map(|value| value.map(parse_timestamp_millis).transpose())
                .collect::<GridResult<_>>()?;
            Series::new(column, parsed)
        }
        DataType::Date => {
            return frame::set_column(
                df,
                series.cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
            )
        }
        dtype if dtype.is_integer() => series.cast(&DataType::Int64)?,
        other => {
            return Err(GridError::Validation(format!(
                "cannot parse column '{column}' of type {other} as timestamps"
            )))
        }
    };
    let timestamps = millis.cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    frame::set_column(df, timestamps)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse one timestamp string into epoch milliseconds (UTC).
pub fn parse_timestamp_millis(raw: &str) -> GridResult<i64> {
    let text = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    text.parse::<i64>()
        .map_err(|_| GridError::Parse(format!("unrecognised timestamp '{raw}'")))
}

fn staged_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("output"))
        .to_string_lossy();
    path.with_file_name(format!(".{file_name}.partial"))
}

fn prepare_parent(path: &Path) -> GridResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory '{}'", parent.display()))?;
        }
    }
    Ok(())
}

fn commit(staged: &Path, path: &Path) -> GridResult<()> {
    fs::rename(staged, path)
        .with_context(|| format!("moving {} to {}", staged.display(), path.display()))?;
    Ok(())
}

/// Run `write` against the staged path, then rename it into place. A failed
/// write leaves nothing behind.
fn write_staged(path: &Path, write: impl FnOnce(&Path) -> GridResult<()>) -> GridResult<()> {
    prepare_parent(path)?;
    let staged = staged_path(path);
    if let Err(err) = write(&staged) {
        if staged.exists() {
            if let Err(cleanup) = fs::remove_file(&staged) {
                warn!(path = %staged.display(), error = %cleanup, "could not remove staged file");
            }
        }
        return Err(err);
    }
    commit(&staged, path)
}

/// Write `df` to `path` in the given format.
pub fn save_frame(df: &mut DataFrame, path: &Path, format: TableFormat) -> GridResult<()> {
    write_staged(path, |staged| {
        let mut file = File::create(staged)
            .with_context(|| format!("creating {}", staged.display()))?;
        match format {
            TableFormat::Parquet => ParquetWriter::new(&mut file)
                .finish(df)
                .map(|_| ())
                .context("writing Parquet file")?,
            TableFormat::Csv => CsvWriter::new(&mut file)
                .finish(df)
                .context("writing CSV file")?,
            TableFormat::Json => JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::Json)
                .finish(df)
                .context("writing JSON records")?,
        }
        Ok(())
    })?;
    debug!(path = %path.display(), rows = df.height(), "wrote table");
    Ok(())
}

/// Write any serialisable value as pretty-printed JSON.
pub fn save_json<T: Serialize + ?Sized>(data: &T, path: &Path) -> GridResult<()> {
    write_staged(path, |staged| {
        let mut file = File::create(staged)
            .with_context(|| format!("creating {}", staged.display()))?;
        serde_json::to_writer_pretty(&mut file, data)?;
        Ok(())
    })?;
    debug!(path = %path.display(), "wrote json");
    Ok(())
}
