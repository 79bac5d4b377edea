//! Forecast evaluation shared by the transformer and load forecasting pipelines.
//!
//! The last `horizon` observations are held out and forecast from the rows
//! before them (the backtest), then `horizon` future rows are forecast from
//! the full history and appended with timestamps stepping by the series
//! frequency. Accuracy metrics only ever compare a forecast with an observed
//! value at the same row.

use gridsmith_algo::{
    compute_forecast_metrics, dispatch, ForecastMethod, ForecastRequest, LocalProvider, MetricMap,
    ProviderRegistry, Resolved,
};
use gridsmith_core::{columns, GridError, GridResult};
use gridsmith_io::frame::{column_f64, has_column};
use polars::prelude::*;
use tracing::{debug, warn};

use super::timestamps_ms;

const HOUR_MS: i64 = 3_600_000;

/// What to forecast and how to score it.
#[derive(Debug, Clone)]
pub struct ForecastSetup<'a> {
    pub timestamp_column: &'a str,
    pub value_column: &'a str,
    pub horizon: usize,
    pub method: ForecastMethod,
    /// Step between rows (`h`, `D`, `15min`, ...); inferred when `None`
    pub freq: Option<&'a str>,
    pub metrics: Option<&'a [String]>,
}

/// Output table plus metrics of one forecast evaluation.
#[derive(Debug, Clone)]
pub struct ForecastEvaluation {
    /// `n + horizon` rows: timestamp (when the input has one), the value
    /// column, `actual` and `forecast`
    pub table: DataFrame,
    pub metrics: MetricMap,
    /// Rows compared by the backtest; 0 when the history was too short
    pub backtest_rows: usize,
    pub future: Resolved<Vec<f64>>,
}

/// Parse a frequency rule into milliseconds.
///
/// A number followed by a unit: `s`, `m`/`min`/`T` (minutes), `h`, `D`.
/// The number defaults to 1 and the unit to seconds.
pub fn parse_freq(rule: &str) -> GridResult<i64> {
    let trimmed = rule.trim();
    if trimmed.is_empty() {
        return Err(GridError::Config("frequency cannot be empty".into()));
    }
    let unit_start = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (value_str, unit) = trimmed.split_at(unit_start);

    let value = match value_str.trim() {
        "" => 1,
        digits => digits
            .parse::<i64>()
            .map_err(|e| GridError::Config(format!("invalid frequency '{rule}': {e}")))?,
    };
    if value <= 0 {
        return Err(GridError::Config(format!("frequency must be positive, got '{rule}'")));
    }
    let seconds = match unit.to_ascii_lowercase().as_str() {
        "" | "s" => 1,
        "m" | "min" | "t" => 60,
        "h" => 3600,
        "d" => 86_400,
        other => {
            return Err(GridError::Config(format!(
                "unsupported frequency unit '{other}'; expected s/min/h/D"
            )))
        }
    };
    Ok(value * seconds * 1000)
}

fn step_ms(freq: Option<&str>, timestamps: Option<&[Option<i64>]>) -> GridResult<i64> {
    if let Some(rule) = freq {
        return parse_freq(rule);
    }
    let inferred = timestamps.and_then(|ts| {
        let observed: Vec<i64> = ts.iter().flatten().copied().collect();
        match observed.as_slice() {
            [.., a, b] if b > a => Some(b - a),
            _ => None,
        }
    });
    Ok(inferred.unwrap_or(HOUR_MS))
}

fn run_forecast(
    registry: &ProviderRegistry,
    local: &LocalProvider,
    request: &ForecastRequest<'_>,
) -> GridResult<Resolved<Vec<f64>>> {
    let resolved = dispatch::forecast(registry, local, request)?;
    let horizon = request.horizon;
    let values = resolved.value.values(horizon).ok_or_else(|| {
        GridError::Provider(format!(
            "forecast from '{}' carries fewer than {horizon} values",
            resolved.source
        ))
    })?;
    Ok(resolved.map(|_| values))
}

pub fn evaluate_forecast(
    registry: &ProviderRegistry,
    local: &LocalProvider,
    df: &DataFrame,
    setup: &ForecastSetup<'_>,
) -> GridResult<ForecastEvaluation> {
    let horizon = setup.horizon;
    if horizon == 0 {
        return Err(GridError::Validation("forecast horizon must be at least 1".into()));
    }
    let values = column_f64(df, setup.value_column)?;
    let n = values.len();
    let timestamps = if has_column(df, setup.timestamp_column) {
        Some(timestamps_ms(df, setup.timestamp_column)?)
    } else {
        None
    };
    let step = step_ms(setup.freq, timestamps.as_deref())?;

    let backtest = if n >= 2 * horizon {
        let cut = n - horizon;
        let history = df.slice(0, cut);
        let request = ForecastRequest {
            frame: &history,
            timestamp_column: setup.timestamp_column,
            value_column: setup.value_column,
            values: &values[..cut],
            horizon,
            method: setup.method,
        };
        Some(run_forecast(registry, local, &request)?)
    } else {
        warn!(
            rows = n,
            horizon,
            "history shorter than twice the horizon, skipping backtest"
        );
        None
    };

    let request = ForecastRequest {
        frame: df,
        timestamp_column: setup.timestamp_column,
        value_column: setup.value_column,
        values: &values,
        horizon,
        method: setup.method,
    };
    let future = run_forecast(registry, local, &request)?;
    debug!(source = %future.source, method = setup.method.name(), horizon, "forecast resolved");

    let total = n + horizon;
    let mut observed: Vec<Option<f64>> =
        values.iter().map(|v| v.is_finite().then_some(*v)).collect();
    observed.resize(total, None);

    let mut forecast: Vec<Option<f64>> = vec![None; total];
    if let Some(backtest) = &backtest {
        for (i, v) in backtest.value.iter().enumerate() {
            forecast[n - horizon + i] = Some(*v);
        }
    }
    for (i, v) in future.value.iter().enumerate() {
        forecast[n + i] = Some(*v);
    }

    let mut columns_out = Vec::with_capacity(4);
    if let Some(stamps) = &timestamps {
        let last = stamps.iter().rev().flatten().next().copied();
        let mut extended = stamps.clone();
        extended.extend((1..=horizon as i64).map(|k| last.map(|t| t + k * step)));
        columns_out.push(
            Series::new(setup.timestamp_column, extended)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        );
    }
    if setup.value_column != columns::ACTUAL {
        columns_out.push(Series::new(setup.value_column, observed.clone()));
    }
    columns_out.push(Series::new(columns::ACTUAL, observed));
    columns_out.push(Series::new(columns::FORECAST, forecast));
    let table = DataFrame::new(columns_out)?;

    let wants_metrics = setup.metrics.map_or(true, |names| !names.is_empty());
    let metrics = match &backtest {
        Some(backtest) if wants_metrics => compute_forecast_metrics(
            registry,
            &values[n - horizon..],
            &backtest.value,
            setup.metrics,
        )?,
        _ => MetricMap::new(),
    };

    Ok(ForecastEvaluation {
        table,
        metrics,
        backtest_rows: backtest.as_ref().map_or(0, |b| b.value.len()),
        future,
    })
}
