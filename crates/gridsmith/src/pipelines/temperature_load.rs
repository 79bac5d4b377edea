//! Temperature-to-load regression.

use gridsmith_algo::dispatch::fit_regression;
use gridsmith_algo::{compute_regression_metrics, split_from_spec, MetricMap, RegressionRequest};
use gridsmith_core::{
    columns, GridError, GridResult, MetricKind, PipelineConfig, PipelineKind, PipelineResults,
    SplitSpec,
};
use gridsmith_io::frame::{column_f64, require_column, rows_f64, set_column, take_rows};
use gridsmith_io::sources::{temperature_load_frame, TemperatureLoadParams};
use gridsmith_viz::{plot_forecast, plot_time_series};
use polars::prelude::*;
use tracing::info;

use super::{check_schema, load_input, pick, plot_x, requested_metrics, timestamp_column, RunOutputs};
use crate::context::PipelineContext;

const DEFAULT_METRICS: &[&str] = &["mse", "r2", "mae"];

/// The split from the config, else a shuffled one with `test_size` (0.2).
fn split_spec(config: &PipelineConfig) -> GridResult<SplitSpec> {
    if let Some(spec) = &config.split_spec {
        return Ok(spec.clone());
    }
    Ok(SplitSpec {
        test_ratio: config.metadata.get_f64("test_size", 0.2)?,
        ..SplitSpec::default()
    })
}

/// Row order by ascending temperature, for a readable load-vs-temperature line.
fn by_temperature(temperature: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..temperature.len()).collect();
    order.sort_by(|&a, &b| temperature[a].total_cmp(&temperature[b]));
    order
}

/// Fit `Load_MW` on `Temperature_C` over the train rows and score the test rows.
///
/// When the input path does not exist a seeded synthetic year of daily
/// temperature and load is used instead.
pub fn run_temperature_load_pipeline(
    config: &PipelineConfig,
    context: &PipelineContext,
) -> GridResult<PipelineResults> {
    let timestamp = timestamp_column(config, columns::DATE);
    let synthetic = !config.input_path.exists();
    let mut df = if synthetic {
        info!(path = %config.input_path.display(), "input not found, generating synthetic temperature and load");
        let df = temperature_load_frame(&TemperatureLoadParams::from_metadata(&config.metadata)?)?;
        check_schema(&df, config)?;
        df
    } else {
        load_input(config, timestamp)?
    };
    require_column(&df, columns::TEMPERATURE_C)?;
    require_column(&df, columns::LOAD_MW)?;
    let local = context.local_provider(&config.metadata)?;
    let split = split_from_spec(df.height(), &split_spec(config)?, config.random_state()?)?;

    let features = rows_f64(&df, &[columns::TEMPERATURE_C])?;
    let target = column_f64(&df, columns::LOAD_MW)?;
    let train: Vec<usize> = split
        .train
        .iter()
        .copied()
        .filter(|&i| target[i].is_finite() && features[i].iter().all(|v| v.is_finite()))
        .collect();
    if train.len() < 2 {
        return Err(GridError::Validation(format!(
            "need at least 2 complete training rows, got {}",
            train.len()
        )));
    }

    let mut outputs = RunOutputs::new(PipelineKind::TemperatureLoad, config);
    outputs.note_shape(&df);
    outputs.note("synthetic_input", synthetic);
    outputs.note("train_rows", train.len());
    outputs.note("test_rows", split.test.len());

    let train_x = pick_rows(&features, &train);
    let train_y = pick(&target, &train);
    let resolved = fit_regression(
        &context.providers,
        &local,
        &RegressionRequest {
            features: &train_x,
            target: &train_y,
        },
    )?;
    outputs.note_resolved("fit_regression", &resolved);
    let fit = resolved.value;
    let coefficient = fit.coefficients.first().copied().unwrap_or(f64::NAN);
    outputs.note("model_coefficient", coefficient);
    outputs.note("model_intercept", fit.intercept);

    let predicted = fit.predict(&features);
    let residual: Vec<f64> = target.iter().zip(&predicted).map(|(y, p)| y - p).collect();

    // `coefficient` is only reported alongside the default metrics
    let requested = requested_metrics(config, MetricKind::Regression);
    let defaults = requested.is_none();
    let names = requested
        .unwrap_or_else(|| DEFAULT_METRICS.iter().map(|s| s.to_string()).collect());
    let mut metrics = if names.is_empty() {
        MetricMap::new()
    } else {
        compute_regression_metrics(
            &context.providers,
            &pick(&target, &split.test),
            &pick(&predicted, &split.test),
            Some(&names),
        )?
    };
    if defaults {
        metrics.insert("coefficient".to_string(), coefficient);
    }

    set_column(&mut df, Series::new(columns::PREDICTED_LOAD, predicted))?;
    set_column(&mut df, Series::new(columns::RESIDUAL, residual))?;
    outputs.write_table("temperature_load_results", &mut df)?;

    let temperature: Vec<f64> = features.iter().map(|row| row[0]).collect();
    let sorted = take_rows(&df, &by_temperature(&temperature))?;
    let figure = plot_time_series(
        &sorted,
        Some(columns::TEMPERATURE_C),
        &[columns::LOAD_MW],
        "Temperature vs Load",
        &outputs.figure_path("temperature_load_plot"),
        context.renderer(),
    )?;
    outputs.add_figure("temperature_load_plot", figure);

    let figure = plot_forecast(
        &df,
        plot_x(&df, timestamp),
        columns::LOAD_MW,
        columns::PREDICTED_LOAD,
        "Temperature-to-Load Predictions",
        &outputs.figure_path("predictions_plot"),
        context.renderer(),
    )?;
    outputs.add_figure("predictions_plot", figure);
    outputs.finish(metrics)
}

fn pick_rows(rows: &[Vec<f64>], indices: &[usize]) -> Vec<Vec<f64>> {
    indices.iter().filter_map(|&i| rows.get(i).cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsmith_core::Metadata;

    #[test]
    fn split_spec_reads_test_size() {
        let config = PipelineConfig::new("missing.csv", "out")
            .with_metadata(Metadata::new().with("test_size", 0.3));
        let spec = split_spec(&config).unwrap();
        assert_eq!(spec.test_ratio, 0.3);
        assert!(spec.shuffle);
    }

    #[test]
    fn by_temperature_sorts_ascending() {
        assert_eq!(by_temperature(&[3.0, -1.0, 2.0]), vec![1, 2, 0]);
    }
}
