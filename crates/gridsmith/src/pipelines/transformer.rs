//! Transformer load forecast.

use gridsmith_algo::ForecastMethod;
use gridsmith_core::{columns, GridResult, MetricKind, PipelineConfig, PipelineKind, PipelineResults};
use gridsmith_viz::plot_forecast;

use super::forecasting::{evaluate_forecast, ForecastSetup};
use super::{load_input, plot_x, require_one_of, requested_metrics, timestamp_column, RunOutputs};
use crate::context::PipelineContext;

const DEFAULT_HORIZON: usize = 24;

/// Forecast the transformer's value column `horizon` steps ahead, preferring
/// exponential smoothing.
pub fn run_transformer_forecast_pipeline(
    config: &PipelineConfig,
    context: &PipelineContext,
) -> GridResult<PipelineResults> {
    let timestamp = timestamp_column(config, columns::TIMESTAMP);
    let df = load_input(config, timestamp)?;
    let value_column = require_one_of(&df, columns::VALUE_CANDIDATES, "value")?;
    let local = context.local_provider(&config.metadata)?;
    let horizon = config.metadata.get_usize("horizon", DEFAULT_HORIZON)?;
    let names = requested_metrics(config, MetricKind::Forecast);

    let mut outputs = RunOutputs::new(PipelineKind::TransformerForecast, config);
    outputs.note_shape(&df);

    let setup = ForecastSetup {
        timestamp_column: timestamp,
        value_column,
        horizon,
        method: ForecastMethod::ExponentialSmoothing,
        freq: config.metadata.get_opt_str("freq")?,
        metrics: names.as_deref(),
    };
    let mut evaluation = evaluate_forecast(&context.providers, &local, &df, &setup)?;
    outputs.note_resolved("forecast", &evaluation.future);
    outputs.note("value_column", value_column);
    outputs.note("horizon", horizon);
    outputs.note("forecast_method", setup.method.name());
    outputs.note("backtest_rows", evaluation.backtest_rows);

    outputs.write_table("forecast_results", &mut evaluation.table)?;
    let figure = plot_forecast(
        &evaluation.table,
        plot_x(&evaluation.table, timestamp),
        columns::ACTUAL,
        columns::FORECAST,
        "Transformer Forecast Results",
        &outputs.figure_path("forecast_plot"),
        context.renderer(),
    )?;
    outputs.add_figure("forecast_plot", figure);
    outputs.finish(evaluation.metrics)
}
