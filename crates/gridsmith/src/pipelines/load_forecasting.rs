//! Hourly system load forecast with ARIMA.

use gridsmith_algo::ForecastMethod;
use gridsmith_core::{columns, GridResult, MetricKind, PipelineConfig, PipelineKind, PipelineResults};
use gridsmith_io::sources::{hourly_load_frame, HourlyLoadParams};
use gridsmith_viz::plot_forecast;
use tracing::info;

use super::forecasting::{evaluate_forecast, ForecastSetup};
use super::{
    check_schema, load_input, plot_x, require_one_of, requested_metrics, timestamp_column,
    RunOutputs,
};
use crate::context::PipelineContext;

const DEFAULT_HORIZON: usize = 24;

/// Forecast hourly load `forecast_horizon` steps ahead with ARIMA(`arima_order`).
///
/// When the input path does not exist a seeded synthetic year of hourly load
/// is used instead.
pub fn run_load_forecasting_pipeline(
    config: &PipelineConfig,
    context: &PipelineContext,
) -> GridResult<PipelineResults> {
    let timestamp = timestamp_column(config, columns::TIMESTAMP);
    let synthetic = !config.input_path.exists();
    let df = if synthetic {
        info!(path = %config.input_path.display(), "input not found, generating synthetic hourly load");
        let df = hourly_load_frame(&HourlyLoadParams::from_metadata(&config.metadata)?)?;
        check_schema(&df, config)?;
        df
    } else {
        load_input(config, timestamp)?
    };
    let load_column = require_one_of(&df, columns::LOAD_CANDIDATES, "load")?;
    let local = context.local_provider(&config.metadata)?;
    let horizon = config.metadata.get_usize("forecast_horizon", DEFAULT_HORIZON)?;
    let names = requested_metrics(config, MetricKind::Forecast);

    let mut outputs = RunOutputs::new(PipelineKind::LoadForecasting, config);
    outputs.note_shape(&df);
    outputs.note("synthetic_input", synthetic);

    let order = local.params().arima_order;
    let setup = ForecastSetup {
        timestamp_column: timestamp,
        value_column: load_column,
        horizon,
        method: ForecastMethod::arima(order),
        freq: config.metadata.get_opt_str("freq")?,
        metrics: names.as_deref(),
    };
    let mut evaluation = evaluate_forecast(&context.providers, &local, &df, &setup)?;
    outputs.note_resolved("forecast", &evaluation.future);
    outputs.note("load_column", load_column);
    outputs.note("horizon", horizon);
    outputs.note("arima_order", vec![order.0, order.1, order.2]);
    outputs.note("backtest_rows", evaluation.backtest_rows);

    outputs.write_table("load_forecast_results", &mut evaluation.table)?;
    let figure = plot_forecast(
        &evaluation.table,
        plot_x(&evaluation.table, timestamp),
        columns::ACTUAL,
        columns::FORECAST,
        "Load Forecasting Results",
        &outputs.figure_path("load_forecast_plot"),
        context.renderer(),
    )?;
    outputs.add_figure("load_forecast_plot", figure);
    outputs.finish(evaluation.metrics)
}
