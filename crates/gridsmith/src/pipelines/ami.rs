//! AMI (smart meter) consumption anomalies.

use gridsmith_algo::dispatch::detect_anomalies;
use gridsmith_algo::{split_from_spec, AnomalyMethod, AnomalyRequest, MetricMap};
use gridsmith_core::{columns, GridResult, MetricKind, PipelineConfig, PipelineKind, PipelineResults};
use gridsmith_io::frame::{column_bool, column_f64, has_column, require_column};
use gridsmith_viz::plot_anomalies;
use tracing::{info, warn};

use super::{
    attach_anomalies, evaluate_labels, load_input, plot_x, requested_metrics, timestamp_column,
    RunOutputs,
};
use crate::context::PipelineContext;

/// Flag anomalous `consumption` readings.
///
/// Existing `anomaly_score` and `is_anomaly` columns are kept as they are.
/// Otherwise the providers are asked first and the z-score detector answers
/// last. With a split spec the detector is fitted on the train rows and the
/// metrics are evaluated on the test rows.
pub fn run_ami_anomaly_pipeline(
    config: &PipelineConfig,
    context: &PipelineContext,
) -> GridResult<PipelineResults> {
    let timestamp = timestamp_column(config, columns::TIMESTAMP);
    let mut df = load_input(config, timestamp)?;
    require_column(&df, columns::CONSUMPTION)?;
    let local = context.local_provider(&config.metadata)?;
    let seed = config.random_state()?;
    let split = config
        .split_spec
        .as_ref()
        .map(|spec| split_from_spec(df.height(), spec, seed))
        .transpose()?;

    let mut outputs = RunOutputs::new(PipelineKind::AmiAnomaly, config);
    outputs.note_shape(&df);

    if has_column(&df, columns::ANOMALY_SCORE) && has_column(&df, columns::IS_ANOMALY) {
        info!("input already carries anomaly columns, skipping detection");
        outputs.note("provider_used", "input");
    } else {
        let value_columns = vec![columns::CONSUMPTION.to_string()];
        let resolved = {
            let request = AnomalyRequest {
                frame: &df,
                columns: &value_columns,
                method: AnomalyMethod::ZScore {
                    fit_rows: split.as_ref().map(|s| s.train.clone()),
                },
            };
            detect_anomalies(&context.providers, &local, &request)?
        };
        outputs.note_resolved("detect_anomalies", &resolved);
        attach_anomalies(&mut df, &resolved.value)?;
    }

    let labels = column_bool(&df, columns::IS_ANOMALY)?;
    let anomaly_count = labels.iter().filter(|l| **l).count();
    outputs.note("anomaly_count", anomaly_count);

    let names = requested_metrics(config, MetricKind::Anomaly);
    let metrics = if has_column(&df, columns::GROUND_TRUTH) {
        let truth = column_bool(&df, columns::GROUND_TRUTH)?;
        let scores = column_f64(&df, columns::ANOMALY_SCORE)?;
        evaluate_labels(
            &context.providers,
            &truth,
            &labels,
            Some(&scores),
            split.as_ref().map(|s| s.test.as_slice()),
            names.as_deref(),
        )?
    } else {
        if names.as_ref().is_some_and(|n| !n.is_empty()) {
            warn!("anomaly metrics requested but the input has no ground_truth column");
        }
        MetricMap::new()
    };

    outputs.write_table("anomaly_results", &mut df)?;
    let figure = plot_anomalies(
        &df,
        plot_x(&df, timestamp),
        columns::CONSUMPTION,
        columns::IS_ANOMALY,
        "AMI Anomaly Detection Results",
        &outputs.figure_path("anomaly_plot"),
        context.renderer(),
    )?;
    outputs.add_figure("anomaly_plot", figure);
    outputs.finish(metrics)
}
