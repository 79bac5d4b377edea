//! Predictive maintenance: multivariate sensor anomalies.

use gridsmith_algo::dispatch::detect_anomalies;
use gridsmith_algo::{AnomalyMethod, AnomalyRequest, MetricMap};
use gridsmith_core::{
    columns, GridError, GridResult, MetricKind, PipelineConfig, PipelineKind, PipelineResults,
};
use gridsmith_io::frame::{column_bool, column_f64, column_names, has_column};
use gridsmith_viz::plot_anomalies;

use super::{
    attach_anomalies, evaluate_labels, load_input, plot_x, requested_metrics, timestamp_column,
    RunOutputs,
};
use crate::context::PipelineContext;

/// Score equipment readings with the providers, falling back to an
/// isolation forest over every available sensor feature. Metrics compare
/// the labels with the `Failure` column when present.
pub fn run_predictive_maintenance_pipeline(
    config: &PipelineConfig,
    context: &PipelineContext,
) -> GridResult<PipelineResults> {
    let timestamp = timestamp_column(config, columns::TIMESTAMP);
    let mut df = load_input(config, timestamp)?;
    let available = column_names(&df);
    let features: Vec<String> = columns::MAINTENANCE_FEATURES
        .iter()
        .filter(|name| available.iter().any(|col| col == *name))
        .map(|name| name.to_string())
        .collect();
    let first_feature = features.first().cloned().ok_or_else(|| {
        GridError::Validation(format!(
            "no sensor feature columns found; expected at least one of: {}",
            columns::MAINTENANCE_FEATURES.join(", ")
        ))
    })?;
    let local = context.local_provider(&config.metadata)?;

    let mut outputs = RunOutputs::new(PipelineKind::PredictiveMaintenance, config);
    outputs.note_shape(&df);
    outputs.note("feature_columns", features.clone());

    let resolved = {
        let request = AnomalyRequest {
            frame: &df,
            columns: &features,
            method: AnomalyMethod::IsolationForest,
        };
        detect_anomalies(&context.providers, &local, &request)?
    };
    outputs.note_resolved("detect_anomalies", &resolved);
    attach_anomalies(&mut df, &resolved.value)?;
    let labels = resolved.value.labels;
    outputs.note("anomaly_count", labels.iter().filter(|l| **l).count());

    let metrics = if has_column(&df, columns::FAILURE) {
        let truth = column_bool(&df, columns::FAILURE)?;
        let scores = column_f64(&df, columns::ANOMALY_SCORE)?;
        let names = requested_metrics(config, MetricKind::Anomaly);
        evaluate_labels(
            &context.providers,
            &truth,
            &labels,
            Some(&scores),
            None,
            names.as_deref(),
        )?
    } else {
        MetricMap::new()
    };

    outputs.write_table("predictive_maintenance_results", &mut df)?;
    let figure = plot_anomalies(
        &df,
        plot_x(&df, timestamp),
        &first_feature,
        columns::IS_ANOMALY,
        "Predictive Maintenance Anomaly Detection",
        &outputs.figure_path("anomaly_plot"),
        context.renderer(),
    )?;
    outputs.add_figure("anomaly_plot", figure);
    outputs.finish(metrics)
}
