//! The six analytics pipelines and the plumbing they share.
//!
//! Every pipeline has the same shape: load the input, check its columns,
//! resolve the computation through the provider chain, compute metrics, then
//! persist tables, figures and `metrics.json` under the output directory.
//! All validation happens before the first write.

mod ami;
mod forecasting;
mod load_forecasting;
mod maintenance;
mod outage;
mod temperature_load;
mod transformer;

pub use ami::run_ami_anomaly_pipeline;
pub use forecasting::{evaluate_forecast, parse_freq, ForecastEvaluation, ForecastSetup};
pub use load_forecasting::run_load_forecasting_pipeline;
pub use maintenance::run_predictive_maintenance_pipeline;
pub use outage::run_outage_event_pipeline;
pub use temperature_load::run_temperature_load_pipeline;
pub use transformer::run_transformer_forecast_pipeline;

use std::collections::BTreeMap;
use std::path::PathBuf;

use gridsmith_algo::{compute_anomaly_metrics, AnomalyOutput, MetricMap, ProviderRegistry, Resolved};
use gridsmith_core::{
    columns, metric_names, validate_schema, GridError, GridResult, MetricKind, PipelineConfig,
    PipelineKind, PipelineResults,
};
use gridsmith_io::frame::{column_names, has_column, set_column};
use gridsmith_io::{load_frame, save_frame, save_json, TableFormat};
use gridsmith_viz::PlotInfo;
use polars::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

/// Timestamp column for this run: the dataset spec's, else `default`.
fn timestamp_column<'a>(config: &'a PipelineConfig, default: &'a str) -> &'a str {
    config
        .dataset_spec
        .as_ref()
        .and_then(|spec| spec.timestamp_column.as_deref())
        .unwrap_or(default)
}

/// Epoch milliseconds of a datetime column.
fn timestamps_ms(df: &DataFrame, name: &str) -> GridResult<Vec<Option<i64>>> {
    let series = df.column(name)?;
    let millis = match series.dtype() {
        DataType::Datetime(TimeUnit::Milliseconds, _) => series.clone(),
        DataType::Datetime(_, _) | DataType::Date => {
            series.cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
        other => {
            return Err(GridError::Validation(format!(
                "timestamp column '{name}' has type {other}, expected datetime"
            )))
        }
    };
    Ok(millis.cast(&DataType::Int64)?.i64()?.into_iter().collect())
}

/// Check the loaded frame against the optional dataset spec.
fn check_schema(df: &DataFrame, config: &PipelineConfig) -> GridResult<()> {
    match &config.dataset_spec {
        Some(spec) => validate_schema(column_names(df), spec),
        None => Ok(()),
    }
}

/// Read the input file, parsing the timestamp column when present.
fn load_input(config: &PipelineConfig, default_timestamp: &str) -> GridResult<DataFrame> {
    let timestamp = timestamp_column(config, default_timestamp);
    let df = load_frame(&config.input_path, Some(timestamp))?;
    check_schema(&df, config)?;
    debug!(
        path = %config.input_path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded input"
    );
    Ok(df)
}

/// Metric names of `kind` from the config; `None` when no specs were given,
/// which lets the metric functions use their defaults.
fn requested_metrics(config: &PipelineConfig, kind: MetricKind) -> Option<Vec<String>> {
    config
        .metric_specs
        .as_deref()
        .map(|specs| metric_names(specs, kind))
}

fn require_one_of<'a>(df: &DataFrame, candidates: &[&'a str], what: &str) -> GridResult<&'a str> {
    columns::find_column(&column_names(df), candidates).ok_or_else(|| {
        GridError::Validation(format!(
            "no {what} column found; expected one of: {}",
            candidates.join(", ")
        ))
    })
}

/// The timestamp column as plot x axis, if the frame has one.
fn plot_x<'a>(df: &DataFrame, timestamp: &'a str) -> Option<&'a str> {
    has_column(df, timestamp).then_some(timestamp)
}

fn pick<T: Copy>(values: &[T], rows: &[usize]) -> Vec<T> {
    rows.iter().filter_map(|&i| values.get(i).copied()).collect()
}

/// Classification metrics of `predicted` against `truth`, restricted to
/// `rows` when given. An explicitly empty metric list computes nothing.
fn evaluate_labels(
    registry: &ProviderRegistry,
    truth: &[bool],
    predicted: &[bool],
    scores: Option<&[f64]>,
    rows: Option<&[usize]>,
    names: Option<&[String]>,
) -> GridResult<MetricMap> {
    if names.is_some_and(|n| n.is_empty()) {
        return Ok(MetricMap::new());
    }
    match rows {
        None => compute_anomaly_metrics(registry, truth, predicted, scores, names),
        Some(rows) => {
            let truth = pick(truth, rows);
            let predicted = pick(predicted, rows);
            let scores = scores.map(|s| pick(s, rows));
            compute_anomaly_metrics(registry, &truth, &predicted, scores.as_deref(), names)
        }
    }
}

/// `anomaly_score` (null where the detector gave none) and `is_anomaly` columns.
fn attach_anomalies(df: &mut DataFrame, output: &AnomalyOutput) -> GridResult<()> {
    let scores: Vec<Option<f64>> = match &output.scores {
        Some(scores) => scores.iter().map(|s| s.is_finite().then_some(*s)).collect(),
        None => vec![None; output.labels.len()],
    };
    set_column(df, Series::new(columns::ANOMALY_SCORE, scores))?;
    set_column(df, Series::new(columns::IS_ANOMALY, output.labels.as_slice()))?;
    Ok(())
}

/// Files and metadata a run accumulates before it is summarised.
///
/// Nothing touches the filesystem until the first `write_table`, `figure_path`
/// use, or `finish`.
struct RunOutputs {
    output_dir: PathBuf,
    tables: BTreeMap<String, PathBuf>,
    figures: BTreeMap<String, PathBuf>,
    metadata: BTreeMap<String, Value>,
}

impl RunOutputs {
    fn new(kind: PipelineKind, config: &PipelineConfig) -> Self {
        info!(pipeline = %kind, input = %config.input_path.display(), "starting pipeline");
        let mut metadata = BTreeMap::new();
        metadata.insert("pipeline".to_string(), Value::from(kind.as_str()));
        Self {
            output_dir: config.output_dir.clone(),
            tables: BTreeMap::new(),
            figures: BTreeMap::new(),
            metadata,
        }
    }

    fn note(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    fn note_shape(&mut self, df: &DataFrame) {
        let (rows, cols) = df.shape();
        self.note("input_shape", vec![rows, cols]);
    }

    /// Record which strategy answered `operation`, and who failed before it.
    fn note_resolved<T>(&mut self, operation: &str, resolved: &Resolved<T>) {
        self.note("provider_used", resolved.source.as_str());
        if !resolved.failures.is_empty() {
            let failed: Vec<Value> = resolved
                .failures
                .iter()
                .map(|f| Value::from(f.strategy.as_str()))
                .collect();
            self.note(&format!("{operation}_failed_providers"), failed);
        }
    }

    /// Write `tables/<name>.parquet`.
    fn write_table(&mut self, name: &str, df: &mut DataFrame) -> GridResult<()> {
        let path = self
            .output_dir
            .join("tables")
            .join(format!("{name}.{}", TableFormat::Parquet.extension()));
        save_frame(df, &path, TableFormat::Parquet)?;
        info!(table = name, path = %path.display(), rows = df.height(), "saved table");
        self.tables.insert(name.to_string(), path);
        Ok(())
    }

    /// Requested image path for figure `name`; the plot helpers may write
    /// metadata JSON beside it instead.
    fn figure_path(&self, name: &str) -> PathBuf {
        self.output_dir.join("figures").join(format!("{name}.png"))
    }

    fn add_figure(&mut self, name: &str, info: PlotInfo) {
        self.figures.insert(name.to_string(), info.output_path);
    }

    fn finish(self, metrics: MetricMap) -> GridResult<PipelineResults> {
        let results = PipelineResults {
            metrics,
            output_dir: self.output_dir,
            tables: self.tables,
            figures: self.figures,
            metadata: self.metadata,
        };
        save_json(&results.metrics, &results.metrics_path())?;
        info!(
            pipeline = results.pipeline().unwrap_or_default(),
            metrics = results.metrics.len(),
            tables = results.tables.len(),
            figures = results.figures.len(),
            "pipeline finished"
        );
        Ok(results)
    }
}
