//! Pipeline results record.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The six analytics pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    AmiAnomaly,
    OutageEvent,
    TransformerForecast,
    TemperatureLoad,
    LoadForecasting,
    PredictiveMaintenance,
}

impl PipelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::AmiAnomaly => "ami_anomaly",
            PipelineKind::OutageEvent => "outage_event",
            PipelineKind::TransformerForecast => "transformer_forecast",
            PipelineKind::TemperatureLoad => "temperature_load",
            PipelineKind::LoadForecasting => "load_forecasting",
            PipelineKind::PredictiveMaintenance => "predictive_maintenance",
        }
    }

    pub fn all() -> &'static [PipelineKind] {
        &[
            PipelineKind::AmiAnomaly,
            PipelineKind::OutageEvent,
            PipelineKind::TransformerForecast,
            PipelineKind::TemperatureLoad,
            PipelineKind::LoadForecasting,
            PipelineKind::PredictiveMaintenance,
        ]
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a pipeline run produced.
///
/// `tables` and `figures` map logical names to files written by the same run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResults {
    pub metrics: BTreeMap<String, f64>,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub tables: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub figures: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl PipelineResults {
    pub fn metrics_path(&self) -> PathBuf {
        self.output_dir.join("metrics.json")
    }

    pub fn table(&self, name: &str) -> Option<&Path> {
        self.tables.get(name).map(PathBuf::as_path)
    }

    pub fn figure(&self, name: &str) -> Option<&Path> {
        self.figures.get(name).map(PathBuf::as_path)
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn pipeline(&self) -> Option<&str> {
        self.metadata.get("pipeline").and_then(Value::as_str)
    }
}
