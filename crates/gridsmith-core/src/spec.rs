//! Dataset, split and metric specifications.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

/// Expected shape of an input dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub required_columns: Vec<String>,
    #[serde(default)]
    pub timestamp_column: Option<String>,
}

impl DatasetSpec {
    pub fn new<I, S>(name: &str, required_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            required_columns: required_columns.into_iter().map(Into::into).collect(),
            timestamp_column: None,
        }
    }

    pub fn with_timestamp(mut self, column: &str) -> Self {
        self.timestamp_column = Some(column.to_string());
        self
    }
}

/// Train/test split parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default)]
    pub random_state: Option<u64>,
}

fn default_test_ratio() -> f64 {
    0.2
}

fn default_shuffle() -> bool {
    true
}

impl Default for SplitSpec {
    fn default() -> Self {
        Self {
            test_ratio: default_test_ratio(),
            shuffle: default_shuffle(),
            random_state: None,
        }
    }
}

/// Which family a metric belongs to; pipelines only evaluate the kinds they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Regression,
    Anomaly,
    Forecast,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Regression => "regression",
            MetricKind::Anomaly => "anomaly",
            MetricKind::Forecast => "forecast",
        };
        f.write_str(name)
    }
}

/// A named metric to compute, e.g. `{ name = "f1", type = "anomaly" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
}

impl MetricSpec {
    pub fn new(name: &str, kind: MetricKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    pub fn anomaly(name: &str) -> Self {
        Self::new(name, MetricKind::Anomaly)
    }

    pub fn regression(name: &str) -> Self {
        Self::new(name, MetricKind::Regression)
    }

    pub fn forecast(name: &str) -> Self {
        Self::new(name, MetricKind::Forecast)
    }
}

/// Names of the specs of one kind, in declaration order.
pub fn metric_names(specs: &[MetricSpec], kind: MetricKind) -> Vec<String> {
    specs
        .iter()
        .filter(|spec| spec.kind == kind)
        .map(|spec| spec.name.clone())
        .collect()
}

/// Check that every required column of `spec` is present.
pub fn validate_schema<I, S>(columns: I, spec: &DatasetSpec) -> GridResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let present: BTreeSet<String> = columns
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect();
    let missing: Vec<&str> = spec
        .required_columns
        .iter()
        .chain(spec.timestamp_column.iter())
        .filter(|col| !present.contains(col.as_str()))
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    let dataset = if spec.name.is_empty() {
        "dataset".to_string()
    } else {
        format!("dataset '{}'", spec.name)
    };
    Err(GridError::Validation(format!(
        "{dataset} is missing required columns: {}",
        missing.join(", ")
    )))
}
