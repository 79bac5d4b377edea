//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is plain data: where to read, where to write, which
//! schema and metrics apply, and a free-form metadata map for pipeline knobs
//! (horizon, seeds, synthetic-data parameters, fallback parameters).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GridError, GridResult};
use crate::spec::{DatasetSpec, MetricSpec, SplitSpec};

pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Free-form metadata with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Convert a present value with `convert`; a value of the wrong type is a
    /// config error rather than a silent default.
    fn typed<'a, T>(
        &'a self,
        key: &str,
        expected: &str,
        convert: impl Fn(&'a Value) -> Option<T>,
    ) -> GridResult<Option<T>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => convert(value).map(Some).ok_or_else(|| {
                GridError::Config(format!("'{key}' must be {expected}, got {value}"))
            }),
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> GridResult<f64> {
        Ok(self.typed(key, "a number", Value::as_f64)?.unwrap_or(default))
    }

    pub fn get_u64(&self, key: &str, default: u64) -> GridResult<u64> {
        Ok(self
            .typed(key, "a non-negative integer", Value::as_u64)?
            .unwrap_or(default))
    }

    pub fn get_usize(&self, key: &str, default: usize) -> GridResult<usize> {
        let value = self.typed(key, "a non-negative integer", |v| {
            v.as_u64().and_then(|n| usize::try_from(n).ok())
        })?;
        Ok(value.unwrap_or(default))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> GridResult<bool> {
        Ok(self.typed(key, "a boolean", Value::as_bool)?.unwrap_or(default))
    }

    pub fn get_opt_str(&self, key: &str) -> GridResult<Option<&str>> {
        self.typed(key, "a string", Value::as_str)
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> GridResult<&'a str> {
        Ok(self.get_opt_str(key)?.unwrap_or(default))
    }

    /// Read a `[p, d, q]` triple; anything malformed is a config error.
    pub fn get_order(&self, key: &str, default: (usize, usize, usize)) -> GridResult<(usize, usize, usize)> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        let parts: Option<Vec<usize>> = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|v| v.as_u64().map(|n| n as usize))
                    .collect::<Option<Vec<usize>>>()
            })
            .unwrap_or(None);
        match parts.as_deref() {
            Some([p, d, q]) => Ok((*p, *d, *q)),
            _ => Err(GridError::Config(format!(
                "'{key}' must be a list of three non-negative integers, got {value}"
            ))),
        }
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for Metadata {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Configuration shared by every pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub dataset_spec: Option<DatasetSpec>,
    #[serde(default)]
    pub split_spec: Option<SplitSpec>,
    #[serde(default)]
    pub metric_specs: Option<Vec<MetricSpec>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PipelineConfig {
    pub fn new(input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_dataset_spec(mut self, spec: DatasetSpec) -> Self {
        self.dataset_spec = Some(spec);
        self
    }

    pub fn with_split_spec(mut self, spec: SplitSpec) -> Self {
        self.split_spec = Some(spec);
        self
    }

    pub fn with_metric_specs(mut self, specs: Vec<MetricSpec>) -> Self {
        self.metric_specs = Some(specs);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn metric_specs(&self) -> &[MetricSpec] {
        self.metric_specs.as_deref().unwrap_or(&[])
    }

    /// Seed for every random draw of a run.
    pub fn random_state(&self) -> GridResult<u64> {
        self.metadata.get_u64("random_state", DEFAULT_RANDOM_STATE)
    }

    pub fn from_toml_str(text: &str) -> GridResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> GridResult<Self> {
        serde_json::from_str(text).map_err(|e| GridError::Config(e.to_string()))
    }

    /// Load a config file, choosing the format from its extension.
    pub fn from_path(path: &Path) -> GridResult<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file '{}'", path.display()))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "toml" => Self::from_toml_str(&text),
            "json" => Self::from_json_str(&text),
            other => Err(GridError::Config(format!(
                "unsupported config extension '{other}' (use .toml or .json)"
            ))),
        }
    }
}

/// Parameters of the local fallback computations.
///
/// Each field can be overridden through the metadata key of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackParams {
    pub zscore_threshold: f64,
    pub arima_order: (usize, usize, usize),
    pub contamination: f64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub outage_threshold: f64,
    pub random_state: u64,
}

impl Default for FallbackParams {
    fn default() -> Self {
        Self {
            zscore_threshold: 2.0,
            arima_order: (1, 1, 1),
            contamination: 0.1,
            n_estimators: 100,
            max_samples: 256,
            outage_threshold: 0.0,
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

impl FallbackParams {
    pub fn from_metadata(metadata: &Metadata) -> GridResult<Self> {
        let defaults = Self::default();
        let params = Self {
            zscore_threshold: metadata.get_f64("zscore_threshold", defaults.zscore_threshold)?,
            arima_order: metadata.get_order("arima_order", defaults.arima_order)?,
            contamination: metadata.get_f64("contamination", defaults.contamination)?,
            n_estimators: metadata.get_usize("n_estimators", defaults.n_estimators)?,
            max_samples: metadata.get_usize("max_samples", defaults.max_samples)?,
            outage_threshold: metadata.get_f64("outage_threshold", defaults.outage_threshold)?,
            random_state: metadata.get_u64("random_state", defaults.random_state)?,
        };
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> GridResult<()> {
        if !(self.zscore_threshold.is_finite() && self.zscore_threshold > 0.0) {
            return Err(GridError::Config(format!(
                "zscore_threshold must be positive, got {}",
                self.zscore_threshold
            )));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(GridError::Config(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 || self.max_samples < 2 {
            return Err(GridError::Config(
                "n_estimators must be >= 1 and max_samples >= 2".to_string(),
            ));
        }
        if self.arima_order.1 > 2 {
            return Err(GridError::Config(format!(
                "arima differencing order above 2 is not supported, got {}",
                self.arima_order.1
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::MetricKind;
    use serde_json::json;

    #[test]
    fn metadata_typed_getters_fall_back_to_defaults() {
        let metadata = Metadata::new()
            .with("horizon", 48)
            .with("base_temp", 18.5)
            .with("freq", "D");
        assert_eq!(metadata.get_usize("horizon", 24).unwrap(), 48);
        assert_eq!(metadata.get_usize("missing", 24).unwrap(), 24);
        assert_eq!(metadata.get_f64("base_temp", 20.0).unwrap(), 18.5);
        assert_eq!(metadata.get_str("freq", "h").unwrap(), "D");
        assert!(!metadata.get_bool("synthetic", false).unwrap());
    }

    #[test]
    fn metadata_rejects_values_of_the_wrong_type() {
        let metadata = Metadata::new()
            .with("horizon", "24")
            .with("base_temp", true)
            .with("freq", 3)
            .with("days", -5);
        assert!(matches!(metadata.get_usize("horizon", 24), Err(GridError::Config(_))));
        assert!(matches!(metadata.get_f64("base_temp", 20.0), Err(GridError::Config(_))));
        assert!(matches!(metadata.get_str("freq", "h"), Err(GridError::Config(_))));
        assert!(matches!(metadata.get_usize("days", 365), Err(GridError::Config(_))));

        let seeded = PipelineConfig::new("in.csv", "out")
            .with_metadata(Metadata::new().with("random_state", "seven"));
        assert!(seeded.random_state().is_err());
        assert!(FallbackParams::from_metadata(&seeded.metadata).is_err());
    }

    #[test]
    fn order_must_have_three_entries() {
        let metadata = Metadata::new().with("arima_order", json!([2, 1, 0]));
        assert_eq!(metadata.get_order("arima_order", (1, 1, 1)).unwrap(), (2, 1, 0));

        let bad = Metadata::new().with("arima_order", json!([2, 1]));
        assert!(matches!(
            bad.get_order("arima_order", (1, 1, 1)),
            Err(GridError::Config(_))
        ));
    }

    #[test]
    fn config_parses_from_toml() {
        let text = r#"
            input_path = "data/ami.csv"
            output_dir = "runs/ami"

            [dataset_spec]
            name = "ami"
            required_columns = ["timestamp", "consumption"]

            [[metric_specs]]
            name = "f1"
            type = "anomaly"

            [metadata]
            random_state = 7
            zscore_threshold = 3.0
        "#;
        let config = PipelineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.input_path, PathBuf::from("data/ami.csv"));
        assert_eq!(config.metric_specs()[0].kind, MetricKind::Anomaly);
        assert_eq!(config.random_state(), 7);
        let params = FallbackParams::from_metadata(&config.metadata).unwrap();
        assert_eq!(params.zscore_threshold, 3.0);
        assert_eq!(params.arima_order, (1, 1, 1));
    }

    #[test]
    fn config_from_path_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "input_path: x").unwrap();
        assert!(matches!(
            PipelineConfig::from_path(&path),
            Err(GridError::Config(_))
        ));
    }

    #[test]
    fn fallback_params_reject_bad_contamination() {
        let metadata = Metadata::new().with("contamination", 0.9);
        assert!(FallbackParams::from_metadata(&metadata).is_err());
    }
}
