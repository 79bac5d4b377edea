//! Analytics providers.
//!
//! An [`AnalyticsProvider`] is an optional, externally supplied implementation
//! of one or more analytics operations. Providers are registered in a
//! [`ProviderRegistry`] in priority order and handed to pipelines explicitly;
//! nothing probes for them at call time. Every method defaults to
//! [`ProviderError::Unsupported`], so a provider only implements what it has.

use std::collections::BTreeMap;
use std::sync::Arc;

use gridsmith_core::columns;
use gridsmith_io::frame::column_f64;
use polars::prelude::DataFrame;
use thiserror::Error;

use crate::forecast::ForecastMethod;
use crate::regression::LinearFit;

/// Why a provider did not produce a result.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider does not implement this operation
    #[error("operation '{0}' is not supported by this provider")]
    Unsupported(&'static str),

    /// The provider tried and failed
    #[error("provider failed: {0}")]
    Failed(String),
}

impl ProviderError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProviderError::Failed(message.into())
    }
}

/// Hint for the local detector; external providers may ignore it.
#[derive(Debug, Clone, PartialEq)]
pub enum AnomalyMethod {
    /// Univariate z-score, with mean/std fitted on `fit_rows` (all rows if `None`)
    ZScore { fit_rows: Option<Vec<usize>> },
    /// Multivariate isolation forest over all requested columns
    IsolationForest,
}

pub struct AnomalyRequest<'a> {
    pub frame: &'a DataFrame,
    pub columns: &'a [String],
    pub method: AnomalyMethod,
}

/// Per-row anomaly labels, with optional scores.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyOutput {
    pub scores: Option<Vec<f64>>,
    pub labels: Vec<bool>,
}

pub struct OutageRequest<'a> {
    pub frame: &'a DataFrame,
    pub value_column: &'a str,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutageOutput {
    pub flags: Vec<bool>,
}

pub struct ForecastRequest<'a> {
    /// Timestamp and value columns of the history
    pub frame: &'a DataFrame,
    pub timestamp_column: &'a str,
    pub value_column: &'a str,
    /// The value column as plain numbers
    pub values: &'a [f64],
    pub horizon: usize,
    pub method: ForecastMethod,
}

/// Forecasts come back either as bare values or as a provider-shaped table.
#[derive(Debug, Clone)]
pub enum ForecastOutput {
    /// Exactly `horizon` future values
    Values(Vec<f64>),
    /// A table carrying a forecast column under one of the accepted names
    Table(DataFrame),
}

impl ForecastOutput {
    /// The `horizon` forecast values, if the output carries that many.
    ///
    /// Tables contribute the last `horizon` non-missing entries of their
    /// `forecast` column, so a provider may include backcast rows.
    pub fn values(&self, horizon: usize) -> Option<Vec<f64>> {
        match self {
            ForecastOutput::Values(values) => {
                (values.len() == horizon && values.iter().all(|v| v.is_finite()))
                    .then(|| values.clone())
            }
            ForecastOutput::Table(table) => {
                let column = column_f64(table, columns::FORECAST).ok()?;
                let finite: Vec<f64> = column.into_iter().filter(|v| v.is_finite()).collect();
                (finite.len() >= horizon).then(|| finite[finite.len() - horizon..].to_vec())
            }
        }
    }
}

pub struct RegressionRequest<'a> {
    /// One row of features per observation
    pub features: &'a [Vec<f64>],
    pub target: &'a [f64],
}

/// Black-box analytics capability.
pub trait AnalyticsProvider: Send + Sync {
    /// Unique identifier, used in logs and result metadata
    fn id(&self) -> &str;

    /// Runtime availability; unavailable providers are skipped
    fn is_available(&self) -> bool {
        true
    }

    fn detect_anomalies(&self, _request: &AnomalyRequest<'_>) -> Result<AnomalyOutput, ProviderError> {
        Err(ProviderError::Unsupported("detect_anomalies"))
    }

    fn detect_outages(&self, _request: &OutageRequest<'_>) -> Result<OutageOutput, ProviderError> {
        Err(ProviderError::Unsupported("detect_outages"))
    }

    fn forecast(&self, _request: &ForecastRequest<'_>) -> Result<ForecastOutput, ProviderError> {
        Err(ProviderError::Unsupported("forecast"))
    }

    fn fit_regression(&self, _request: &RegressionRequest<'_>) -> Result<LinearFit, ProviderError> {
        Err(ProviderError::Unsupported("fit_regression"))
    }

    fn regression_metric(
        &self,
        _name: &str,
        _actual: &[f64],
        _predicted: &[f64],
    ) -> Result<f64, ProviderError> {
        Err(ProviderError::Unsupported("regression_metric"))
    }

    fn anomaly_metrics(
        &self,
        _actual: &[bool],
        _predicted: &[bool],
        _scores: Option<&[f64]>,
        _metrics: &[String],
    ) -> Result<BTreeMap<String, f64>, ProviderError> {
        Err(ProviderError::Unsupported("anomaly_metrics"))
    }
}

/// Providers in priority order (first registered is tried first).
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn AnalyticsProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider behind the ones already registered.
    /// A provider with the same id replaces the earlier one in place.
    pub fn register(&mut self, provider: Arc<dyn AnalyticsProvider>) {
        match self.providers.iter().position(|p| p.id() == provider.id()) {
            Some(index) => self.providers[index] = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn with(mut self, provider: Arc<dyn AnalyticsProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn AnalyticsProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub fn list_providers(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Available providers, highest priority first.
    pub fn available(&self) -> impl Iterator<Item = &Arc<dyn AnalyticsProvider>> {
        self.providers.iter().filter(|p| p.is_available())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .finish()
    }
}
