//! The always-available local provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use gridsmith_core::{FaerSolver, FallbackParams, GridError, GridResult, LinearSystemBackend};
use gridsmith_io::frame::{column_f64, rows_f64};

use crate::anomaly::{isolation_forest_anomalies, zscore_anomalies, IsolationForestParams};
use crate::forecast::local_forecast;
use crate::metrics::{local_anomaly_metrics, regression_metric};
use crate::outage::outage_flags;
use crate::provider::{
    AnalyticsProvider, AnomalyMethod, AnomalyOutput, AnomalyRequest, ForecastOutput,
    ForecastRequest, OutageOutput, OutageRequest, ProviderError, RegressionRequest,
};
use crate::regression::{fit_linear, LinearFit};

/// Local computations with fixed, configurable parameters.
///
/// Pipelines run these last, after every registered provider.
#[derive(Clone)]
pub struct LocalProvider {
    params: FallbackParams,
    backend: Arc<dyn LinearSystemBackend>,
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new(FallbackParams::default())
    }
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl LocalProvider {
    pub const ID: &'static str = "local";

    pub fn new(params: FallbackParams) -> Self {
        Self {
            params,
            backend: Arc::new(FaerSolver),
        }
    }

    /// Use a different dense solver for regression and ARIMA fits.
    pub fn with_backend(mut self, backend: Arc<dyn LinearSystemBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn params(&self) -> &FallbackParams {
        &self.params
    }

    fn forest_params(&self) -> IsolationForestParams {
        IsolationForestParams {
            n_estimators: self.params.n_estimators,
            max_samples: self.params.max_samples,
            contamination: self.params.contamination,
            random_state: self.params.random_state,
        }
    }

    pub fn anomalies(&self, request: &AnomalyRequest<'_>) -> GridResult<AnomalyOutput> {
        match &request.method {
            AnomalyMethod::ZScore { fit_rows } => {
                let column = request.columns.first().ok_or_else(|| {
                    GridError::Validation("z-score detection needs a value column".into())
                })?;
                let values = column_f64(request.frame, column)?;
                zscore_anomalies(&values, fit_rows.as_deref(), self.params.zscore_threshold)
            }
            AnomalyMethod::IsolationForest => {
                if request.columns.is_empty() {
                    return Err(GridError::Validation(
                        "isolation forest needs at least one feature column".into(),
                    ));
                }
                let rows = rows_f64(request.frame, request.columns)?;
                isolation_forest_anomalies(&rows, &self.forest_params())
            }
        }
    }

    pub fn outages(&self, request: &OutageRequest<'_>) -> GridResult<OutageOutput> {
        let values = column_f64(request.frame, request.value_column)?;
        Ok(OutageOutput {
            flags: outage_flags(&values, request.threshold),
        })
    }

    pub fn forecast_values(&self, request: &ForecastRequest<'_>) -> GridResult<Vec<f64>> {
        local_forecast(
            self.backend.as_ref(),
            request.values,
            request.horizon,
            request.method,
        )
    }

    pub fn regression(&self, request: &RegressionRequest<'_>) -> GridResult<LinearFit> {
        fit_linear(self.backend.as_ref(), request.features, request.target)
    }
}

fn failed(err: GridError) -> ProviderError {
    ProviderError::failed(err.to_string())
}

/// The local provider can also be registered like any other, e.g. to put it
/// ahead of a slower external service.
impl AnalyticsProvider for LocalProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn detect_anomalies(&self, request: &AnomalyRequest<'_>) -> Result<AnomalyOutput, ProviderError> {
        self.anomalies(request).map_err(failed)
    }

    fn detect_outages(&self, request: &OutageRequest<'_>) -> Result<OutageOutput, ProviderError> {
        self.outages(request).map_err(failed)
    }

    fn forecast(&self, request: &ForecastRequest<'_>) -> Result<ForecastOutput, ProviderError> {
        self.forecast_values(request)
            .map(ForecastOutput::Values)
            .map_err(failed)
    }

    fn fit_regression(&self, request: &RegressionRequest<'_>) -> Result<LinearFit, ProviderError> {
        self.regression(request).map_err(failed)
    }

    fn regression_metric(
        &self,
        name: &str,
        actual: &[f64],
        predicted: &[f64],
    ) -> Result<f64, ProviderError> {
        regression_metric(name, actual, predicted).ok_or(ProviderError::Unsupported("regression_metric"))
    }

    fn anomaly_metrics(
        &self,
        actual: &[bool],
        predicted: &[bool],
        _scores: Option<&[f64]>,
        metrics: &[String],
    ) -> Result<BTreeMap<String, f64>, ProviderError> {
        local_anomaly_metrics(actual, predicted, metrics).map_err(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn zscore_reads_first_column() {
        let df = df!["consumption" => &[1.0f64, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 30.0]].unwrap();
        let columns = vec!["consumption".to_string()];
        let out = LocalProvider::default()
            .anomalies(&AnomalyRequest {
                frame: &df,
                columns: &columns,
                method: AnomalyMethod::ZScore { fit_rows: None },
            })
            .unwrap();
        assert!(out.labels[9]);
        assert_eq!(out.labels.iter().filter(|l| **l).count(), 1);
    }

    #[test]
    fn threshold_comes_from_params() {
        let df = df!["consumption" => &[1.0f64, 2.0, 3.0]].unwrap();
        let columns = vec!["consumption".to_string()];
        let provider = LocalProvider::new(FallbackParams {
            zscore_threshold: 0.5,
            ..FallbackParams::default()
        });
        let out = provider
            .anomalies(&AnomalyRequest {
                frame: &df,
                columns: &columns,
                method: AnomalyMethod::ZScore { fit_rows: None },
            })
            .unwrap();
        assert_eq!(out.labels, vec![true, false, true]);
    }

    #[test]
    fn outage_threshold_is_inclusive() {
        let df = df!["power" => &[3.0f64, 0.0, 0.5]].unwrap();
        let out = LocalProvider::default()
            .outages(&OutageRequest {
                frame: &df,
                value_column: "power",
                threshold: 0.5,
            })
            .unwrap();
        assert_eq!(out.flags, vec![false, true, true]);
    }

    #[test]
    fn trait_maps_errors_to_failed() {
        let df = df!["other" => &[1.0f64]].unwrap();
        let columns = vec!["consumption".to_string()];
        let err = LocalProvider::default()
            .detect_anomalies(&AnomalyRequest {
                frame: &df,
                columns: &columns,
                method: AnomalyMethod::ZScore { fit_rows: None },
            })
            .unwrap_err();
        assert!(matches!(err, ProviderError::Failed(_)));
    }
}
