use std::path::Path;

use gridsmith_core::{GridResult, PipelineConfig, PipelineKind, PipelineResults};
use tracing::debug;

use crate::context::PipelineContext;
use crate::pipelines;

/// Entry point for running pipelines with one shared [`PipelineContext`].
#[derive(Debug, Clone)]
pub struct GridSmithClient {
    context: PipelineContext,
}

impl Default for GridSmithClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GridSmithClient {
    /// No external providers; PNG figures when the `render` feature is on.
    pub fn new() -> Self {
        #[cfg(feature = "render")]
        let context = PipelineContext::with_bitmap_renderer();
        #[cfg(not(feature = "render"))]
        let context = PipelineContext::local_only();
        Self { context }
    }

    pub fn with_context(context: PipelineContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn run(&self, kind: PipelineKind, config: &PipelineConfig) -> GridResult<PipelineResults> {
        debug!(pipeline = %kind, providers = ?self.context.providers.list_providers(), "dispatching");
        match kind {
            PipelineKind::AmiAnomaly => pipelines::run_ami_anomaly_pipeline(config, &self.context),
            PipelineKind::OutageEvent => pipelines::run_outage_event_pipeline(config, &self.context),
            PipelineKind::TransformerForecast => {
                pipelines::run_transformer_forecast_pipeline(config, &self.context)
            }
            PipelineKind::TemperatureLoad => {
                pipelines::run_temperature_load_pipeline(config, &self.context)
            }
            PipelineKind::LoadForecasting => {
                pipelines::run_load_forecasting_pipeline(config, &self.context)
            }
            PipelineKind::PredictiveMaintenance => {
                pipelines::run_predictive_maintenance_pipeline(config, &self.context)
            }
        }
    }

    /// Load a TOML or JSON config file and run `kind` with it.
    pub fn run_from_path(&self, kind: PipelineKind, config_path: &Path) -> GridResult<PipelineResults> {
        let config = PipelineConfig::from_path(config_path)?;
        self.run(kind, &config)
    }

    pub fn run_ami_anomaly(&self, config: &PipelineConfig) -> GridResult<PipelineResults> {
        self.run(PipelineKind::AmiAnomaly, config)
    }

    pub fn run_outage_event(&self, config: &PipelineConfig) -> GridResult<PipelineResults> {
        self.run(PipelineKind::OutageEvent, config)
    }

    pub fn run_transformer_forecast(&self, config: &PipelineConfig) -> GridResult<PipelineResults> {
        self.run(PipelineKind::TransformerForecast, config)
    }

    pub fn run_temperature_load(&self, config: &PipelineConfig) -> GridResult<PipelineResults> {
        self.run(PipelineKind::TemperatureLoad, config)
    }

    pub fn run_load_forecasting(&self, config: &PipelineConfig) -> GridResult<PipelineResults> {
        self.run(PipelineKind::LoadForecasting, config)
    }

    pub fn run_predictive_maintenance(&self, config: &PipelineConfig) -> GridResult<PipelineResults> {
        self.run(PipelineKind::PredictiveMaintenance, config)
    }
}
