//! # GridSmith: energy-grid analytics pipelines
//!
//! Six pipelines over meter, transformer, load and equipment data. Each one
//! asks the registered analytics providers first and falls back to a local
//! computation, so a run always completes when its input is valid.
//!
//! | Pipeline | Local fallback | Main table |
//! |----------|----------------|------------|
//! | AMI anomaly | z-score | `anomaly_results` |
//! | Outage event | threshold + event grouping | `outage_results`, `outage_events` |
//! | Transformer forecast | exponential smoothing | `forecast_results` |
//! | Temperature-to-load | least squares | `temperature_load_results` |
//! | Load forecasting | ARIMA(p, d, q) | `load_forecast_results` |
//! | Predictive maintenance | isolation forest | `predictive_maintenance_results` |
//!
//! Every run writes `metrics.json`, `tables/*.parquet` and `figures/*`
//! under [`PipelineConfig::output_dir`] and returns a [`PipelineResults`].
//!
//! ```ignore
//! use gridsmith::{GridSmithClient, PipelineConfig};
//!
//! let config = PipelineConfig::new("data/ami.csv", "out/ami");
//! let results = GridSmithClient::new().run_ami_anomaly(&config)?;
//! println!("{:?}", results.metrics);
//! ```

pub mod client;
pub mod context;
pub mod pipelines;

pub use client::GridSmithClient;
pub use context::PipelineContext;
pub use pipelines::{
    run_ami_anomaly_pipeline, run_load_forecasting_pipeline, run_outage_event_pipeline,
    run_predictive_maintenance_pipeline, run_temperature_load_pipeline,
    run_transformer_forecast_pipeline,
};

pub use gridsmith_algo::{AnalyticsProvider, LocalProvider, ProviderError, ProviderRegistry};
pub use gridsmith_core::{
    DatasetSpec, FaerSolver, FallbackParams, GridError, GridResult, LinearSystemBackend, Metadata,
    MetricKind, MetricSpec, PipelineConfig, PipelineKind, PipelineResults, SplitSpec,
};
pub use gridsmith_viz::{PlotInfo, PlotRenderer};
