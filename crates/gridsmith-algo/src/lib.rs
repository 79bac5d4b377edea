//! # gridsmith-algo: analytics with provider fallback
//!
//! Every operation a pipeline needs is resolved through a strategy chain:
//! registered [`AnalyticsProvider`]s are tried in priority order and the
//! [`LocalProvider`] computes the result when none of them succeeds.
//!
//! ## Architecture
//!
//! - **[`provider`]**: the provider trait, request/output records and [`ProviderRegistry`]
//! - **[`chain`]**: [`StrategyChain`], the ordered try-validate-fallback loop
//! - **[`dispatch`]**: one chain per operation (anomalies, outages, forecast, regression)
//! - **[`local`]**: [`LocalProvider`], always available
//!
//! ## Local computations
//!
//! | Operation | Method |
//! |-----------|--------|
//! | anomalies (AMI) | z-score with sample std, threshold 2.0 |
//! | anomalies (maintenance) | isolation forest, 100 trees, ψ = 256 |
//! | outages | value at or below threshold, grouped into events |
//! | forecast | simple exponential smoothing, or ARIMA(p,d,q) via Hannan-Rissanen |
//! | regression | ordinary least squares with intercept |
//!
//! Metric functions live in [`metrics`]; seeded splits in [`split`].

pub mod anomaly;
pub mod chain;
pub mod dispatch;
pub mod forecast;
pub mod local;
pub mod metrics;
pub mod outage;
pub mod provider;
pub mod regression;
pub mod split;

pub use chain::{Resolved, StrategyChain, StrategyFailure};
pub use forecast::ForecastMethod;
pub use local::LocalProvider;
pub use metrics::{compute_anomaly_metrics, compute_forecast_metrics, compute_regression_metrics, MetricMap};
pub use outage::{group_events, OutageEvent};
pub use provider::{
    AnalyticsProvider, AnomalyMethod, AnomalyOutput, AnomalyRequest, ForecastOutput,
    ForecastRequest, OutageOutput, OutageRequest, ProviderError, ProviderRegistry,
    RegressionRequest,
};
pub use regression::LinearFit;
pub use split::{split_from_spec, train_test_split, TrainTestSplit};
