//! # gridsmith-core: shared records for the GridSmith pipelines
//!
//! Plain data shared by every other crate in the workspace:
//!
//! - [`GridError`] / [`GridResult`]: one error type for loaders, metrics and pipelines
//! - [`columns`]: canonical column names used to normalise provider output
//! - [`DatasetSpec`], [`SplitSpec`], [`MetricSpec`] and [`validate_schema`]
//! - [`PipelineConfig`], [`Metadata`] and [`FallbackParams`]
//! - [`PipelineResults`] and [`PipelineKind`]
//! - [`linalg`]: small dense solves for the regression and forecasting fallbacks
//!
//! Nothing here holds state between pipeline runs.

pub mod columns;
pub mod config;
pub mod error;
pub mod linalg;
pub mod results;
pub mod spec;

pub use config::{FallbackParams, Metadata, PipelineConfig, DEFAULT_RANDOM_STATE};
pub use error::{GridError, GridResult};
pub use linalg::{least_squares, FaerSolver, LinearSystemBackend};
pub use results::{PipelineKind, PipelineResults};
pub use spec::{metric_names, validate_schema, DatasetSpec, MetricKind, MetricSpec, SplitSpec};
