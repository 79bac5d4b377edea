//! Unified error type for the GridSmith workspace
//!
//! Every pipeline, loader and metric function returns [`GridResult`]. The
//! variants separate "the input is wrong" ([`GridError::Validation`]) from
//! failures of the environment (I/O, data engine, rendering).
//!
//! # Example
//!
//! ```ignore
//! use gridsmith_core::{GridError, GridResult};
//!
//! fn require(columns: &[&str], name: &str) -> GridResult<()> {
//!     if !columns.contains(&name) {
//!         return Err(GridError::missing_column(name));
//!     }
//!     Ok(())
//! }
//! ```

use polars::prelude::PolarsError;
use thiserror::Error;

/// Unified error type for all GridSmith operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// I/O errors (file access, directory creation)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the dataframe engine
    #[error("Data error: {0}")]
    Data(String),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input: missing columns, unsupported formats, bad parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An analytics provider failed where no fallback exists
    #[error("Provider error: {0}")]
    Provider(String),

    /// Plot rendering errors
    #[error("Render error: {0}")]
    Render(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

impl GridError {
    pub fn missing_column(name: &str) -> Self {
        GridError::Validation(format!("Missing required column: {name}"))
    }

    /// True for errors caused by the caller's input rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(self, GridError::Validation(_))
    }
}

/// Convenience type alias for Results using GridError.
pub type GridResult<T> = Result<T, GridError>;

impl From<anyhow::Error> for GridError {
    fn from(err: anyhow::Error) -> Self {
        // keep validation errors recognisable after passing through anyhow
        match err.downcast::<GridError>() {
            Ok(grid) => grid,
            Err(other) => GridError::Other(format!("{other:#}")),
        }
    }
}

impl From<PolarsError> for GridError {
    fn from(err: PolarsError) -> Self {
        match err {
            PolarsError::ColumnNotFound(name) => {
                GridError::Validation(format!("Missing required column: {name}"))
            }
            other => GridError::Data(other.to_string()),
        }
    }
}

impl From<String> for GridError {
    fn from(s: String) -> Self {
        GridError::Other(s)
    }
}

impl From<&str> for GridError {
    fn from(s: &str) -> Self {
        GridError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for GridError {
    fn from(err: toml::de::Error) -> Self {
        GridError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridError::missing_column("consumption");
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("consumption"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GridError = io_err.into();
        assert!(matches!(err, GridError::Io(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_variant() {
        let wrapped = anyhow::Error::new(GridError::Validation("bad".into()));
        let err: GridError = wrapped.into();
        assert!(err.is_validation());

        let plain: GridError = anyhow::anyhow!("boom").into();
        assert!(matches!(plain, GridError::Other(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> GridResult<()> {
            Err(GridError::Validation("test".into()))
        }

        fn outer() -> GridResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
