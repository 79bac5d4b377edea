//! Ordinary least squares with an intercept.

use gridsmith_core::{least_squares, GridError, GridResult, LinearSystemBackend};
use serde::{Deserialize, Serialize};

/// A fitted linear model `y = intercept + Σ coefficients[i] * x[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict_row(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// True if the fit has one finite coefficient per feature.
    pub fn is_well_formed(&self, n_features: usize) -> bool {
        self.coefficients.len() == n_features
            && self.intercept.is_finite()
            && self.coefficients.iter().all(|c| c.is_finite())
    }
}

/// Fit `target` on `features` (one row per observation).
pub fn fit_linear(
    backend: &dyn LinearSystemBackend,
    features: &[Vec<f64>],
    target: &[f64],
) -> GridResult<LinearFit> {
    if features.is_empty() {
        return Err(GridError::Validation("cannot fit a regression on zero rows".into()));
    }
    if features.len() != target.len() {
        return Err(GridError::Validation(format!(
            "{} feature rows but {} targets",
            features.len(),
            target.len()
        )));
    }
    if features
        .iter()
        .flatten()
        .chain(target)
        .any(|v| !v.is_finite())
    {
        return Err(GridError::Validation(
            "regression inputs contain missing or non-finite values".into(),
        ));
    }

    let design: Vec<Vec<f64>> = features
        .iter()
        .map(|row| std::iter::once(1.0).chain(row.iter().copied()).collect())
        .collect();
    let beta = least_squares(backend, &design, target).map_err(|e| match e {
        GridError::Validation(msg) if msg.contains("singular") => GridError::Validation(
            "regression features are collinear or constant".to_string(),
        ),
        other => other,
    })?;

    Ok(LinearFit {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
    })
}
