//! Regression, classification and forecast metrics.
//!
//! The `local_*` functions are the reference formulas. The `compute_*`
//! functions consult the registered providers first and fall back to them.

use std::collections::BTreeMap;

use gridsmith_core::{GridError, GridResult};
use tracing::warn;

use crate::chain::StrategyChain;
use crate::provider::ProviderRegistry;

pub const REGRESSION_METRICS: &[&str] = &["mse", "mae", "rmse", "mape", "r2"];
pub const CLASSIFICATION_METRICS: &[&str] = &["precision", "recall", "f1", "accuracy"];

pub const DEFAULT_REGRESSION_METRICS: &[&str] = &["mse", "mae", "rmse", "mape"];
pub const DEFAULT_FORECAST_METRICS: &[&str] = &["mse", "mae", "rmse", "mape"];
pub const DEFAULT_ANOMALY_METRICS: &[&str] = &["precision", "recall", "f1"];

pub type MetricMap = BTreeMap<String, f64>;

fn requested(metrics: Option<&[String]>, defaults: &[&str]) -> Vec<String> {
    match metrics {
        Some(names) => names.to_vec(),
        None => defaults.iter().map(|s| s.to_string()).collect(),
    }
}

/// Keep the names this module knows, warning about the rest.
fn known_names(names: Vec<String>, known: &[&str]) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| {
            let ok = known.contains(&name.as_str());
            if !ok {
                warn!(metric = %name, "unknown metric, skipping");
            }
            ok
        })
        .collect()
}

/// Drop pairs where either side is missing.
fn paired(actual: &[f64], predicted: &[f64]) -> GridResult<(Vec<f64>, Vec<f64>)> {
    if actual.len() != predicted.len() {
        return Err(GridError::Validation(format!(
            "actual has {} values but predicted has {}",
            actual.len(),
            predicted.len()
        )));
    }
    let (a, p): (Vec<f64>, Vec<f64>) = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| a.is_finite() && p.is_finite())
        .map(|(a, p)| (*a, *p))
        .unzip();
    if a.is_empty() {
        return Err(GridError::Validation(
            "no paired observations to evaluate".to_string(),
        ));
    }
    Ok((a, p))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)))
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()))
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Mean absolute percentage error over non-zero actuals, in percent.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(
        actual
            .iter()
            .zip(predicted)
            .filter(|(a, _)| **a != 0.0)
            .map(|(a, p)| ((a - p) / a).abs() * 100.0),
    )
}

pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    let mu = mean(actual.iter().copied());
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mu).powi(2)).sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Reference value of one regression metric, or `None` for an unknown name.
pub fn regression_metric(name: &str, actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let value = match name {
        "mse" => mse(actual, predicted),
        "mae" => mae(actual, predicted),
        "rmse" => rmse(actual, predicted),
        "mape" => mape(actual, predicted),
        "r2" => r2(actual, predicted),
        _ => return None,
    };
    Some(value)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tn: usize,
}

impl ConfusionCounts {
    pub fn from_labels(actual: &[bool], predicted: &[bool]) -> Self {
        let mut counts = Self::default();
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a, p) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (true, false) => counts.fn_ += 1,
                (false, false) => counts.tn += 1,
            }
        }
        counts
    }

    fn ratio(num: usize, den: usize) -> f64 {
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    }

    pub fn precision(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        Self::ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }

    pub fn accuracy(&self) -> f64 {
        Self::ratio(self.tp + self.tn, self.tp + self.fp + self.fn_ + self.tn)
    }
}

fn check_labels(actual: &[bool], predicted: &[bool]) -> GridResult<()> {
    if actual.len() != predicted.len() {
        return Err(GridError::Validation(format!(
            "actual has {} labels but predicted has {}",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(GridError::Validation("no labels to evaluate".to_string()));
    }
    Ok(())
}

/// Reference classification metrics; unknown names are skipped.
pub fn local_anomaly_metrics(
    actual: &[bool],
    predicted: &[bool],
    metrics: &[String],
) -> GridResult<MetricMap> {
    check_labels(actual, predicted)?;
    let counts = ConfusionCounts::from_labels(actual, predicted);
    let mut out = MetricMap::new();
    for name in metrics {
        let value = match name.as_str() {
            "precision" => counts.precision(),
            "recall" => counts.recall(),
            "f1" => counts.f1(),
            "accuracy" => counts.accuracy(),
            other => {
                warn!(metric = %other, "unknown anomaly metric, skipping");
                continue;
            }
        };
        out.insert(name.clone(), value);
    }
    Ok(out)
}

/// Reference regression metrics; unknown names are skipped.
pub fn local_regression_metrics(
    actual: &[f64],
    predicted: &[f64],
    metrics: &[String],
) -> GridResult<MetricMap> {
    let (a, p) = paired(actual, predicted)?;
    let mut out = MetricMap::new();
    for name in metrics {
        match regression_metric(name, &a, &p) {
            Some(value) => {
                out.insert(name.clone(), value);
            }
            None => warn!(metric = %name, "unknown regression metric, skipping"),
        }
    }
    Ok(out)
}

struct RegressionInput<'a> {
    name: &'a str,
    actual: &'a [f64],
    predicted: &'a [f64],
}

/// Regression metrics, asking providers per metric before the local formula.
///
/// `metrics = None` computes [`DEFAULT_REGRESSION_METRICS`].
pub fn compute_regression_metrics(
    registry: &ProviderRegistry,
    actual: &[f64],
    predicted: &[f64],
    metrics: Option<&[String]>,
) -> GridResult<MetricMap> {
    compute_with_defaults(registry, actual, predicted, metrics, DEFAULT_REGRESSION_METRICS)
}

/// Forecast accuracy metrics; same formulas as regression with forecast defaults.
pub fn compute_forecast_metrics(
    registry: &ProviderRegistry,
    actual: &[f64],
    predicted: &[f64],
    metrics: Option<&[String]>,
) -> GridResult<MetricMap> {
    compute_with_defaults(registry, actual, predicted, metrics, DEFAULT_FORECAST_METRICS)
}

fn compute_with_defaults(
    registry: &ProviderRegistry,
    actual: &[f64],
    predicted: &[f64],
    metrics: Option<&[String]>,
    defaults: &[&str],
) -> GridResult<MetricMap> {
    let (a, p) = paired(actual, predicted)?;
    let names = known_names(requested(metrics, defaults), REGRESSION_METRICS);

    let mut out = MetricMap::new();
    for name in &names {
        let mut chain = StrategyChain::<RegressionInput<'_>, f64>::new(
            "regression_metric",
            "local",
            |input| {
                regression_metric(input.name, input.actual, input.predicted).ok_or_else(|| {
                    GridError::Validation(format!("unknown metric '{}'", input.name))
                })
            },
        )
        .validate(|value, _| value.is_finite());
        for provider in registry.available() {
            chain = chain.strategy(provider.id(), move |input| {
                Ok(provider.regression_metric(input.name, input.actual, input.predicted)?)
            });
        }
        let resolved = chain.run(&RegressionInput {
            name,
            actual: &a,
            predicted: &p,
        })?;
        out.insert(name.clone(), resolved.value);
    }
    Ok(out)
}

struct AnomalyInput<'a> {
    actual: &'a [bool],
    predicted: &'a [bool],
    scores: Option<&'a [f64]>,
    metrics: &'a [String],
}

/// Classification metrics, asking providers for the whole map before the
/// local formulas. `metrics = None` computes [`DEFAULT_ANOMALY_METRICS`].
pub fn compute_anomaly_metrics(
    registry: &ProviderRegistry,
    actual: &[bool],
    predicted: &[bool],
    scores: Option<&[f64]>,
    metrics: Option<&[String]>,
) -> GridResult<MetricMap> {
    check_labels(actual, predicted)?;
    let names = known_names(requested(metrics, DEFAULT_ANOMALY_METRICS), CLASSIFICATION_METRICS);

    let mut chain = StrategyChain::<AnomalyInput<'_>, MetricMap>::new(
        "anomaly_metrics",
        "local",
        |input| local_anomaly_metrics(input.actual, input.predicted, input.metrics),
    )
    .validate(|map, input| {
        input
            .metrics
            .iter()
            .all(|name| map.get(name).is_some_and(|v| v.is_finite()))
    });
    for provider in registry.available() {
        chain = chain.strategy(provider.id(), move |input| {
            Ok(provider.anomaly_metrics(input.actual, input.predicted, input.scores, input.metrics)?)
        });
    }

    let resolved = chain.run(&AnomalyInput {
        actual,
        predicted,
        scores,
        metrics: &names,
    })?;
    // providers may return extras; report only what was asked for
    Ok(resolved
        .value
        .into_iter()
        .filter(|(name, _)| names.contains(name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AnalyticsProvider, ProviderError};
    use std::sync::Arc;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn regression_formulas_match_hand_computation() {
        let actual = [3.0, -0.5, 2.0, 7.0];
        let predicted = [2.5, 0.0, 2.0, 8.0];
        assert!(close(mse(&actual, &predicted), 0.375));
        assert!(close(mae(&actual, &predicted), 0.5));
        assert!(close(rmse(&actual, &predicted), 0.375f64.sqrt()));
        // r2 from the classic sklearn docstring example
        assert!((r2(&actual, &predicted) - 0.948_608_137_044_967_9).abs() < 1e-12);
        // |0.5/3| + |0.5/0.5| + 0 + |1/7|, over 4, in percent
        let expected = (0.5 / 3.0 + 1.0 + 0.0 + 1.0 / 7.0) / 4.0 * 100.0;
        assert!(close(mape(&actual, &predicted), expected));
    }

    #[test]
    fn mape_ignores_zero_actuals() {
        assert!(close(mape(&[0.0, 2.0], &[5.0, 1.0]), 50.0));
        assert_eq!(mape(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn r2_of_constant_actuals() {
        assert_eq!(r2(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2(&[2.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn classification_with_zero_division() {
        let actual = [false, false, false];
        let predicted = [false, false, false];
        let names: Vec<String> = CLASSIFICATION_METRICS.iter().map(|s| s.to_string()).collect();
        let m = local_anomaly_metrics(&actual, &predicted, &names).unwrap();
        assert_eq!(m["precision"], 0.0);
        assert_eq!(m["recall"], 0.0);
        assert_eq!(m["f1"], 0.0);
        assert_eq!(m["accuracy"], 1.0);
    }

    #[test]
    fn classification_counts() {
        let actual = [true, true, false, false, true];
        let predicted = [true, false, true, false, true];
        let c = ConfusionCounts::from_labels(&actual, &predicted);
        assert_eq!(c, ConfusionCounts { tp: 2, fp: 1, fn_: 1, tn: 1 });
        assert!(close(c.precision(), 2.0 / 3.0));
        assert!(close(c.recall(), 2.0 / 3.0));
        assert!(close(c.f1(), 2.0 / 3.0));
        assert!(close(c.accuracy(), 0.6));
    }

    #[test]
    fn mismatched_or_empty_inputs_are_validation_errors() {
        let registry = ProviderRegistry::new();
        assert!(compute_regression_metrics(&registry, &[1.0], &[1.0, 2.0], None)
            .unwrap_err()
            .is_validation());
        assert!(compute_anomaly_metrics(&registry, &[], &[], None, None)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn unknown_metric_names_are_skipped() {
        let registry = ProviderRegistry::new();
        let names = vec!["mae".to_string(), "bogus".to_string()];
        let m = compute_regression_metrics(&registry, &[1.0, 2.0], &[1.0, 3.0], Some(&names))
            .unwrap();
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["mae"]);
    }

    #[test]
    fn nan_pairs_are_dropped() {
        let registry = ProviderRegistry::new();
        let m = compute_regression_metrics(
            &registry,
            &[1.0, f64::NAN, 3.0],
            &[1.0, 2.0, 5.0],
            None,
        )
        .unwrap();
        assert!(close(m["mae"], 1.0));
    }

    struct FixedMae;

    impl AnalyticsProvider for FixedMae {
        fn id(&self) -> &str {
            "fixed"
        }
        fn regression_metric(&self, name: &str, _: &[f64], _: &[f64]) -> Result<f64, ProviderError> {
            match name {
                "mae" => Ok(42.0),
                "rmse" => Ok(f64::NAN),
                _ => Err(ProviderError::Unsupported("regression_metric")),
            }
        }
    }

    #[test]
    fn providers_are_consulted_per_metric() {
        let registry = ProviderRegistry::new().with(Arc::new(FixedMae));
        let m = compute_regression_metrics(&registry, &[1.0, 2.0], &[1.0, 3.0], None).unwrap();
        assert_eq!(m["mae"], 42.0);
        // NaN from the provider is rejected and the local formula used
        assert!(close(m["rmse"], 0.5f64.sqrt()));
        assert!(close(m["mse"], 0.5));
    }
}
