//! Local forecasters: simple exponential smoothing and ARIMA(p, d, q).
//!
//! ARIMA is estimated with the Hannan-Rissanen procedure: a long
//! autoregression supplies innovation estimates, then the ARMA coefficients
//! come from one least-squares regression on lagged values and lagged
//! innovations. Forecasts are produced recursively and integrated back
//! through the differencing.

use gridsmith_core::{least_squares, GridError, GridResult, LinearSystemBackend};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forecasting method a pipeline prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    ExponentialSmoothing,
    Arima { p: usize, d: usize, q: usize },
}

impl ForecastMethod {
    pub fn arima(order: (usize, usize, usize)) -> Self {
        ForecastMethod::Arima {
            p: order.0,
            d: order.1,
            q: order.2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ForecastMethod::ExponentialSmoothing => "exponential_smoothing",
            ForecastMethod::Arima { .. } => "arima",
        }
    }
}

fn observed(values: &[f64], min: usize, what: &str) -> GridResult<Vec<f64>> {
    let clean: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if clean.len() < min {
        return Err(GridError::Validation(format!(
            "{what} needs at least {min} observed values, got {}",
            clean.len()
        )));
    }
    Ok(clean)
}

/// One-step-ahead squared error of SES with smoothing `alpha`, and the final level.
fn ses_pass(values: &[f64], alpha: f64) -> (f64, f64) {
    let mut level = values[0];
    let mut sse = 0.0;
    for &y in &values[1..] {
        sse += (y - level).powi(2);
        level = alpha * y + (1.0 - alpha) * level;
    }
    (sse, level)
}

/// Simple exponential smoothing with `alpha` chosen on a 0.05 grid by
/// one-step-ahead squared error. Missing values are skipped.
pub fn exponential_smoothing(values: &[f64], horizon: usize) -> GridResult<Vec<f64>> {
    let series = observed(values, 2, "exponential smoothing")?;

    let mut best = (f64::INFINITY, series[series.len() - 1], 0.0);
    for step in 1..=19 {
        let alpha = step as f64 * 0.05;
        let (sse, level) = ses_pass(&series, alpha);
        if sse < best.0 {
            best = (sse, level, alpha);
        }
    }
    debug!(alpha = best.2, "exponential smoothing fitted");
    Ok(vec![best.1; horizon])
}

fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// ARMA coefficients for a zero-mean series.
#[derive(Debug, Clone, PartialEq)]
struct Arma {
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl Arma {
    fn white_noise() -> Self {
        Self {
            ar: Vec::new(),
            ma: Vec::new(),
        }
    }

    fn is_finite(&self) -> bool {
        self.ar.iter().chain(&self.ma).all(|c| c.is_finite())
    }

    /// One-step prediction at `t` from lagged values and innovations.
    fn predict_at(&self, w: &[f64], e: &[f64], t: usize) -> f64 {
        let ar: f64 = self
            .ar
            .iter()
            .enumerate()
            .filter(|(i, _)| t > *i)
            .map(|(i, phi)| phi * w[t - 1 - i])
            .sum();
        let ma: f64 = self
            .ma
            .iter()
            .enumerate()
            .filter(|(j, _)| t > *j)
            .map(|(j, theta)| theta * e[t - 1 - j])
            .sum();
        ar + ma
    }

    fn residuals(&self, w: &[f64]) -> Vec<f64> {
        let mut e = vec![0.0; w.len()];
        for t in 0..w.len() {
            e[t] = w[t] - self.predict_at(w, &e, t);
        }
        e
    }

    fn forecast(&self, w: &[f64], horizon: usize) -> Vec<f64> {
        let mut ext = w.to_vec();
        let mut e = self.residuals(w);
        for _ in 0..horizon {
            let t = ext.len();
            let next = self.predict_at(&ext, &e, t);
            ext.push(next);
            e.push(0.0);
        }
        ext[w.len()..].to_vec()
    }
}

/// Regress `w[t]` on `w[t-1..=t-p]` and `e[t-1..=t-q]` for `t >= start`.
fn lagged_fit(
    backend: &dyn LinearSystemBackend,
    w: &[f64],
    e: Option<&[f64]>,
    p: usize,
    q: usize,
    start: usize,
) -> GridResult<Arma> {
    let rows: Vec<Vec<f64>> = (start..w.len())
        .map(|t| {
            let ar = (1..=p).map(|i| w[t - i]);
            let ma = (1..=q).map(|j| e.map_or(0.0, |e| e[t - j]));
            ar.chain(ma).collect()
        })
        .collect();
    let target = &w[start..];
    let beta = least_squares(backend, &rows, target)?;
    Ok(Arma {
        ar: beta[..p].to_vec(),
        ma: beta[p..].to_vec(),
    })
}

fn hannan_rissanen(
    backend: &dyn LinearSystemBackend,
    w: &[f64],
    p: usize,
    q: usize,
) -> GridResult<Arma> {
    if p == 0 && q == 0 {
        return Ok(Arma::white_noise());
    }
    if q == 0 {
        return lagged_fit(backend, w, None, p, 0, p);
    }

    let long_order = (p + q).max((w.len() as f64).ln().ceil() as usize);
    let long_ar = lagged_fit(backend, w, None, long_order, 0, long_order)?;
    let mut innovations = vec![0.0; w.len()];
    for t in long_order..w.len() {
        innovations[t] = w[t] - long_ar.predict_at(w, &innovations, t);
    }
    lagged_fit(backend, w, Some(&innovations), p, q, long_order + q.max(p))
}

/// ARIMA(p, d, q) forecast of `horizon` steps.
///
/// Falls back to AR(p), then to a flat forecast of the differenced mean,
/// when the ARMA regression is singular (for example a constant series).
pub fn arima_forecast(
    backend: &dyn LinearSystemBackend,
    values: &[f64],
    order: (usize, usize, usize),
    horizon: usize,
) -> GridResult<Vec<f64>> {
    let (p, d, q) = order;
    if d > 2 {
        return Err(GridError::Config(format!(
            "arima differencing order above 2 is not supported, got {d}"
        )));
    }
    let series = observed(values, d + 2 * (p + q) + 3, "ARIMA")?;

    let mut levels = vec![series];
    for k in 0..d {
        let next = difference(&levels[k]);
        levels.push(next);
    }
    let w_raw = &levels[d];

    // only an undifferenced model carries a constant
    let mean = if d == 0 {
        w_raw.iter().sum::<f64>() / w_raw.len() as f64
    } else {
        0.0
    };
    let w: Vec<f64> = w_raw.iter().map(|v| v - mean).collect();

    let model = match hannan_rissanen(backend, &w, p, q) {
        Ok(model) if model.is_finite() => model,
        _ => match lagged_fit(backend, &w, None, p, 0, p) {
            Ok(model) if p > 0 && model.is_finite() => {
                debug!(p, d, q, "ARMA fit singular, using AR({p})");
                model
            }
            _ => {
                debug!(p, d, q, "ARMA fit singular, using flat forecast");
                Arma::white_noise()
            }
        },
    };

    let mut forecast: Vec<f64> = model
        .forecast(&w, horizon)
        .into_iter()
        .map(|v| v + mean)
        .collect();

    for k in (0..d).rev() {
        let mut last = levels[k][levels[k].len() - 1];
        for value in forecast.iter_mut() {
            last += *value;
            *value = last;
        }
    }

    if forecast.iter().any(|v| !v.is_finite()) {
        return Err(GridError::Validation(
            "ARIMA forecast diverged; try a lower order".into(),
        ));
    }
    Ok(forecast)
}

/// Dispatch to the local implementation of `method`.
pub fn local_forecast(
    backend: &dyn LinearSystemBackend,
    values: &[f64],
    horizon: usize,
    method: ForecastMethod,
) -> GridResult<Vec<f64>> {
    if horizon == 0 {
        return Err(GridError::Validation("forecast horizon must be at least 1".into()));
    }
    match method {
        ForecastMethod::ExponentialSmoothing => exponential_smoothing(values, horizon),
        ForecastMethod::Arima { p, d, q } => arima_forecast(backend, values, (p, d, q), horizon),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsmith_core::FaerSolver;

    #[test]
    fn ses_on_constant_series_is_flat() {
        let forecast = exponential_smoothing(&[4.0; 10], 3).unwrap();
        assert_eq!(forecast, vec![4.0; 3]);
    }

    #[test]
    fn ses_tracks_level_shift() {
        let mut values = vec![10.0; 20];
        values.extend(vec![20.0; 20]);
        let forecast = exponential_smoothing(&values, 2).unwrap();
        assert!((forecast[0] - 20.0).abs() < 0.5);
    }

    #[test]
    fn ses_needs_two_values() {
        assert!(exponential_smoothing(&[1.0], 3).unwrap_err().is_validation());
    }

    #[test]
    fn arima_continues_linear_trend() {
        // a straight line differences to a constant, forecast keeps the slope
        let values: Vec<f64> = (0..40).map(|t| 5.0 + 2.0 * t as f64).collect();
        let forecast = arima_forecast(&FaerSolver, &values, (1, 1, 1), 3).unwrap();
        for (h, value) in forecast.iter().enumerate() {
            let expected = 5.0 + 2.0 * (40 + h) as f64;
            assert!((value - expected).abs() < 2.1, "step {h}: {value} vs {expected}");
        }
    }

    #[test]
    fn arima_recovers_ar1() {
        // deterministic AR(1) with phi 0.8 around mean 10
        let mut values = vec![20.0];
        for t in 1..200 {
            let prev: f64 = values[t - 1];
            let wiggle = if t % 2 == 0 { 0.5 } else { -0.5 };
            values.push(10.0 + 0.8 * (prev - 10.0) + wiggle);
        }
        let forecast = arima_forecast(&FaerSolver, &values, (1, 0, 0), 50).unwrap();
        // long horizon reverts to the sample mean
        assert!((forecast[49] - 10.0).abs() < 1.0);
    }

    #[test]
    fn arima_constant_series_is_flat() {
        let forecast = arima_forecast(&FaerSolver, &[7.0; 30], (1, 1, 1), 4).unwrap();
        assert!(forecast.iter().all(|v| (v - 7.0).abs() < 1e-9));
    }

    #[test]
    fn arima_too_short_is_validation_error() {
        let err = arima_forecast(&FaerSolver, &[1.0, 2.0, 3.0], (1, 1, 1), 2).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn zero_horizon_is_rejected() {
        assert!(local_forecast(&FaerSolver, &[1.0, 2.0], 0, ForecastMethod::ExponentialSmoothing)
            .is_err());
    }
}
