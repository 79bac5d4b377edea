//! Seeded synthetic tables for the temperature-to-load and load forecasting pipelines.
//!
//! Both generators draw all temperature noise before any load noise so a
//! given seed always reproduces the same table.

use std::f64::consts::PI;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use gridsmith_core::{columns, GridError, GridResult, Metadata, DEFAULT_RANDOM_STATE};
use polars::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureLoadParams {
    pub start_date: NaiveDate,
    pub days: usize,
    pub base_temp: f64,
    pub temp_amplitude: f64,
    pub temp_noise_std: f64,
    pub base_load: f64,
    pub temp_coef: f64,
    pub temp_coef_squared: f64,
    pub noise_std: f64,
    pub random_state: u64,
}

impl Default for TemperatureLoadParams {
    fn default() -> Self {
        Self {
            start_date: default_start(),
            days: 365,
            base_temp: 20.0,
            temp_amplitude: 10.0,
            temp_noise_std: 2.0,
            base_load: 1000.0,
            temp_coef: 10.0,
            temp_coef_squared: 0.5,
            noise_std: 50.0,
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

impl TemperatureLoadParams {
    pub fn from_metadata(metadata: &Metadata) -> GridResult<Self> {
        let d = Self::default();
        Ok(Self {
            start_date: start_date(metadata)?,
            days: metadata.get_usize("days", d.days)?,
            base_temp: metadata.get_f64("base_temp", d.base_temp)?,
            temp_amplitude: metadata.get_f64("temp_amplitude", d.temp_amplitude)?,
            temp_noise_std: metadata.get_f64("temp_noise_std", d.temp_noise_std)?,
            base_load: metadata.get_f64("base_load", d.base_load)?,
            temp_coef: metadata.get_f64("temp_coef", d.temp_coef)?,
            temp_coef_squared: metadata.get_f64("temp_coef_squared", d.temp_coef_squared)?,
            noise_std: metadata.get_f64("noise_std", d.noise_std)?,
            random_state: metadata.get_u64("random_state", d.random_state)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyLoadParams {
    pub start_date: NaiveDate,
    pub periods: usize,
    pub base_load: f64,
    pub seasonal_amplitude: f64,
    pub daily_cycle_amplitude: f64,
    pub noise_std: f64,
    pub random_state: u64,
}

impl Default for HourlyLoadParams {
    fn default() -> Self {
        Self {
            start_date: default_start(),
            periods: 8760,
            base_load: 1000.0,
            seasonal_amplitude: 200.0,
            daily_cycle_amplitude: 150.0,
            noise_std: 20.0,
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

impl HourlyLoadParams {
    pub fn from_metadata(metadata: &Metadata) -> GridResult<Self> {
        let d = Self::default();
        Ok(Self {
            start_date: start_date(metadata)?,
            periods: metadata.get_usize("periods", d.periods)?,
            base_load: metadata.get_f64("base_load", d.base_load)?,
            seasonal_amplitude: metadata.get_f64("seasonal_amplitude", d.seasonal_amplitude)?,
            daily_cycle_amplitude: metadata
                .get_f64("daily_cycle_amplitude", d.daily_cycle_amplitude)?,
            noise_std: metadata.get_f64("noise_std", d.noise_std)?,
            random_state: metadata.get_u64("random_state", d.random_state)?,
        })
    }
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn start_date(metadata: &Metadata) -> GridResult<NaiveDate> {
    match metadata.get_opt_str("start_date")? {
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| {
            GridError::Config(format!("start_date '{text}' is not YYYY-MM-DD: {e}"))
        }),
        None => Ok(default_start()),
    }
}

fn gaussian_noise(rng: &mut StdRng, std_dev: f64, n: usize) -> GridResult<Vec<f64>> {
    let normal = Normal::new(0.0, std_dev)
        .map_err(|e| GridError::Config(format!("invalid noise std {std_dev}: {e}")))?;
    Ok((0..n).map(|_| normal.sample(rng)).collect())
}

fn datetime_series(name: &str, stamps: &[NaiveDateTime]) -> GridResult<Series> {
    let millis: Vec<i64> = stamps
        .iter()
        .map(|dt| dt.and_utc().timestamp_millis())
        .collect();
    Ok(Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

/// Daily `Date`, `Temperature_C`, `Load_MW` with a quadratic temperature response.
pub fn temperature_load_frame(params: &TemperatureLoadParams) -> GridResult<DataFrame> {
    let mut rng = StdRng::seed_from_u64(params.random_state);
    let dates: Vec<NaiveDateTime> = (0..params.days)
        .map(|i| params.start_date + Duration::days(i as i64))
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .collect();

    let temp_noise = gaussian_noise(&mut rng, params.temp_noise_std, dates.len())?;
    let load_noise = gaussian_noise(&mut rng, params.noise_std, dates.len())?;

    let temperature: Vec<f64> = dates
        .iter()
        .zip(&temp_noise)
        .map(|(date, noise)| {
            let doy = date.ordinal() as f64;
            params.base_temp + params.temp_amplitude * (2.0 * PI * doy / 365.0).sin() + noise
        })
        .collect();
    let load: Vec<f64> = temperature
        .iter()
        .zip(&load_noise)
        .map(|(t, noise)| {
            params.base_load
                + params.temp_coef * t
                + params.temp_coef_squared * (t - params.base_temp).powi(2)
                + noise
        })
        .collect();

    Ok(DataFrame::new(vec![
        datetime_series(columns::DATE, &dates)?,
        Series::new(columns::TEMPERATURE_C, temperature),
        Series::new(columns::LOAD_MW, load),
    ])?)
}

/// Hourly `timestamp`, `Load_MW` with seasonal and daily cycles.
pub fn hourly_load_frame(params: &HourlyLoadParams) -> GridResult<DataFrame> {
    let mut rng = StdRng::seed_from_u64(params.random_state);
    let start = params.start_date.and_time(chrono::NaiveTime::MIN);
    let stamps: Vec<NaiveDateTime> = (0..params.periods)
        .map(|i| start + Duration::hours(i as i64))
        .collect();
    let noise = gaussian_noise(&mut rng, params.noise_std, stamps.len())?;

    let load: Vec<f64> = stamps
        .iter()
        .zip(&noise)
        .map(|(ts, noise)| {
            let doy = ts.ordinal() as f64;
            let hour = ts.hour() as f64;
            params.base_load
                + params.seasonal_amplitude * (2.0 * PI * doy / 365.0).sin()
                + params.daily_cycle_amplitude * (2.0 * PI * hour / 24.0).sin()
                + noise
        })
        .collect();

    Ok(DataFrame::new(vec![
        datetime_series(columns::TIMESTAMP, &stamps)?,
        Series::new(columns::LOAD_MW, load),
    ])?)
}
