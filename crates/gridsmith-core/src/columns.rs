//! Canonical column names.
//!
//! External providers return results in many shapes; everything is
//! normalised onto these names before it reaches a results table.

pub const TIMESTAMP: &str = "timestamp";
pub const CONSUMPTION: &str = "consumption";
pub const DEMAND: &str = "demand";
pub const POWER: &str = "power";
pub const ANOMALY_SCORE: &str = "anomaly_score";
pub const IS_ANOMALY: &str = "is_anomaly";
pub const FORECAST: &str = "forecast";
pub const ACTUAL: &str = "actual";
pub const GROUND_TRUTH: &str = "ground_truth";
pub const IS_OUTAGE: &str = "is_outage";

// Temperature-to-load and load forecasting
pub const DATE: &str = "Date";
pub const TEMPERATURE_C: &str = "Temperature_C";
pub const LOAD_MW: &str = "Load_MW";
pub const LOAD: &str = "load";
pub const PREDICTED_LOAD: &str = "predicted_load";
pub const RESIDUAL: &str = "residual";

// Predictive maintenance
pub const FAILURE: &str = "Failure";
pub const VIBRATION_G: &str = "Vibration_g";
pub const OIL_PRESSURE_PSI: &str = "OilPressure_psi";
pub const LOAD_KVA: &str = "Load_kVA";

/// Value columns accepted by the forecasting and outage pipelines, in priority order.
pub const VALUE_CANDIDATES: &[&str] = &[CONSUMPTION, DEMAND, POWER];

/// Load columns accepted by the load forecasting pipeline, in priority order.
pub const LOAD_CANDIDATES: &[&str] = &[LOAD_MW, LOAD, DEMAND, CONSUMPTION];

/// Sensor features used by predictive maintenance.
pub const MAINTENANCE_FEATURES: &[&str] = &[TEMPERATURE_C, VIBRATION_G, OIL_PRESSURE_PSI, LOAD_KVA];

/// Column names a provider may use for a forecast, most specific first.
pub fn forecast_candidates(value_column: &str) -> Vec<String> {
    vec![
        format!("{value_column}_forecast"),
        FORECAST.to_string(),
        "prediction".to_string(),
        "pred".to_string(),
    ]
}

/// First candidate present in `available`.
pub fn find_column<'a, S: AsRef<str>>(available: &[S], candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|candidate| available.iter().any(|col| col.as_ref() == *candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_column_respects_priority() {
        let available = ["power", "demand", "other"];
        assert_eq!(find_column(&available, VALUE_CANDIDATES), Some(DEMAND));
        assert_eq!(find_column(&["x"], VALUE_CANDIDATES), None);
    }

    #[test]
    fn forecast_candidates_start_with_value_specific_name() {
        let candidates = forecast_candidates("Load_MW");
        assert_eq!(candidates[0], "Load_MW_forecast");
        assert_eq!(candidates.len(), 4);
    }
}
