//! Data sources that do not come from an input file.

pub mod synthetic;

pub use synthetic::{hourly_load_frame, temperature_load_frame, HourlyLoadParams, TemperatureLoadParams};
