//! Measurement core for Hydromon
//!
//! Turns raw IMU readings from a floating hydrometer into tilt, specific
//! gravity and fermentation speed. Designed for battery powered devices that
//! wake, measure and go back to deep sleep.
//!
//! Key constraints:
//! - Runs without `std` (ESP32 class targets)
//! - No heap allocation outside backend selection
//! - Every hardware wait is bounded
//!
//! ```no_run
//! use hydromon_core::{process_cycle, DeviceConfig, GyroResultData, VelocityState};
//!
//! let config = DeviceConfig::default();
//! let mut retained = VelocityState::new();
//! let reading = GyroResultData { valid: true, angle: 42.0, temp_c: 19.5 };
//!
//! if let Some(m) = process_cycle(&reading, &config, Some(&mut retained)) {
//!     // report m.gravity, m.velocity
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod angle;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod errors;
pub mod formula;
pub mod pipeline;
pub mod sensors;
pub mod time;
pub mod traits;
pub mod velocity;

// Public API
pub use angle::{estimate_angle, is_moving};
pub use calibration::{create_formula, fit_formula, CalibrationPoint, CalibrationSet, FittedFormula};
pub use config::DeviceConfig;
pub use errors::{
    CalibrationError, CalibrationResult, ConfigError, ConfigResult, FormulaError, FormulaResult,
    SensorError, SensorResult,
};
pub use formula::{calculate_gravity, gravity_temperature_correction_c, try_calculate_gravity};
pub use pipeline::{process_cycle, Measurement};
pub use sensors::{detect_backend, GyroCalibration, GyroResultData, GyroSensor, RunMode};
pub use traits::{ConfigProvider, Filter, SensorBackend};
pub use velocity::{VelocityState, VelocityTracker};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
