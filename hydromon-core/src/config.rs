//! In-memory device configuration
//!
//! [`DeviceConfig`] holds every setting the measurement core reads and is the
//! serde model of the persisted configuration file. Field names on the wire
//! follow the firmware's JSON keys, including the historical spelling of
//! `gyro_moving_threashold`. Missing keys fall back to the firmware defaults.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationSet;
use crate::constants::physics::{DEFAULT_CALIBRATION_TEMP_C, DEFAULT_MAX_FORMULA_DEVIATION};
use crate::constants::time::DEFAULT_SLEEP_INTERVAL_S;
use crate::errors::{ConfigError, ConfigResult};
use crate::formula::FormulaString;
use crate::sensors::{GyroCalibration, DEFAULT_MOVING_THRESHOLD, DEFAULT_READ_COUNT};
use crate::traits::ConfigProvider;

/// Device settings used by the measurement core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    sleep_interval: i32,
    gravity_formula: FormulaString,
    gravity_temp_adjustment: bool,
    #[serde(rename = "gyro_calibration_data")]
    gyro_calibration: GyroCalibration,
    #[serde(rename = "formula_calculation_data")]
    formula_data: CalibrationSet,
    gyro_read_count: i32,
    #[serde(rename = "gyro_moving_threashold")]
    moving_threshold: i32,
    #[serde(rename = "formula_max_deviation")]
    max_formula_deviation: f64,
    #[serde(rename = "formula_calibration_temp")]
    calibration_temp_c: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sleep_interval: DEFAULT_SLEEP_INTERVAL_S,
            gravity_formula: FormulaString::new(),
            gravity_temp_adjustment: false,
            gyro_calibration: GyroCalibration::default(),
            formula_data: CalibrationSet::new(),
            gyro_read_count: i32::from(DEFAULT_READ_COUNT),
            moving_threshold: DEFAULT_MOVING_THRESHOLD,
            max_formula_deviation: DEFAULT_MAX_FORMULA_DEVIATION,
            calibration_temp_c: DEFAULT_CALIBRATION_TEMP_C,
        }
    }
}

impl ConfigProvider for DeviceConfig {
    fn gyro_calibration(&self) -> GyroCalibration {
        self.gyro_calibration
    }

    fn set_gyro_calibration(&mut self, offsets: GyroCalibration) {
        self.gyro_calibration = offsets;
    }

    fn gravity_formula(&self) -> &str {
        &self.gravity_formula
    }

    fn set_gravity_formula(&mut self, formula: &str) -> ConfigResult<()> {
        let mut value = FormulaString::new();
        value
            .push_str(formula)
            .map_err(|_| ConfigError::ValueTooLong { field: "gravity_formula" })?;
        self.gravity_formula = value;
        Ok(())
    }

    fn formula_data(&self) -> &CalibrationSet {
        &self.formula_data
    }

    fn set_formula_data(&mut self, data: CalibrationSet) {
        self.formula_data = data;
    }

    fn max_formula_creation_deviation(&self) -> f64 {
        self.max_formula_deviation
    }

    fn set_max_formula_creation_deviation(&mut self, deviation: f64) {
        self.max_formula_deviation = deviation;
    }

    fn default_calibration_temp(&self) -> f64 {
        self.calibration_temp_c
    }

    fn set_default_calibration_temp(&mut self, temp_c: f64) {
        self.calibration_temp_c = temp_c;
    }

    fn gyro_sensor_moving_threshold(&self) -> i32 {
        self.moving_threshold
    }

    fn set_gyro_sensor_moving_threshold(&mut self, threshold: i32) {
        self.moving_threshold = threshold;
    }

    fn gyro_read_count(&self) -> i32 {
        self.gyro_read_count
    }

    fn set_gyro_read_count(&mut self, count: i32) {
        self.gyro_read_count = count;
    }

    fn sleep_interval(&self) -> i32 {
        self.sleep_interval
    }

    fn set_sleep_interval(&mut self, seconds: i32) {
        self.sleep_interval = seconds;
    }

    fn gravity_temp_adjustment(&self) -> bool {
        self.gravity_temp_adjustment
    }

    fn set_gravity_temp_adjustment(&mut self, enabled: bool) {
        self.gravity_temp_adjustment = enabled;
    }

    // Nothing to persist; storage backed providers wrap this type.
    fn save(&mut self) -> ConfigResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware() {
        let config = DeviceConfig::default();
        assert_eq!(config.sleep_interval(), 900);
        assert_eq!(config.gyro_read_count(), 50);
        assert_eq!(config.gyro_sensor_moving_threshold(), 500);
        assert_eq!(config.max_formula_creation_deviation(), 1.6);
        assert_eq!(config.default_calibration_temp(), 20.0);
        assert!(!config.gravity_temp_adjustment());
        assert_eq!(config.gravity_formula(), "");
        assert!(config.formula_data().is_empty());
        assert!(config.gyro_calibration().is_zero());
    }

    #[test]
    fn overlong_formula_is_rejected() {
        let mut config = DeviceConfig::default();
        let long = "tilt+".repeat(40);
        assert_eq!(
            config.set_gravity_formula(&long),
            Err(ConfigError::ValueTooLong { field: "gravity_formula" })
        );
        assert_eq!(config.gravity_formula(), "");
    }

    #[test]
    fn borrowed_config_is_a_provider() {
        fn bump<C: ConfigProvider>(mut config: C) {
            config.set_sleep_interval(config.sleep_interval() * 2);
        }
        let mut config = DeviceConfig::default();
        bump(&mut config);
        assert_eq!(config.sleep_interval(), 1800);
    }
}
