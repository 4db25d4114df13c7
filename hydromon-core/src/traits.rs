//! Core traits
//!
//! The seams of the measurement core: the orientation sensor, the configuration
//! store it reads from and writes back to, and the smoothing filter feeding the
//! velocity tracker. Concrete types live in their own modules; these traits are
//! what the rest of the crate programs against.

use crate::calibration::CalibrationSet;
use crate::errors::{ConfigResult, SensorResult};
use crate::sensors::{AggregateSample, GyroCalibration, RunMode};
use crate::velocity::FilterState;

/// An orientation sensor family behind a common interface.
///
/// Backends own their bus and delay provider. They are selected at runtime by
/// [`crate::sensors::detect_backend`] and used through `Box<dyn SensorBackend>`.
pub trait SensorBackend {
    /// Device family name, e.g. `"MPU6050"`
    fn name(&self) -> &'static str;

    /// Probe both bus addresses and return the one with a matching identity
    fn detect(&mut self) -> SensorResult<u8>;

    /// Switch operating mode.
    ///
    /// `force` reprograms the device even when it already appears configured.
    fn configure(&mut self, mode: RunMode, force: bool) -> SensorResult<()>;

    /// Read a burst of samples and return their mean
    fn read_batch(&mut self) -> SensorResult<AggregateSample>;

    /// Put the device into its low-power state for deep sleep
    fn enter_sleep(&mut self) -> SensorResult<()>;

    /// Current operating mode
    fn mode(&self) -> RunMode;

    /// Whether the device needs measured offsets to read level
    fn needs_calibration(&self) -> bool {
        false
    }

    /// Measure offsets with the device lying flat and apply them.
    ///
    /// Backends without offset registers return the offsets they were given.
    fn calibrate(&mut self) -> SensorResult<GyroCalibration>;

    /// Offsets currently applied by the backend
    fn offsets(&self) -> GyroCalibration;
}

/// Read/write access to the persisted device configuration.
///
/// Setters only change the in-memory copy; nothing reaches storage until
/// [`ConfigProvider::save`] is called.
pub trait ConfigProvider {
    /// Stored gyro and accel offsets
    fn gyro_calibration(&self) -> GyroCalibration;
    /// Replace the stored offsets
    fn set_gyro_calibration(&mut self, offsets: GyroCalibration);

    /// Gravity formula in terms of `tilt` and `temp`
    fn gravity_formula(&self) -> &str;
    /// Replace the gravity formula
    fn set_gravity_formula(&mut self, formula: &str) -> ConfigResult<()>;

    /// Calibration points used to create the gravity formula
    fn formula_data(&self) -> &CalibrationSet;
    /// Replace the calibration points
    fn set_formula_data(&mut self, data: CalibrationSet);

    /// Largest accepted deviation (SG × 1000) of a fitted formula
    fn max_formula_creation_deviation(&self) -> f64;
    /// Set the largest accepted deviation
    fn set_max_formula_creation_deviation(&mut self, deviation: f64);

    /// Temperature (°C) the hydrometer readings are referenced to
    fn default_calibration_temp(&self) -> f64;
    /// Set the reference temperature
    fn set_default_calibration_temp(&mut self, temp_c: f64);

    /// Gyro reading above which the device counts as moving
    fn gyro_sensor_moving_threshold(&self) -> i32;
    /// Set the motion threshold
    fn set_gyro_sensor_moving_threshold(&mut self, threshold: i32);

    /// Samples averaged per measurement
    fn gyro_read_count(&self) -> i32;
    /// Set the samples averaged per measurement
    fn set_gyro_read_count(&mut self, count: i32);

    /// Deep sleep interval (seconds)
    fn sleep_interval(&self) -> i32;
    /// Set the deep sleep interval
    fn set_sleep_interval(&mut self, seconds: i32);

    /// Whether gravity is corrected for temperature
    fn gravity_temp_adjustment(&self) -> bool;
    /// Enable or disable temperature correction
    fn set_gravity_temp_adjustment(&mut self, enabled: bool);

    /// Persist the current configuration
    fn save(&mut self) -> ConfigResult<()>;
}

impl<T: ConfigProvider + ?Sized> ConfigProvider for &mut T {
    fn gyro_calibration(&self) -> GyroCalibration {
        (**self).gyro_calibration()
    }
    fn set_gyro_calibration(&mut self, offsets: GyroCalibration) {
        (**self).set_gyro_calibration(offsets)
    }
    fn gravity_formula(&self) -> &str {
        (**self).gravity_formula()
    }
    fn set_gravity_formula(&mut self, formula: &str) -> ConfigResult<()> {
        (**self).set_gravity_formula(formula)
    }
    fn formula_data(&self) -> &CalibrationSet {
        (**self).formula_data()
    }
    fn set_formula_data(&mut self, data: CalibrationSet) {
        (**self).set_formula_data(data)
    }
    fn max_formula_creation_deviation(&self) -> f64 {
        (**self).max_formula_creation_deviation()
    }
    fn set_max_formula_creation_deviation(&mut self, deviation: f64) {
        (**self).set_max_formula_creation_deviation(deviation)
    }
    fn default_calibration_temp(&self) -> f64 {
        (**self).default_calibration_temp()
    }
    fn set_default_calibration_temp(&mut self, temp_c: f64) {
        (**self).set_default_calibration_temp(temp_c)
    }
    fn gyro_sensor_moving_threshold(&self) -> i32 {
        (**self).gyro_sensor_moving_threshold()
    }
    fn set_gyro_sensor_moving_threshold(&mut self, threshold: i32) {
        (**self).set_gyro_sensor_moving_threshold(threshold)
    }
    fn gyro_read_count(&self) -> i32 {
        (**self).gyro_read_count()
    }
    fn set_gyro_read_count(&mut self, count: i32) {
        (**self).set_gyro_read_count(count)
    }
    fn sleep_interval(&self) -> i32 {
        (**self).sleep_interval()
    }
    fn set_sleep_interval(&mut self, seconds: i32) {
        (**self).set_sleep_interval(seconds)
    }
    fn gravity_temp_adjustment(&self) -> bool {
        (**self).gravity_temp_adjustment()
    }
    fn set_gravity_temp_adjustment(&mut self, enabled: bool) {
        (**self).set_gravity_temp_adjustment(enabled)
    }
    fn save(&mut self) -> ConfigResult<()> {
        (**self).save()
    }
}

/// Smoothing applied to gravity before it enters the velocity ring.
///
/// Filters are stateless; their window lives in a [`FilterState`] so it can be
/// retained across deep sleep together with the velocity periods.
pub trait Filter {
    /// Push `value` into the window and return the smoothed value
    fn filter(&self, state: &mut FilterState, value: f64) -> f64;
}
