//! Gyro sensor facade
//!
//! Glue between a detected [`SensorBackend`] and the device configuration.
//! Owns the backend for the whole wake cycle and exposes the measurement as an
//! angle plus sensor temperature.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::angle::{estimate_angle, is_moving};
use crate::constants::buffers::ANGLE_HISTORY;
use crate::errors::SensorResult;
use crate::sensors::{detect_backend, GyroResultData, RunMode, SensorSettings};
use crate::traits::{ConfigProvider, SensorBackend};

/// Tilt sensor with its configuration
pub struct GyroSensor<'a, C: ConfigProvider> {
    backend: Box<dyn SensorBackend + 'a>,
    config: C,
    last: GyroResultData,
    angles: [f64; ANGLE_HISTORY],
    angle_count: usize,
    initial_temp_c: Option<f64>,
}

impl<'a, C: ConfigProvider> GyroSensor<'a, C> {
    /// Wrap an already detected backend
    pub fn new(backend: Box<dyn SensorBackend + 'a>, config: C) -> Self {
        Self {
            backend,
            config,
            last: GyroResultData::default(),
            angles: [0.0; ANGLE_HISTORY],
            angle_count: 0,
            initial_temp_c: None,
        }
    }

    /// Detect the IMU on `i2c` and wrap it, using the stored offsets
    pub fn detect<I2C, D>(i2c: I2C, delay: D, config: C) -> SensorResult<Self>
    where
        I2C: I2c + 'a,
        D: DelayNs + 'a,
    {
        let settings = SensorSettings::from_config(&config);
        let backend = detect_backend(i2c, delay, settings)?;
        Ok(Self::new(backend, config))
    }

    /// Configure the backend for `mode`
    pub fn setup(&mut self, mode: RunMode, force: bool) -> SensorResult<()> {
        self.backend.configure(mode, force)
    }

    /// Take one measurement.
    ///
    /// When the device is moving, or no sample survived, the result is marked
    /// invalid and carries the previous angle.
    pub fn read(&mut self) -> SensorResult<GyroResultData> {
        let agg = self.backend.read_batch()?;
        if agg.samples == 0 {
            log_warn!(target: "GYRO", "No samples available");
            self.last.valid = false;
            return Ok(self.last);
        }

        let threshold = self.config.gyro_sensor_moving_threshold();
        let [gx, gy, gz] = agg.gyro;
        let angle = if is_moving(gx, gy, gz, threshold) {
            log_warn!(target: "GYRO", "Movement detected ({}) {} {} {}", threshold, gx, gy, gz);
            None
        } else {
            let [ax, ay, az] = agg.accel.map(f64::from);
            estimate_angle(ax, ay, az)
        };

        self.last.temp_c = agg.temp_c;
        self.initial_temp_c.get_or_insert(agg.temp_c);
        match angle {
            Some(angle) => {
                self.last.valid = true;
                self.last.angle = angle;
                self.push_angle(angle);
            }
            None => self.last.valid = false,
        }
        log_debug!(target: "GYRO", "{:?}", self.last);
        Ok(self.last)
    }

    fn push_angle(&mut self, angle: f64) {
        if self.angle_count == ANGLE_HISTORY {
            self.angles.copy_within(1.., 0);
            self.angle_count -= 1;
        }
        self.angles[self.angle_count] = angle;
        self.angle_count += 1;
    }

    /// Most recent result
    pub fn last(&self) -> GyroResultData {
        self.last
    }

    /// Mean of the last valid angles, `None` before the first one
    pub fn filtered_angle(&self) -> Option<f64> {
        let angles = &self.angles[..self.angle_count];
        (!angles.is_empty()).then(|| angles.iter().sum::<f64>() / angles.len() as f64)
    }

    /// Temperature of the first read this session.
    ///
    /// The sensor heats up while reading, so the first value is the closest to
    /// the liquid temperature.
    pub fn initial_sensor_temp_c(&self) -> Option<f64> {
        self.initial_temp_c
    }

    /// Measure offsets and persist them.
    ///
    /// Backends that are factory calibrated leave the configuration untouched.
    pub fn calibrate(&mut self) -> SensorResult<()> {
        if !self.backend.needs_calibration() {
            log_info!(target: "GYRO", "{} does not need calibration", self.backend.name());
            return Ok(());
        }
        let offsets = self.backend.calibrate()?;
        self.config.set_gyro_calibration(offsets);
        if let Err(_e) = self.config.save() {
            log_error!(target: "GYRO", "Failed to save calibration: {}", _e);
        }
        Ok(())
    }

    /// Put the sensor to sleep before deep sleep
    pub fn enter_sleep(&mut self) -> SensorResult<()> {
        self.backend.enter_sleep()
    }

    /// Detected sensor family
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Whether the detected sensor needs measured offsets
    pub fn needs_calibration(&self) -> bool {
        self.backend.needs_calibration()
    }

    /// Configuration in use
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Mutable access to the configuration
    pub fn config_mut(&mut self) -> &mut C {
        &mut self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::errors::SensorError;
    use crate::sensors::{AggregateSample, GyroCalibration};

    /// Backend replaying fixed batches
    struct Replay {
        batches: [AggregateSample; 3],
        next: usize,
        offsets: GyroCalibration,
    }

    impl Replay {
        fn new(batches: [AggregateSample; 3]) -> Self {
            Self { batches, next: 0, offsets: GyroCalibration::default() }
        }
    }

    impl SensorBackend for Replay {
        fn name(&self) -> &'static str {
            "replay"
        }
        fn detect(&mut self) -> SensorResult<u8> {
            Ok(0x68)
        }
        fn configure(&mut self, _mode: RunMode, _force: bool) -> SensorResult<()> {
            Ok(())
        }
        fn read_batch(&mut self) -> SensorResult<AggregateSample> {
            let batch = self.batches.get(self.next).copied().ok_or(SensorError::NotConfigured)?;
            self.next += 1;
            Ok(batch)
        }
        fn enter_sleep(&mut self) -> SensorResult<()> {
            Ok(())
        }
        fn mode(&self) -> RunMode {
            RunMode::Run
        }
        fn needs_calibration(&self) -> bool {
            true
        }
        fn calibrate(&mut self) -> SensorResult<GyroCalibration> {
            self.offsets = GyroCalibration { ax: 1, ay: 2, az: 3, gx: 4, gy: 5, gz: 6 };
            Ok(self.offsets)
        }
        fn offsets(&self) -> GyroCalibration {
            self.offsets
        }
    }

    fn batch(accel: [i32; 3], gyro: [i32; 3], temp_c: f64) -> AggregateSample {
        AggregateSample { accel, gyro, temp_c, samples: 50, spread: None }
    }

    #[test]
    fn moving_read_keeps_previous_angle() {
        let replay = Replay::new([
            batch([16384, 0, 0], [0, 0, 0], 21.0),
            batch([0, 16384, 0], [501, 0, 0], 22.0),
            batch([0, 16384, 0], [500, -500, 0], 23.0),
        ]);
        let mut gyro = GyroSensor::new(Box::new(replay), DeviceConfig::default());

        let first = gyro.read().unwrap();
        assert!(first.valid);
        assert!((first.angle - 90.0).abs() < 1e-9);

        let moving = gyro.read().unwrap();
        assert!(!moving.valid);
        assert_eq!(moving.angle, first.angle);
        assert_eq!(moving.temp_c, 22.0);

        // exactly at the threshold is still
        let still = gyro.read().unwrap();
        assert!(still.valid);
        assert!(still.angle.abs() < 1e-9);

        assert_eq!(gyro.initial_sensor_temp_c(), Some(21.0));
        assert!((gyro.filtered_angle().unwrap() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn empty_batch_is_invalid() {
        let mut empty = AggregateSample::default();
        empty.samples = 0;
        let replay = Replay::new([empty; 3]);
        let mut gyro = GyroSensor::new(Box::new(replay), DeviceConfig::default());
        assert!(!gyro.read().unwrap().valid);
        assert_eq!(gyro.filtered_angle(), None);
        assert_eq!(gyro.initial_sensor_temp_c(), None);
    }

    #[test]
    fn calibration_is_stored_in_config() {
        let replay = Replay::new([AggregateSample::default(); 3]);
        let mut gyro = GyroSensor::new(Box::new(replay), DeviceConfig::default());
        gyro.calibrate().unwrap();
        assert_eq!(gyro.config().gyro_calibration().gz, 6);
    }

    #[test]
    fn filtered_angle_uses_last_five() {
        let replay = Replay::new([AggregateSample::default(); 3]);
        let mut gyro = GyroSensor::new(Box::new(replay), DeviceConfig::default());
        for a in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0] {
            gyro.push_angle(a);
        }
        assert!((gyro.filtered_angle().unwrap() - 40.0).abs() < 1e-12);
    }
}
