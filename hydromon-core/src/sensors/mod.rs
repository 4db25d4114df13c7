//! Orientation sensors
//!
//! ## Overview
//!
//! Two IMU families are supported, chosen at runtime by probing the bus:
//!
//! | Backend | Read strategy | Calibration |
//! |---|---|---|
//! | [`Mpu6050`] (MPU-6050 / MPU-6500) | N data-ready gated register reads | measured offsets |
//! | [`Icm42670`] (ICM-42670-P) | FIFO batch recorded while the host sleeps | factory trimmed |
//!
//! Both reduce a burst of raw samples to one [`AggregateSample`]. The
//! [`GyroSensor`] wrapper turns that into an angle, applies the motion gate
//! and persists calibration through the [`ConfigProvider`].
//!
//! ## Operating Modes
//!
//! ```text
//!  Unconfigured ──configure(Run)────────► Run ─────┐
//!        │                                  ▲      │ enter_sleep
//!        └─────configure(Continuous)──► Continuous │
//!                                           │      ▼
//!                                           └──► Sleep
//! ```
//!
//! Leaving `Sleep` always goes through `configure`, which re-applies the
//! stored offsets.

mod bus;
mod gyro;
mod icm42670;
mod mpu6050;

pub use bus::RegisterBus;
pub use gyro::GyroSensor;
pub use icm42670::{fifo_decimation, Icm42670};
pub use mpu6050::Mpu6050;

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};

use crate::errors::{SensorError, SensorResult};
use crate::time::{PollPolicy, RetryPolicy};
use crate::traits::{ConfigProvider, SensorBackend};

/// Default samples averaged per measurement
pub const DEFAULT_READ_COUNT: u16 = 50;

/// Default gyro reading above which the device counts as moving
pub const DEFAULT_MOVING_THRESHOLD: i32 = 500;

/// Operating mode of a sensor backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Not set up since power-on
    #[default]
    Unconfigured,
    /// One measurement per wake cycle
    Run,
    /// Streaming register reads, used while calibrating
    Continuous,
    /// Low-power state for deep sleep
    Sleep,
}

/// Accel and gyro offsets written to the sensor's offset registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GyroCalibration {
    /// Accel X offset
    pub ax: i16,
    /// Accel Y offset
    pub ay: i16,
    /// Accel Z offset
    pub az: i16,
    /// Gyro X offset
    pub gx: i16,
    /// Gyro Y offset
    pub gy: i16,
    /// Gyro Z offset
    pub gz: i16,
}

impl GyroCalibration {
    /// Whether no offsets have been measured yet
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// One raw reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    /// Accelerometer counts
    pub accel: [i16; 3],
    /// Gyroscope counts
    pub gyro: [i16; 3],
    /// Raw temperature register
    pub temp: i16,
}

/// Per-channel min/max over a batch, in ax ay az gx gy gz order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpread {
    /// Lowest value per channel
    pub min: [i16; 6],
    /// Highest value per channel
    pub max: [i16; 6],
}

/// Mean of a batch of raw samples
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateSample {
    /// Mean accelerometer counts
    pub accel: [i32; 3],
    /// Mean gyroscope counts
    pub gyro: [i32; 3],
    /// Mean sensor temperature (°C)
    pub temp_c: f64,
    /// Samples that went into the mean
    pub samples: u16,
    /// Spread of the raw values, when tracked
    pub spread: Option<SampleSpread>,
}

/// Running sums for a batch
#[derive(Debug, Default)]
pub(crate) struct SampleAccumulator {
    accel: [i64; 3],
    gyro: [i64; 3],
    temp: i64,
    count: u16,
    spread: Option<SampleSpread>,
}

impl SampleAccumulator {
    pub(crate) fn add(&mut self, s: &RawSample) {
        for i in 0..3 {
            self.accel[i] += i64::from(s.accel[i]);
            self.gyro[i] += i64::from(s.gyro[i]);
        }
        self.temp += i64::from(s.temp);
        self.count = self.count.saturating_add(1);

        let values = [s.accel[0], s.accel[1], s.accel[2], s.gyro[0], s.gyro[1], s.gyro[2]];
        let spread = self.spread.get_or_insert(SampleSpread { min: values, max: values });
        for (i, v) in values.iter().enumerate() {
            spread.min[i] = spread.min[i].min(*v);
            spread.max[i] = spread.max[i].max(*v);
        }
    }

    pub(crate) fn count(&self) -> u16 {
        self.count
    }

    /// Integer means; `temp_c` converts the mean raw temperature
    pub(crate) fn finish(&self, temp_c: impl Fn(f64) -> f64) -> AggregateSample {
        if self.count == 0 {
            return AggregateSample::default();
        }
        let n = i64::from(self.count);
        let mean = |v: i64| (v / n) as i32;
        AggregateSample {
            accel: self.accel.map(mean),
            gyro: self.gyro.map(mean),
            temp_c: temp_c(self.temp as f64 / n as f64),
            samples: self.count,
            spread: self.spread,
        }
    }
}

/// Parameters a backend needs for one session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSettings {
    /// Samples averaged per register-mode measurement
    pub read_count: u16,
    /// Gyro reading above which a sample counts as motion
    pub moving_threshold: i32,
    /// Deep sleep interval, used to size FIFO decimation (seconds)
    pub sleep_interval_s: i32,
    /// Offsets applied on every configure
    pub offsets: GyroCalibration,
    /// Data-ready wait budget
    pub ready: PollPolicy,
    /// Write-and-verify retry policy
    pub retry: RetryPolicy,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            read_count: DEFAULT_READ_COUNT,
            moving_threshold: DEFAULT_MOVING_THRESHOLD,
            sleep_interval_s: crate::constants::DEFAULT_SLEEP_INTERVAL_S,
            offsets: GyroCalibration::default(),
            ready: PollPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SensorSettings {
    /// Settings from the stored configuration
    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self {
            read_count: u16::try_from(config.gyro_read_count().max(0)).unwrap_or(u16::MAX),
            moving_threshold: config.gyro_sensor_moving_threshold(),
            sleep_interval_s: config.sleep_interval(),
            offsets: config.gyro_calibration(),
            ..Self::default()
        }
    }
}

/// Result of one measurement
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GyroResultData {
    /// Whether `angle` was measured this cycle
    pub valid: bool,
    /// Tilt angle (degrees)
    pub angle: f64,
    /// Sensor temperature (°C)
    pub temp_c: f64,
}

/// Probe the bus and return the backend of the IMU found on it.
///
/// The polled family is tried first, then the FIFO family, each on both
/// addresses.
pub fn detect_backend<'a, I2C, D>(
    i2c: I2C,
    delay: D,
    settings: SensorSettings,
) -> SensorResult<Box<dyn SensorBackend + 'a>>
where
    I2C: I2c + 'a,
    D: DelayNs + 'a,
{
    let mut mpu = Mpu6050::new(i2c, delay, settings);
    if let Ok(address) = mpu.detect() {
        log_info!(target: "GYRO", "Found {} at 0x{:02x}", mpu.name(), address);
        return Ok(Box::new(mpu));
    }

    let (i2c, delay) = mpu.release();
    let mut icm = Icm42670::new(i2c, delay, settings);
    if let Ok(address) = icm.detect() {
        log_info!(target: "GYRO", "Found {} at 0x{:02x}", icm.name(), address);
        return Ok(Box::new(icm));
    }

    log_error!(target: "GYRO", "No supported gyro detected");
    Err(SensorError::NotDetected)
}
