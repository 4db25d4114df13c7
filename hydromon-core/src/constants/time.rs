//! Time-Related Constants
//!
//! Wake intervals, retry policy and settle times used by the sensor backends
//! and the velocity tracker.

// ===== TIME UNIT CONVERSIONS =====

/// Seconds per hour.
pub const SECONDS_PER_HOUR: i32 = 3600;

/// Hours per day.
pub const HOURS_PER_DAY: f64 = 24.0;

// ===== WAKE CYCLE =====

/// Default deep sleep interval between measurements (seconds).
pub const DEFAULT_SLEEP_INTERVAL_S: i32 = 900;

// ===== CONFIGURATION RETRY =====

/// Write-and-verify attempts before a register is reported as failed.
pub const CONFIG_RETRY_ATTEMPTS: u8 = 5;

/// Delay between write-and-verify attempts (milliseconds).
pub const CONFIG_RETRY_BACKOFF_MS: u32 = 1000;

// ===== READY FLAGS =====

/// Upper bound for a single data-ready wait (microseconds).
///
/// The slowest configured output data rate is 50 Hz, so one sample is due
/// every 20 ms. Five sample periods is plenty.
pub const READY_TIMEOUT_US: u32 = 100_000;

/// Poll interval while waiting on a ready flag (microseconds).
pub const READY_POLL_INTERVAL_US: u32 = 100;

/// Settle time after switching the FIFO IMU to register mode (milliseconds).
pub const CONTINUOUS_SETTLE_MS: u32 = 45;

/// Settle time after powering the FIFO IMU sensors on (microseconds).
pub const SENSOR_POWER_ON_US: u32 = 200;

// ===== VELOCITY =====

/// Wall-clock span of one velocity period (hours).
pub const VELOCITY_PERIOD_HOURS: i32 = 4;

/// Minimum history before a velocity is reported (hours).
pub const VELOCITY_MIN_HOURS: i32 = 1;
