//! Constants for Hydromon Core
//!
//! Every number the measurement pipeline depends on lives here, with the
//! datasheet or firmware behaviour it comes from.
//!
//! ## Organization
//!
//! - **Physics**: unit conversions and the temperature correction polynomial
//! - **Sensors**: register maps and scale factors of the supported IMUs
//! - **Time**: wake intervals, retry budgets and settle delays
//! - **Buffers**: fixed capacities of calibration slots, formulas and filters

/// Unit conversions and the hydrometer temperature correction polynomial.
pub mod physics;

/// Register maps, identities and scale factors of the supported sensors.
pub mod sensors;

/// Time-related constants for intervals, retries and settle delays.
pub mod time;

/// Fixed capacities for heap-free storage.
pub mod buffers;

pub use physics::{ACCEL_LSB_PER_G, RAD_TO_DEG};
pub use time::{
    DEFAULT_SLEEP_INTERVAL_S, CONFIG_RETRY_ATTEMPTS, CONFIG_RETRY_BACKOFF_MS,
    READY_TIMEOUT_US,
};
pub use buffers::{CALIBRATION_SLOTS, FORMULA_CAPACITY, FILTER_WINDOW, VELOCITY_PERIODS};
