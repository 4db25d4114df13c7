//! Buffer and Capacity Constants
//!
//! Everything in the core is statically sized so a measurement cycle never
//! touches the allocator outside of backend selection.

/// Calibration point slots stored in the configuration.
pub const CALIBRATION_SLOTS: usize = 20;

/// Maximum length of a gravity formula string.
pub const FORMULA_CAPACITY: usize = 128;

/// Node capacity of a compiled expression.
pub const EXPR_NODES: usize = 64;

/// Window of the gravity smoothing filter.
pub const FILTER_WINDOW: usize = 5;

/// Number of periods in the velocity ring.
pub const VELOCITY_PERIODS: usize = 4;

/// Window of the angle moving average kept by the gyro sensor.
pub const ANGLE_HISTORY: usize = 5;
