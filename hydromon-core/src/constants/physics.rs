//! Physical Constants and Unit Conversions
//!
//! Values used to turn raw accelerometer counts into an angle and to correct a
//! specific gravity reading for the temperature of the liquid.

// ===== ACCELEROMETER =====

/// Accelerometer sensitivity at the ±2 g full-scale range (LSB per g).
///
/// Both supported IMUs are configured for ±2 g, where 1 g reads 16384.
pub const ACCEL_LSB_PER_G: f64 = 16384.0;

/// Radians to degrees.
pub const RAD_TO_DEG: f64 = 180.0 / core::f64::consts::PI;

// ===== TEMPERATURE =====

/// Fahrenheit per Celsius degree.
pub const F_PER_C: f64 = 1.8;

/// Fahrenheit value of 0 °C.
pub const F_AT_ZERO_C: f64 = 32.0;

/// Default calibration temperature of a hydrometer (°C).
pub const DEFAULT_CALIBRATION_TEMP_C: f64 = 20.0;

// ===== TEMPERATURE CORRECTION =====

/// Coefficients of the density-of-water polynomial used for gravity
/// temperature correction, lowest order first. Input is degrees Fahrenheit.
///
/// `P(t) = c0 + c1·t + c2·t² + c3·t³`
pub const TEMP_CORRECTION_COEFFS: [f64; 4] = [
    1.00130346,
    -0.000134722124,
    0.00000204052596,
    -0.00000000232820948,
];

// ===== GRAVITY =====

/// Default maximum deviation, in thousandths of SG, between a fitted formula
/// and any calibration point.
pub const DEFAULT_MAX_FORMULA_DEVIATION: f64 = 1.6;
