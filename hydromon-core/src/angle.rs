//! Tilt angle and motion gate
//!
//! The hydrometer floats with its long axis along the sensor Y axis. Upright in
//! water gravity points along +Y and the angle is 0°. Lying flat gravity is
//! perpendicular to Y and the angle is 90°. Only the Y projection is used; the
//! X and Z components enter through the vector length alone.

use libm::{acos, sqrt};

use crate::constants::physics::{ACCEL_LSB_PER_G, RAD_TO_DEG};

/// Tilt angle in degrees from averaged raw accelerometer counts.
///
/// Returns `None` for a zero vector, where no direction can be derived.
pub fn estimate_angle(ax: f64, ay: f64, az: f64) -> Option<f64> {
    let x = ax / ACCEL_LSB_PER_G;
    let y = ay / ACCEL_LSB_PER_G;
    let z = az / ACCEL_LSB_PER_G;

    let norm = sqrt(x * x + y * y + z * z);
    if !norm.is_finite() || norm <= 0.0 {
        return None;
    }

    // Rounding can push the ratio a hair past ±1, where acos is NaN.
    let cos = (y / norm).clamp(-1.0, 1.0);
    let angle = acos(cos) * RAD_TO_DEG;
    angle.is_finite().then_some(angle)
}

/// Whether any gyro axis exceeds `threshold`.
///
/// A reading exactly at the threshold is not movement.
pub fn is_moving(gx: i32, gy: i32, gz: i32, threshold: i32) -> bool {
    gx.abs() > threshold || gy.abs() > threshold || gz.abs() > threshold
}
