//! One measurement cycle
//!
//! Turns a gyro result into the values the device reports: gravity from the
//! stored formula, optionally temperature corrected, and the fermentation
//! velocity when retained state is available.

use crate::formula::{calculate_gravity, gravity_temperature_correction_c};
use crate::sensors::GyroResultData;
use crate::traits::ConfigProvider;
use crate::velocity::{VelocityState, VelocityTracker};

/// Values produced by one wake cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Tilt angle (degrees)
    pub angle: f64,
    /// Sensor temperature (°C)
    pub temp_c: f64,
    /// Reported gravity (SG), temperature corrected when enabled
    pub gravity: f64,
    /// Gravity corrected to the calibration temperature (SG)
    pub corrected_gravity: f64,
    /// Gravity points per day, `None` without enough history
    pub velocity: Option<f64>,
    /// Angle below the water calibration point
    pub below_water: bool,
}

/// Process one gyro result.
///
/// Returns `None` when the result is not valid; the caller keeps its previous
/// measurement. Every computed gravity enters the velocity ring, including the
/// `0.0` of a missing or broken formula.
pub fn process_cycle<C: ConfigProvider + ?Sized>(
    result: &GyroResultData,
    config: &C,
    velocity: Option<&mut VelocityState>,
) -> Option<Measurement> {
    if !result.valid {
        log_warn!(target: "FORM", "No valid angle this cycle");
        return None;
    }

    let raw = calculate_gravity(config.gravity_formula(), result.angle, result.temp_c);
    let corrected =
        gravity_temperature_correction_c(raw, result.temp_c, config.default_calibration_temp());
    let gravity = if config.gravity_temp_adjustment() { corrected } else { raw };

    let below_water = config
        .formula_data()
        .water_point()
        .is_some_and(|water| result.angle < water.angle);

    let velocity = match velocity {
        Some(state) => {
            let mut tracker = VelocityTracker::new(state, config.sleep_interval());
            tracker.add_value(gravity);
            tracker.dump();
            tracker.is_velocity_valid().then(|| tracker.get_velocity())
        }
        None => None,
    };

    log_info!(
        target: "FORM",
        "angle {:.3} temp {:.2} gravity {:.4} corrected {:.4}",
        result.angle,
        result.temp_c,
        gravity,
        corrected
    );

    Some(Measurement {
        angle: result.angle,
        temp_c: result.temp_c,
        gravity,
        corrected_gravity: corrected,
        velocity,
        below_water,
    })
}
