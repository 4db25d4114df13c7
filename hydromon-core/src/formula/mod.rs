//! Gravity formula evaluation
//!
//! ## Overview
//!
//! The device stores its calibration as a plain arithmetic formula over two
//! variables, `tilt` (degrees) and `temp` (°C). Users may replace the fitted
//! formula by hand, so the formula is interpreted at runtime rather than kept
//! as coefficients.
//!
//! ```rust
//! use hydromon_core::formula::calculate_gravity;
//!
//! let sg = calculate_gravity("0.00100000*tilt^2+0.00050000*tilt+1.00000000", 45.0, 20.0);
//! assert!((sg - 3.0475).abs() < 1e-9);
//! ```
//!
//! ## Failure Policy
//!
//! [`calculate_gravity`] logs a broken formula and returns `0.0`, the value the
//! push layer has always received in that case. Callers that need to tell a
//! broken formula from a zero reading use [`try_calculate_gravity`].
//!
//! ## Temperature Correction
//!
//! Hydrometer readings drift with the density of water. The correction scales
//! gravity by `P(temp) / P(cal_temp)` with a fixed cubic in degrees Fahrenheit,
//! see [`TEMP_CORRECTION_COEFFS`].

mod expr;

pub use expr::Expr;

use crate::constants::buffers::FORMULA_CAPACITY;
use crate::constants::physics::{F_AT_ZERO_C, F_PER_C, TEMP_CORRECTION_COEFFS};
use crate::errors::{FormulaError, FormulaResult};

/// Fixed-capacity formula text
pub type FormulaString = heapless::String<FORMULA_CAPACITY>;

/// Variable names available to a gravity formula, in binding order
pub const GRAVITY_VARIABLES: [&str; 2] = ["tilt", "temp"];

/// A compiled gravity formula
#[derive(Debug, Clone)]
pub struct GravityFormula {
    expr: Expr,
}

impl GravityFormula {
    /// Compile a formula over `tilt` and `temp`
    pub fn compile(src: &str) -> FormulaResult<Self> {
        Expr::compile(src, &GRAVITY_VARIABLES).map(|expr| Self { expr })
    }

    /// Evaluate at the given tilt (degrees) and temperature (°C)
    pub fn evaluate(&self, tilt: f64, temp_c: f64) -> f64 {
        self.expr.eval(&[tilt, temp_c])
    }
}

/// Evaluate `formula`, reporting compile failures.
///
/// An empty formula is reported as [`FormulaError::Empty`].
pub fn try_calculate_gravity(formula: &str, tilt: f64, temp_c: f64) -> FormulaResult<f64> {
    if formula.is_empty() {
        return Err(FormulaError::Empty);
    }
    Ok(GravityFormula::compile(formula)?.evaluate(tilt, temp_c))
}

/// Evaluate `formula`, returning `0.0` when there is none or it does not compile.
pub fn calculate_gravity(formula: &str, tilt: f64, temp_c: f64) -> f64 {
    if formula.is_empty() {
        return 0.0;
    }
    match try_calculate_gravity(formula, tilt, temp_c) {
        Ok(gravity) => {
            log_debug!(target: "CALC", "Formula {} gave {} at tilt {}", formula, gravity, tilt);
            gravity
        }
        Err(_e) => {
            log_error!(target: "CALC", "Failed to compile formula '{}': {}", formula, _e);
            0.0
        }
    }
}

fn water_density_ratio(temp_f: f64) -> f64 {
    let [c0, c1, c2, c3] = TEMP_CORRECTION_COEFFS;
    c0 + temp_f * (c1 + temp_f * (c2 + temp_f * c3))
}

/// Correct gravity measured at `temp_f` to the hydrometer's `cal_temp_f`.
///
/// Both temperatures in °F. Returns `gravity` unchanged when the correction
/// is not a finite number.
pub fn gravity_temperature_correction_f(gravity: f64, temp_f: f64, cal_temp_f: f64) -> f64 {
    let corrected = gravity * (water_density_ratio(temp_f) / water_density_ratio(cal_temp_f));
    if corrected.is_finite() {
        corrected
    } else {
        log_error!(target: "CALC", "Temperature correction failed for {} at {}F", gravity, temp_f);
        gravity
    }
}

/// Correct gravity measured at `temp_c` to the hydrometer's `cal_temp_c`, both °C.
pub fn gravity_temperature_correction_c(gravity: f64, temp_c: f64, cal_temp_c: f64) -> f64 {
    gravity_temperature_correction_f(gravity, convert_c_to_f(temp_c), convert_c_to_f(cal_temp_c))
}

/// Celsius to Fahrenheit
pub fn convert_c_to_f(c: f64) -> f64 {
    c * F_PER_C + F_AT_ZERO_C
}

/// Fahrenheit to Celsius
pub fn convert_f_to_c(f: f64) -> f64 {
    (f - F_AT_ZERO_C) / F_PER_C
}

/// Specific gravity to degrees Plato. Returns 0 for a zero gravity.
pub fn convert_to_plato(sg: f64) -> f64 {
    if sg == 0.0 {
        return 0.0;
    }
    259.0 - 259.0 / sg
}

/// Degrees Plato to specific gravity
pub fn convert_to_sg(plato: f64) -> f64 {
    259.0 / (259.0 - plato)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_formula_at_45_degrees() {
        let sg = calculate_gravity("0.00100000*tilt^2+0.00050000*tilt+1.00000000", 45.0, 20.0);
        // 0.001 * 2025 + 0.0005 * 45 + 1
        assert!((sg - 3.0475).abs() < 1e-12);
    }

    #[test]
    fn temp_variable_is_bound() {
        let sg = calculate_gravity("tilt/100+temp/1000", 30.0, 20.0);
        assert!((sg - 0.32).abs() < 1e-12);
    }

    #[test]
    fn empty_formula_is_zero() {
        assert_eq!(calculate_gravity("", 45.0, 20.0), 0.0);
        assert_eq!(try_calculate_gravity("", 45.0, 20.0), Err(FormulaError::Empty));
    }

    #[test]
    fn broken_formula_is_zero_or_error() {
        assert_eq!(calculate_gravity("tilt*+", 45.0, 20.0), 0.0);
        assert!(matches!(
            try_calculate_gravity("tilt*+", 45.0, 20.0),
            Err(FormulaError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            try_calculate_gravity("angle*2", 45.0, 20.0),
            Err(FormulaError::UnknownIdentifier { position: 0 })
        ));
    }

    #[test]
    fn runaway_nesting_is_too_complex() {
        let formula = alloc::format!("{}tilt", "sin ".repeat(20_000));
        assert_eq!(try_calculate_gravity(&formula, 30.0, 20.0), Err(FormulaError::TooComplex));
        assert_eq!(calculate_gravity(&formula, 30.0, 20.0), 0.0);
    }

    #[test]
    fn temperature_correction_regression() {
        let corrected = gravity_temperature_correction_c(1.05, 25.0, 20.0);
        assert!((corrected - 1.0511745304031856).abs() < 1e-9);

        let corrected = gravity_temperature_correction_c(1.02, 45.0, 20.0);
        assert!((corrected - 1.0280820562963675).abs() < 1e-9);
    }

    #[test]
    fn correction_at_calibration_temp_is_identity() {
        let corrected = gravity_temperature_correction_c(1.048, 20.0, 20.0);
        assert!((corrected - 1.048).abs() < 1e-15);
    }

    #[test]
    fn correction_failure_keeps_gravity() {
        assert_eq!(gravity_temperature_correction_f(1.05, f64::NAN, 68.0), 1.05);
    }

    #[test]
    fn unit_conversions() {
        assert!((convert_c_to_f(20.0) - 68.0).abs() < 1e-12);
        assert!((convert_f_to_c(212.0) - 100.0).abs() < 1e-12);
        assert!((convert_to_plato(1.05) - 12.333333333).abs() < 1e-6);
        assert!((convert_to_sg(convert_to_plato(1.05)) - 1.05).abs() < 1e-12);
        assert_eq!(convert_to_plato(0.0), 0.0);
    }
}
