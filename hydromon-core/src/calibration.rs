//! Calibration Formula Creation
//!
//! ## Overview
//!
//! Users calibrate the hydrometer by recording the tilt angle in liquids of
//! known gravity. Up to [`CALIBRATION_SLOTS`] such points are stored. This
//! module fits a polynomial through them and renders it as a formula string
//! that [`crate::formula`] evaluates on every wake cycle.
//!
//! ## Algorithm
//!
//! 1. Collect the non-empty slots. Fewer than three points is an error and
//!    no fitting is attempted.
//! 2. For order 2, 3 and 4 in turn, solve the least-squares normal equations
//!    and render the coefficients with 8 decimals.
//! 3. Evaluate the *rendered* formula at every point. If any point deviates by
//!    more than the configured threshold (in SG × 1000), try the next order.
//!
//! Lower orders win because they extrapolate more gently outside the
//! calibrated range.
//!
//! ## Numerical Conditioning
//!
//! Angles sit between roughly 20° and 80°, so raw powers up to `x^8` span
//! fourteen orders of magnitude. Angles are centred and scaled to `[-1, 1]`
//! before the normal equations are built, and the solution is expanded back
//! into powers of `tilt` afterwards.

use core::fmt::Write;

use heapless::Vec;
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::buffers::CALIBRATION_SLOTS;
use crate::errors::{CalibrationError, CalibrationResult, FormulaError};
use crate::formula::{FormulaString, GravityFormula};
use crate::traits::ConfigProvider;

/// Polynomial orders tried, in order
pub const FIT_ORDERS: [usize; 3] = [2, 3, 4];

/// Minimum number of points for a fit
pub const MIN_CALIBRATION_POINTS: usize = 3;

/// Coefficients of the highest supported order
pub const MAX_TERMS: usize = 5;

/// Relative pivot size below which the normal equations count as singular
const SINGULAR_PIVOT: f64 = 1e-12;

/// One recorded (angle, gravity) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Tilt angle in degrees
    #[serde(rename = "a")]
    pub angle: f64,
    /// Specific gravity at that angle
    #[serde(rename = "g")]
    pub gravity: f64,
}

impl CalibrationPoint {
    /// Create a point
    pub const fn new(angle: f64, gravity: f64) -> Self {
        Self { angle, gravity }
    }
}

/// Fixed set of calibration slots.
///
/// Persisted as an array of `{ "a": angle, "g": gravity }` objects. A stored
/// angle of exactly 0 marks an empty slot; empty slots are written back as
/// `{ "a": 0, "g": 1 }`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationSet {
    slots: [Option<CalibrationPoint>; CALIBRATION_SLOTS],
}

impl CalibrationSet {
    /// All slots empty
    pub const fn new() -> Self {
        Self { slots: [None; CALIBRATION_SLOTS] }
    }

    /// Fill slots from the front with `(angle, gravity)` pairs.
    ///
    /// Pairs beyond the slot count are ignored; a zero angle leaves its slot empty.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        let mut set = Self::new();
        for (slot, &(angle, gravity)) in pairs.iter().take(CALIBRATION_SLOTS).enumerate() {
            set.set(slot, angle, gravity);
        }
        set
    }

    /// Store a point. A zero angle clears the slot. Out-of-range slots are ignored.
    pub fn set(&mut self, slot: usize, angle: f64, gravity: f64) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = (angle != 0.0).then_some(CalibrationPoint::new(angle, gravity));
        }
    }

    /// Empty a slot
    pub fn clear(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = None;
        }
    }

    /// Point in `slot`, if any
    pub fn get(&self, slot: usize) -> Option<CalibrationPoint> {
        self.slots.get(slot).copied().flatten()
    }

    /// All slots including empty ones
    pub fn slots(&self) -> &[Option<CalibrationPoint>; CALIBRATION_SLOTS] {
        &self.slots
    }

    /// Non-empty points in slot order
    pub fn points(&self) -> impl Iterator<Item = CalibrationPoint> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Number of non-empty slots
    pub fn len(&self) -> usize {
        self.points().count()
    }

    /// Whether every slot is empty
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// The first recorded point, by convention the reading in plain water
    pub fn water_point(&self) -> Option<CalibrationPoint> {
        self.slots.first().copied().flatten()
    }
}

const EMPTY_SLOT: CalibrationPoint = CalibrationPoint::new(0.0, 1.0);

impl Serialize for CalibrationSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(CALIBRATION_SLOTS))?;
        for slot in &self.slots {
            seq.serialize_element(&slot.unwrap_or(EMPTY_SLOT))?;
        }
        seq.end()
    }
}

struct CalibrationSetVisitor;

impl<'de> Visitor<'de> for CalibrationSetVisitor {
    type Value = CalibrationSet;

    fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("an array of {a, g} calibration points")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut set = CalibrationSet::new();
        let mut slot = 0;
        while let Some(point) = seq.next_element::<CalibrationPoint>()? {
            set.set(slot, point.angle, point.gravity);
            slot += 1;
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for CalibrationSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(CalibrationSetVisitor)
    }
}

/// A polynomial that reproduced the calibration points
#[derive(Debug, Clone, PartialEq)]
pub struct FittedFormula {
    /// Polynomial order
    pub order: usize,
    /// Coefficients, highest power first
    pub coefficients: Vec<f64, MAX_TERMS>,
    /// Largest deviation seen during validation (SG × 1000)
    pub max_deviation: f64,
    formula: FormulaString,
}

impl FittedFormula {
    /// Rendered formula text
    pub fn as_str(&self) -> &str {
        &self.formula
    }
}

/// Least-squares polynomial coefficients, highest power first.
///
/// Fails with [`CalibrationError::InternalError`] when the points do not
/// determine a polynomial of this order, e.g. too few distinct angles.
pub fn fit_polynomial(points: &[CalibrationPoint], order: usize) -> CalibrationResult<Vec<f64, MAX_TERMS>> {
    let n = order + 1;
    if order == 0 || n > MAX_TERMS || points.len() < n {
        return Err(CalibrationError::InternalError);
    }

    let count = points.len() as f64;
    let mean = points.iter().map(|p| p.angle).sum::<f64>() / count;
    let scale = points.iter().map(|p| libm::fabs(p.angle - mean)).fold(0.0, f64::max);
    if !(scale.is_finite() && scale > 0.0) {
        return Err(CalibrationError::InternalError);
    }

    // Normal equations in t = (x - mean) / scale, augmented with the right-hand side.
    let mut m = [[0.0f64; MAX_TERMS + 1]; MAX_TERMS];
    for p in points {
        let t = (p.angle - mean) / scale;
        let mut powers = [1.0f64; 2 * MAX_TERMS - 1];
        for k in 1..2 * n - 1 {
            powers[k] = powers[k - 1] * t;
        }
        for i in 0..n {
            for j in 0..n {
                m[i][j] += powers[i + j];
            }
            m[i][n] += p.gravity * powers[i];
        }
    }

    let d = solve(&mut m, n)?;

    // Expand sum d_k * ((x - mean) / scale)^k into powers of x.
    let mut c = [0.0f64; MAX_TERMS];
    for (k, dk) in d.iter().enumerate().take(n) {
        let dk = dk / libm::pow(scale, k as f64);
        let mut binom = 1.0;
        for j in (0..=k).rev() {
            // binom = C(k, j)
            c[j] += dk * binom * libm::pow(-mean, (k - j) as f64);
            binom = binom * j as f64 / (k - j + 1) as f64;
        }
    }

    if c.iter().take(n).any(|v| !v.is_finite()) {
        return Err(CalibrationError::InternalError);
    }

    let mut out = Vec::new();
    for v in c.iter().take(n).rev() {
        out.push(*v).map_err(|_| CalibrationError::InternalError)?;
    }
    Ok(out)
}

/// Gaussian elimination with partial pivoting on an `n × (n+1)` augmented matrix
fn solve(m: &mut [[f64; MAX_TERMS + 1]; MAX_TERMS], n: usize) -> CalibrationResult<[f64; MAX_TERMS]> {
    let reference = (0..n).map(|i| libm::fabs(m[i][i])).fold(0.0, f64::max);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| libm::fabs(m[a][col]).total_cmp(&libm::fabs(m[b][col])))
            .unwrap_or(col);
        let size = libm::fabs(m[pivot][col]);
        if size.is_nan() || size <= reference * SINGULAR_PIVOT {
            return Err(CalibrationError::InternalError);
        }
        m.swap(col, pivot);

        for row in col + 1..n {
            let f = m[row][col] / m[col][col];
            for k in col..=n {
                m[row][k] -= f * m[col][k];
            }
        }
    }

    let mut x = [0.0f64; MAX_TERMS];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * x[k]).sum();
        x[row] = (m[row][n] - tail) / m[row][row];
    }
    Ok(x)
}

/// Render coefficients (highest power first) as `c0*tilt^n+...+cN` with 8 decimals.
pub fn render_formula(coefficients: &[f64]) -> Result<FormulaString, FormulaError> {
    let mut out = FormulaString::new();
    let order = coefficients.len().saturating_sub(1);
    for (i, c) in coefficients.iter().enumerate() {
        let power = order - i;
        if i > 0 {
            out.push('+').map_err(|_| FormulaError::TooLong)?;
        }
        let res = match power {
            0 => write!(out, "{:.8}", c),
            1 => write!(out, "{:.8}*tilt", c),
            p => write!(out, "{:.8}*tilt^{}", c, p),
        };
        res.map_err(|_| FormulaError::TooLong)?;
    }
    Ok(out)
}

/// Largest deviation (SG × 1000) of `formula` over `points`
fn max_deviation(formula: &GravityFormula, points: &[CalibrationPoint], temp_c: f64) -> f64 {
    points
        .iter()
        .map(|p| libm::fabs(formula.evaluate(p.angle, temp_c) - p.gravity) * 1000.0)
        .fold(0.0, f64::max)
}

/// Fit the lowest polynomial order that stays within `max_deviation` of every point.
pub fn fit_formula(set: &CalibrationSet, max_deviation_allowed: f64) -> CalibrationResult<FittedFormula> {
    let points: Vec<CalibrationPoint, CALIBRATION_SLOTS> = set.points().collect();
    if points.len() < MIN_CALIBRATION_POINTS {
        log_warn!(target: "CALC", "Not enough values for deriving formula ({})", points.len());
        return Err(CalibrationError::NotEnoughValues { available: points.len() });
    }

    for order in FIT_ORDERS {
        if points.len() < order + 1 {
            break;
        }
        let coefficients = fit_polynomial(&points, order)?;
        let formula = render_formula(&coefficients).map_err(|_| CalibrationError::InternalError)?;
        let compiled = GravityFormula::compile(&formula).map_err(|_| CalibrationError::InternalError)?;
        let deviation = max_deviation(&compiled, &points, 0.0);

        if deviation <= max_deviation_allowed {
            log_info!(target: "CALC", "Found formula of order {}: {} (max deviation {})", order, formula.as_str(), deviation);
            return Ok(FittedFormula { order, coefficients, max_deviation: deviation, formula });
        }
        log_debug!(target: "CALC", "Order {} rejected, deviation {} > {}", order, deviation, max_deviation_allowed);
    }

    log_warn!(target: "CALC", "No formula within max deviation {}", max_deviation_allowed);
    Err(CalibrationError::UnableToFind { max_deviation: max_deviation_allowed })
}

/// Fit a formula from the stored calibration points and persist it.
///
/// The configuration is only changed when a formula is found. A failed save is
/// logged; the new formula stays active in memory.
pub fn create_formula<C: ConfigProvider + ?Sized>(config: &mut C) -> CalibrationResult<FittedFormula> {
    let fitted = fit_formula(config.formula_data(), config.max_formula_creation_deviation())?;
    config
        .set_gravity_formula(fitted.as_str())
        .map_err(|_| CalibrationError::InternalError)?;
    if let Err(_e) = config.save() {
        log_error!(target: "CALC", "Failed to save new formula: {}", _e);
    }
    Ok(fitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_set() -> CalibrationSet {
        CalibrationSet::from_pairs(&[
            (25.0, 1.0),
            (30.0, 1.01),
            (35.0, 1.02),
            (40.0, 1.03),
            (45.0, 1.04),
            (50.0, 1.05),
            (55.0, 1.06),
            (60.0, 1.07),
            (65.0, 1.08),
            (70.0, 1.1),
        ])
    }

    #[test]
    fn one_point_is_not_enough() {
        // Slots with a zero angle are empty whatever their gravity.
        let set = CalibrationSet::from_pairs(&[(0.0, 1.0), (25.0, 1.02), (0.0, 1.033)]);
        assert_eq!(set.len(), 1);
        assert_eq!(fit_formula(&set, 1.6), Err(CalibrationError::NotEnoughValues { available: 1 }));
    }

    #[test]
    fn two_points_are_not_enough() {
        let set = CalibrationSet::from_pairs(&[(25.0, 1.0), (0.0, 1.0), (45.0, 1.04)]);
        assert_eq!(set.len(), 2);
        assert_eq!(fit_formula(&set, 1.6), Err(CalibrationError::NotEnoughValues { available: 2 }));
        assert_eq!(
            fit_formula(&CalibrationSet::new(), 1.6),
            Err(CalibrationError::NotEnoughValues { available: 0 })
        );
    }

    #[test]
    fn three_points_reach_the_quadratic_fit() {
        let f = |x: f64| 0.00001 * x * x + 0.001 * x + 1.0;
        let pairs: [(f64, f64); 3] = [30.0, 40.0, 50.0].map(|x| (x, f(x)));
        let fitted = fit_formula(&CalibrationSet::from_pairs(&pairs), 1.6).unwrap();
        assert_eq!(fitted.order, 2);
        assert_eq!(fitted.coefficients.len(), 3);
        assert!(fitted.max_deviation < 1e-3);
    }

    #[test]
    fn reference_points_fit_at_order_two() {
        let fitted = fit_formula(&reference_set(), 4.0).unwrap();
        assert_eq!(fitted.order, 2);
        assert_eq!(fitted.as_str(), "0.00000909*tilt^2+0.00124545*tilt+0.96445455");
        assert_eq!(fitted.coefficients.len(), 3);
    }

    #[test]
    fn noisy_points_fail_default_threshold() {
        assert_eq!(
            fit_formula(&reference_set(), 1.6),
            Err(CalibrationError::UnableToFind { max_deviation: 1.6 })
        );
    }

    #[test]
    fn exact_quadratic_is_reproduced() {
        let f = |x: f64| 0.00001 * x * x + 0.001 * x + 1.0;
        let pairs: [(f64, f64); 5] = [30.0, 40.0, 50.0, 60.0, 70.0].map(|x| (x, f(x)));
        let fitted = fit_formula(&CalibrationSet::from_pairs(&pairs), 1.6).unwrap();
        assert_eq!(fitted.order, 2);
        assert_eq!(fitted.as_str(), "0.00001000*tilt^2+0.00100000*tilt+1.00000000");
        assert!(fitted.max_deviation < 1e-3);
    }

    #[test]
    fn cubic_data_escalates_order() {
        let f = |x: f64| 0.000002 * x * x * x - 0.0002 * x * x + 0.01 * x + 0.9;
        let pairs: [(f64, f64); 6] = [25.0, 35.0, 45.0, 55.0, 65.0, 75.0].map(|x| (x, f(x)));
        let fitted = fit_formula(&CalibrationSet::from_pairs(&pairs), 1.6).unwrap();
        assert_eq!(fitted.order, 3);
        assert_eq!(fitted.coefficients.len(), 4);
    }

    #[test]
    fn repeated_angle_is_internal_error() {
        let set = CalibrationSet::from_pairs(&[(30.0, 1.0), (30.0, 1.01), (30.0, 1.02)]);
        assert_eq!(fit_formula(&set, 1.6), Err(CalibrationError::InternalError));
    }

    #[test]
    fn negative_coefficients_render_and_evaluate() {
        let text = render_formula(&[-0.5, 2.0, 1.25]).unwrap();
        assert_eq!(text.as_str(), "-0.50000000*tilt^2+2.00000000*tilt+1.25000000");
        let text = render_formula(&[1.0, -2.0, 0.0, 3.0]).unwrap();
        assert_eq!(text.as_str(), "1.00000000*tilt^3+-2.00000000*tilt^2+0.00000000*tilt+3.00000000");
        let g = crate::formula::calculate_gravity(&text, 2.0, 20.0);
        assert!((g - 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_slots_keep_their_position() {
        let mut set = CalibrationSet::new();
        set.set(3, 40.0, 1.03);
        set.set(25, 50.0, 1.05);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(3), Some(CalibrationPoint::new(40.0, 1.03)));
        assert_eq!(set.water_point(), None);
        set.clear(3);
        assert!(set.is_empty());
    }
}
