//! Error Types for the Measurement Core
//!
//! ## Design Philosophy
//!
//! The hydrometer runs one measurement cycle per wake-up and then goes back to
//! deep sleep. Nothing that happens inside a cycle may take the device down, so
//! every failure is a plain value handed back to the caller:
//!
//! 1. **Small Size**: variants carry integers or `&'static str`, never owned
//!    strings. Errors are returned from register-level code and must stay cheap.
//!
//! 2. **Copy Semantics**: all error types are `Copy` so they can be logged,
//!    stored in a result record and returned without ownership juggling.
//!
//! 3. **One Enum per Concern**: sensor bus problems, calibration fitting,
//!    expression compilation and configuration persistence fail for unrelated
//!    reasons and are handled by different layers.
//!
//! ## Error Categories
//!
//! ### Sensor
//! - `NotDetected`: neither bus address answered with a known identity
//! - `ConfigFailed`: a register write could not be verified after all retries
//! - `Bus`: the I2C transaction itself failed
//! - `Timeout`: a ready flag never came up within its budget
//!
//! ### Calibration
//! - `NotEnoughValues`: fewer than three calibration points
//! - `UnableToFind`: no polynomial order reproduced the points closely enough
//! - `InternalError`: the least-squares system was singular
//!
//! ### Formula
//! - Compile errors with the byte position where parsing stopped
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use hydromon_core::{CalibrationError, CalibrationSet, fit_formula};
//!
//! let points = CalibrationSet::new();
//! match fit_formula(&points, 1.6) {
//!     Ok(formula) => { /* persist formula.as_str() */ }
//!     Err(CalibrationError::NotEnoughValues { .. }) => { /* ask for more points */ }
//!     Err(CalibrationError::UnableToFind { .. }) => { /* points are too noisy */ }
//!     Err(CalibrationError::InternalError) => { /* degenerate input */ }
//! }
//! ```

use embedded_hal::i2c::ErrorKind;
use thiserror_no_std::Error;

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Result type for calibration fitting
pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Result type for formula compilation and evaluation
pub type FormulaResult<T> = Result<T, FormulaError>;

/// Result type for configuration persistence
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Orientation sensor failures
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SensorError {
    /// No supported device answered on either bus address
    #[error("No supported sensor detected")]
    NotDetected,

    /// A register write did not read back after all retries
    #[error("Register 0x{register:02x} failed verification after {attempts} attempts")]
    ConfigFailed {
        /// Register that refused the value
        register: u8,
        /// Number of write attempts made
        attempts: u8,
    },

    /// The bus transaction failed
    #[error("I2C bus error: {kind:?}")]
    Bus {
        /// Generic error kind reported by the HAL
        kind: ErrorKind,
    },

    /// A ready flag did not come up in time
    #[error("Sensor not ready after {waited_us} us")]
    Timeout {
        /// Time spent waiting in microseconds
        waited_us: u32,
    },

    /// A read was attempted before `configure`
    #[error("Sensor has not been configured")]
    NotConfigured,
}

impl SensorError {
    /// Wrap a HAL bus error
    pub fn bus<E: embedded_hal::i2c::Error>(err: E) -> Self {
        Self::Bus { kind: err.kind() }
    }
}

impl From<crate::time::TimedOut> for SensorError {
    fn from(t: crate::time::TimedOut) -> Self {
        Self::Timeout { waited_us: t.waited_us }
    }
}

/// Calibration formula creation failures
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    /// Fewer than three calibration points are stored
    #[error("Not enough calibration values: have {available}, need 3")]
    NotEnoughValues {
        /// Number of non-empty calibration points
        available: usize,
    },

    /// No polynomial order met the deviation threshold
    #[error("No formula within max deviation {max_deviation}")]
    UnableToFind {
        /// Threshold that every order exceeded
        max_deviation: f64,
    },

    /// The least-squares system could not be solved
    #[error("Internal error while fitting formula")]
    InternalError,
}

/// Expression compile errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum FormulaError {
    /// Nothing to compile
    #[error("Formula is empty")]
    Empty,

    /// A character that is not part of the expression grammar
    #[error("Unexpected character at position {position}")]
    UnexpectedCharacter {
        /// Byte offset into the source
        position: usize,
    },

    /// A valid token in an invalid place
    #[error("Unexpected token at position {position}")]
    UnexpectedToken {
        /// Byte offset into the source
        position: usize,
    },

    /// A name that is neither a variable, constant nor function
    #[error("Unknown identifier at position {position}")]
    UnknownIdentifier {
        /// Byte offset into the source
        position: usize,
    },

    /// The expression does not fit the node arena
    #[error("Formula is too complex")]
    TooComplex,

    /// A rendered formula does not fit its string buffer
    #[error("Formula text is too long")]
    TooLong,
}

/// Configuration access failures
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// A value does not fit its fixed-capacity field
    #[error("Value too long for {field}")]
    ValueTooLong {
        /// Name of the configuration field
        field: &'static str,
    },

    /// The backing store could not be read or written
    #[error("Configuration storage failed: {reason}")]
    Storage {
        /// What went wrong
        reason: &'static str,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotDetected => defmt::write!(fmt, "No sensor detected"),
            Self::ConfigFailed { register, attempts } =>
                defmt::write!(fmt, "Register {=u8:#x} failed after {} attempts", register, attempts),
            Self::Bus { .. } => defmt::write!(fmt, "I2C bus error"),
            Self::Timeout { waited_us } => defmt::write!(fmt, "Not ready after {} us", waited_us),
            Self::NotConfigured => defmt::write!(fmt, "Sensor not configured"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CalibrationError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotEnoughValues { available } =>
                defmt::write!(fmt, "Not enough values: {}", available),
            Self::UnableToFind { max_deviation } =>
                defmt::write!(fmt, "No formula within {}", max_deviation),
            Self::InternalError => defmt::write!(fmt, "Internal fit error"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FormulaError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Empty => defmt::write!(fmt, "Empty formula"),
            Self::UnexpectedCharacter { position } =>
                defmt::write!(fmt, "Unexpected character at {}", position),
            Self::UnexpectedToken { position } =>
                defmt::write!(fmt, "Unexpected token at {}", position),
            Self::UnknownIdentifier { position } =>
                defmt::write!(fmt, "Unknown identifier at {}", position),
            Self::TooComplex => defmt::write!(fmt, "Formula too complex"),
            Self::TooLong => defmt::write!(fmt, "Formula too long"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::ValueTooLong { field } => defmt::write!(fmt, "Value too long for {}", field),
            Self::Storage { reason } => defmt::write!(fmt, "Storage failed: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_small() {
        assert!(core::mem::size_of::<SensorError>() <= 8);
        assert!(core::mem::size_of::<CalibrationError>() <= 16);
    }

    #[test]
    fn bus_error_keeps_kind() {
        let err = SensorError::bus(ErrorKind::ArbitrationLoss);
        assert_eq!(err, SensorError::Bus { kind: ErrorKind::ArbitrationLoss });
    }

    #[test]
    fn timeout_converts() {
        let err: SensorError = crate::time::TimedOut { waited_us: 1500 }.into();
        assert_eq!(err, SensorError::Timeout { waited_us: 1500 });
    }
}
