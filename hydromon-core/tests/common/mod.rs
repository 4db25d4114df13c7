//! Common test utilities for integration tests
//!
//! This module provides:
//! - A simulated I2C bus hosting register-file devices
//! - A delay provider that records instead of sleeping
//! - Builders for the supported IMUs in typical states

#![allow(dead_code)]

pub mod bus;
pub mod delay;
pub mod scenarios;

pub use bus::{SimBus, SimDevice, SimError};
pub use delay::RecordingDelay;

/// Assert two floats agree within `eps`
#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr, $eps:expr) => {
        let (l, r): (f64, f64) = ($left, $right);
        assert!((l - r).abs() < $eps, "expected {} to be within {} of {}", l, $eps, r);
    };
}
