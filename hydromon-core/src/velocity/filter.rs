//! Gravity smoothing filters
//!
//! A five-value window is enough to flatten the jitter of a floating sensor
//! without delaying the trend by more than a few wake cycles.

use crate::constants::buffers::FILTER_WINDOW;
use crate::traits::Filter;

/// Window of recent values, retained across deep sleep
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilterState {
    pub(crate) buffer: [f64; FILTER_WINDOW],
    pub(crate) count: usize,
}

impl FilterState {
    /// Empty window
    pub const fn new() -> Self {
        Self { buffer: [0.0; FILTER_WINDOW], count: 0 }
    }

    /// Values currently in the window, oldest first
    pub fn values(&self) -> &[f64] {
        &self.buffer[..self.count.min(FILTER_WINDOW)]
    }

    /// Number of values in the window
    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, value: f64) {
        if self.count >= FILTER_WINDOW {
            self.buffer.copy_within(1.., 0);
            self.count = FILTER_WINDOW - 1;
        }
        self.buffer[self.count] = value;
        self.count += 1;
    }

    fn sum(&self) -> f64 {
        self.values().iter().sum()
    }
}

/// Plain moving average over the window
#[derive(Debug, Clone, Copy, Default)]
pub struct MovingAverage;

impl Filter for MovingAverage {
    fn filter(&self, state: &mut FilterState, value: f64) -> f64 {
        state.push(value);
        state.sum() / state.len() as f64
    }
}

/// Moving average that drops one lowest and one highest value once the
/// window is full
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimmedMovingAverage;

impl Filter for TrimmedMovingAverage {
    fn filter(&self, state: &mut FilterState, value: f64) -> f64 {
        state.push(value);
        let values = state.values();
        if values.len() < FILTER_WINDOW {
            return state.sum() / values.len() as f64;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (state.sum() - min - max) / (values.len() - 2) as f64
    }
}
