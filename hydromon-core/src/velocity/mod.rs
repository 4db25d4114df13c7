//! Fermentation Velocity Tracking
//!
//! ## Overview
//!
//! Fermentation speed is the rate at which gravity drops, reported in gravity
//! points (SG × 1000) per day. The device sleeps between readings and has no
//! persistent history, so the trend is kept in a small ring that lives in
//! retained memory:
//!
//! ```text
//!  period 0      period 1      period 2      period 3
//! [ 4 h     ] [ 4 h     ] [ 4 h     ] [ filling ]
//!   oldest                               newest
//! ```
//!
//! Each period holds `samples_per_period` filtered values, derived from the
//! sleep interval. When all four are full the oldest is dropped and the ring
//! shifts left.
//!
//! ## Velocity
//!
//! The average of the oldest period is compared with the average of the newest
//! non-empty period and the difference is scaled to 24 hours:
//!
//! ```text
//! velocity = (last - first) / hours × 24 × 1000
//! ```
//!
//! `hours` is the covered time in whole hours. One hour or less of history
//! yields no velocity.
//!
//! ## Usage
//!
//! ```rust
//! use hydromon_core::velocity::{VelocityState, VelocityTracker};
//!
//! let mut retained = [0u8; VelocityState::SIZE];
//! let mut state = VelocityState::restore(&retained);
//!
//! let mut tracker = VelocityTracker::new(&mut state, 900);
//! tracker.add_value(1.050);
//! assert_eq!(tracker.get_velocity(), 0.0);
//!
//! retained.copy_from_slice(&state.to_bytes());
//! ```

mod filter;
mod state;

pub use filter::{FilterState, MovingAverage, TrimmedMovingAverage};
pub use state::{VelocityPeriod, VelocityState};

use crate::constants::buffers::VELOCITY_PERIODS;
use crate::constants::time::{HOURS_PER_DAY, SECONDS_PER_HOUR, VELOCITY_MIN_HOURS, VELOCITY_PERIOD_HOURS};
use crate::traits::Filter;

/// Gravity trend over the last periods
pub struct VelocityTracker<'a, F: Filter = MovingAverage> {
    state: &'a mut VelocityState,
    filter: F,
    samples_per_period: i32,
}

impl<'a> VelocityTracker<'a, MovingAverage> {
    /// Track into `state` with the plain moving average filter
    pub fn new(state: &'a mut VelocityState, sleep_interval_s: i32) -> Self {
        Self::with_filter(state, sleep_interval_s, MovingAverage)
    }
}

impl<'a, F: Filter> VelocityTracker<'a, F> {
    /// Track into `state` with a custom smoothing filter
    pub fn with_filter(state: &'a mut VelocityState, sleep_interval_s: i32, filter: F) -> Self {
        let period_s = SECONDS_PER_HOUR * VELOCITY_PERIOD_HOURS;
        let samples_per_period = if sleep_interval_s >= period_s || sleep_interval_s <= 0 {
            1
        } else {
            period_s / sleep_interval_s
        };
        Self { state, filter, samples_per_period }
    }

    /// Values that fill one period
    pub fn samples_per_period(&self) -> i32 {
        self.samples_per_period
    }

    /// Values stored across all periods
    pub fn sample_count(&self) -> i32 {
        self.state.sample_count()
    }

    /// Largest number of values the ring holds
    pub fn capacity(&self) -> i32 {
        self.samples_per_period * VELOCITY_PERIODS as i32
    }

    /// Filter `gravity` and store it, returning the filtered value.
    ///
    /// Period min/max follow the unfiltered value.
    pub fn add_value(&mut self, gravity: f64) -> f64 {
        if self.sample_count() >= self.capacity() {
            let periods = &mut self.state.periods;
            periods.copy_within(1.., 0);
            periods[VELOCITY_PERIODS - 1] = VelocityPeriod::default();
        }

        let filtered = self.filter.filter(&mut self.state.filter, gravity);
        let spp = self.samples_per_period;

        if let Some(period) = self.state.periods.iter_mut().find(|p| i32::from(p.count) < spp) {
            period.total += filtered;
            period.count += 1;
            if period.count == 1 || gravity < period.min {
                period.min = gravity;
            }
            if period.count == 1 || gravity > period.max {
                period.max = gravity;
            }
        }

        filtered
    }

    fn hours(&self) -> i32 {
        self.sample_count() * VELOCITY_PERIOD_HOURS / self.samples_per_period
    }

    /// Whether enough history exists for a velocity
    pub fn is_velocity_valid(&self) -> bool {
        self.sample_count() > 0 && self.hours() > VELOCITY_MIN_HOURS
    }

    fn first_average(&self) -> f64 {
        self.state.periods.iter().find_map(VelocityPeriod::average).unwrap_or(0.0)
    }

    fn last_average(&self) -> f64 {
        let periods = &self.state.periods;
        let last = (1..VELOCITY_PERIODS)
            .find(|&i| periods[i].count == 0)
            .map_or(VELOCITY_PERIODS - 1, |i| i - 1);
        periods[last].average().unwrap_or(0.0)
    }

    /// Gravity points per day, 0 when there is not enough history
    pub fn get_velocity(&self) -> f64 {
        if !self.is_velocity_valid() {
            return 0.0;
        }
        let hours = f64::from(self.hours());
        (self.last_average() - self.first_average()) / hours * HOURS_PER_DAY * 1000.0
    }

    /// Log every period at debug level
    pub fn dump(&self) {
        for (i, p) in self.state.periods.iter().enumerate() {
            log_debug!(
                target: "VEL",
                "Section {} ({}h): min {:.4} max {:.4} ave {:.4} total {:.4} # {} ({})",
                i,
                VELOCITY_PERIOD_HOURS,
                p.min,
                p.max,
                p.average().unwrap_or(0.0),
                p.total,
                p.count,
                self.samples_per_period
            );
        }
    }
}
