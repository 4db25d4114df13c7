//! Bounded waiting for hardware
//!
//! Sensors signal readiness through status bits that have to be polled. An
//! unresponsive device must never hang the wake cycle, so every wait goes
//! through one of two helpers:
//!
//! - [`poll_until`]: repeat a check until it reports ready or a time budget runs out
//! - [`retry_verified`]: repeat a write-and-verify step a fixed number of times
//!   with a backoff between attempts
//!
//! Both take the delay provider as a parameter. Tests pass a recording delay and
//! run instantly while still observing how long the firmware would have waited.

use embedded_hal::delay::DelayNs;
use fugit::{MicrosDurationU32, MillisDurationU32};

use crate::constants::time::{
    CONFIG_RETRY_ATTEMPTS, CONFIG_RETRY_BACKOFF_MS, READY_POLL_INTERVAL_US, READY_TIMEOUT_US,
};

/// A bounded wait ran out of budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    /// Time spent waiting in microseconds
    pub waited_us: u32,
}

/// Budget and granularity of a ready-flag wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Give up once this much time has been spent waiting
    pub budget: MicrosDurationU32,
    /// Delay between two checks
    pub interval: MicrosDurationU32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            budget: MicrosDurationU32::micros(READY_TIMEOUT_US),
            interval: MicrosDurationU32::micros(READY_POLL_INTERVAL_US),
        }
    }
}

/// Attempt count and backoff of a write-and-verify loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub attempts: u8,
    /// Delay after each failed attempt
    pub backoff: MillisDurationU32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: CONFIG_RETRY_ATTEMPTS,
            backoff: MillisDurationU32::millis(CONFIG_RETRY_BACKOFF_MS),
        }
    }
}

/// Poll `ready` until it returns `true` or the budget is spent.
///
/// `ready` is checked once before any delay, so a flag that is already set
/// costs no waiting. Errors from `ready` abort the wait immediately.
pub fn poll_until<D, E, F>(delay: &mut D, policy: PollPolicy, mut ready: F) -> Result<(), E>
where
    D: DelayNs + ?Sized,
    E: From<TimedOut>,
    F: FnMut() -> Result<bool, E>,
{
    let budget = policy.budget.ticks();
    let interval = policy.interval.ticks().max(1);
    let mut waited = 0u32;

    loop {
        if ready()? {
            return Ok(());
        }
        if waited >= budget {
            return Err(TimedOut { waited_us: waited }.into());
        }
        delay.delay_us(interval);
        waited = waited.saturating_add(interval);
    }
}

/// Run `attempt` until it reports success, at most `policy.attempts` times.
///
/// `attempt` gets the delay provider for waits of its own. Returns the number
/// of attempts used on success and `None` once every attempt came back
/// unverified. There is no backoff after the final attempt.
pub fn retry_verified<D, E, F>(delay: &mut D, policy: RetryPolicy, mut attempt: F) -> Result<Option<u8>, E>
where
    D: DelayNs + ?Sized,
    F: FnMut(&mut D) -> Result<bool, E>,
{
    for n in 1..=policy.attempts {
        if attempt(&mut *delay)? {
            return Ok(Some(n));
        }
        if n < policy.attempts {
            delay.delay_ms(policy.backoff.ticks());
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingDelay {
        total_us: u64,
        calls: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_us += u64::from(ns) / 1000;
            self.calls += 1;
        }
    }

    #[test]
    fn ready_immediately_never_delays() {
        let mut delay = CountingDelay::default();
        let res: Result<(), TimedOut> = poll_until(&mut delay, PollPolicy::default(), || Ok(true));
        assert!(res.is_ok());
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn poll_gives_up_after_budget() {
        let mut delay = CountingDelay::default();
        let policy = PollPolicy {
            budget: MicrosDurationU32::micros(1000),
            interval: MicrosDurationU32::micros(100),
        };
        let res: Result<(), TimedOut> = poll_until(&mut delay, policy, || Ok(false));
        assert_eq!(res, Err(TimedOut { waited_us: 1000 }));
        assert_eq!(delay.total_us, 1000);
    }

    #[test]
    fn poll_returns_after_flag_rises() {
        let mut delay = CountingDelay::default();
        let mut checks = 0;
        let res: Result<(), TimedOut> = poll_until(&mut delay, PollPolicy::default(), || {
            checks += 1;
            Ok(checks == 4)
        });
        assert!(res.is_ok());
        assert_eq!(delay.calls, 3);
    }

    #[test]
    fn retry_backs_off_between_attempts_only() {
        let mut delay = CountingDelay::default();
        let res: Result<_, TimedOut> = retry_verified(&mut delay, RetryPolicy::default(), |_| Ok(false));
        assert_eq!(res, Ok(None));
        // four gaps of one second between five attempts
        assert_eq!(delay.total_us, 4_000_000);
    }

    #[test]
    fn retry_reports_attempts_used() {
        let mut delay = CountingDelay::default();
        let mut n = 0;
        let res: Result<_, TimedOut> = retry_verified(&mut delay, RetryPolicy::default(), |_| {
            n += 1;
            Ok(n == 2)
        });
        assert_eq!(res, Ok(Some(2)));
    }
}
