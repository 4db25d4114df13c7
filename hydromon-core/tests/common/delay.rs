//! Delay provider that records requested waits
//!
//! Nothing actually sleeps, so retry and timeout paths run instantly while the
//! test can still check how long the firmware would have waited.

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    total_ns: Rc<Cell<u64>>,
    calls: Rc<Cell<u32>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_us(&self) -> u64 {
        self.total_ns.get() / 1_000
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    pub fn reset(&self) {
        self.total_ns.set(0);
        self.calls.set(0);
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
        self.calls.set(self.calls.get() + 1);
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_ns(us.saturating_mul(1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ms) * 1_000_000);
        self.calls.set(self.calls.get() + 1);
    }
}
