//! Retained velocity state and its byte layout
//!
//! The velocity ring must survive deep sleep. Only bytes are kept in retained
//! memory; the typed state is rebuilt from them on every wake.
//!
//! ## Layout (little-endian, 184 bytes)
//!
//! ```text
//! offset  size  field
//!      0     4  magic "HVEL"
//!      4     2  layout version
//!      6     2  reserved
//!      8   128  4 × period
//!               +0  f64 total
//!               +8  f64 min
//!              +16  f64 max
//!              +24  i16 count
//!              +26  6 bytes padding
//!    136    40  5 × f64 filter window
//!    176     4  u32 filter count
//!    180     4  padding
//! ```

use crate::constants::buffers::{FILTER_WINDOW, VELOCITY_PERIODS};
use crate::velocity::filter::FilterState;

const MAGIC: u32 = u32::from_le_bytes(*b"HVEL");
const VERSION: u16 = 1;

const HEADER_SIZE: usize = 8;
const PERIOD_SIZE: usize = 32;
const FILTER_OFFSET: usize = HEADER_SIZE + VELOCITY_PERIODS * PERIOD_SIZE;
const FILTER_SIZE: usize = 48;

/// Accumulated gravity over one velocity period
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityPeriod {
    /// Sum of filtered gravity values
    pub total: f64,
    /// Lowest unfiltered gravity
    pub min: f64,
    /// Highest unfiltered gravity
    pub max: f64,
    /// Number of values
    pub count: i16,
}

impl VelocityPeriod {
    /// Mean of the filtered values, `None` when empty
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / f64::from(self.count))
    }

    fn write(&self, bytes: &mut [u8]) {
        bytes[0..8].copy_from_slice(&self.total.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.min.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.max.to_le_bytes());
        bytes[24..26].copy_from_slice(&self.count.to_le_bytes());
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            total: read_f64(&bytes[0..8]),
            min: read_f64(&bytes[8..16]),
            max: read_f64(&bytes[16..24]),
            count: i16::from_le_bytes([bytes[24], bytes[25]]),
        }
    }
}

/// Everything the velocity tracker keeps between wake cycles
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityState {
    pub(crate) periods: [VelocityPeriod; VELOCITY_PERIODS],
    pub(crate) filter: FilterState,
}

fn read_f64(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    f64::from_le_bytes(buf)
}

impl VelocityState {
    /// Serialized size in bytes
    pub const SIZE: usize = FILTER_OFFSET + FILTER_SIZE;

    /// Empty ring and filter
    pub const fn new() -> Self {
        Self {
            periods: [VelocityPeriod { total: 0.0, min: 0.0, max: 0.0, count: 0 }; VELOCITY_PERIODS],
            filter: FilterState::new(),
        }
    }

    /// Periods, oldest first
    pub fn periods(&self) -> &[VelocityPeriod; VELOCITY_PERIODS] {
        &self.periods
    }

    /// Smoothing filter window
    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    /// Total samples across all periods
    pub fn sample_count(&self) -> i32 {
        self.periods.iter().map(|p| i32::from(p.count)).sum()
    }

    /// Encode for retained memory
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];

        bytes[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        bytes[4..6].copy_from_slice(&VERSION.to_le_bytes());

        for (i, period) in self.periods.iter().enumerate() {
            let offset = HEADER_SIZE + i * PERIOD_SIZE;
            period.write(&mut bytes[offset..offset + PERIOD_SIZE]);
        }

        let mut offset = FILTER_OFFSET;
        for value in &self.filter.buffer {
            bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
            offset += 8;
        }
        let count = self.filter.count.min(FILTER_WINDOW) as u32;
        bytes[offset..offset + 4].copy_from_slice(&count.to_le_bytes());

        // Padding is already zero
        bytes
    }

    /// Decode a retained block.
    ///
    /// Returns `None` for a block of the wrong size, an unknown magic or
    /// version, or counts that cannot have been written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if magic != MAGIC || version != VERSION {
            return None;
        }

        let mut state = Self::new();
        for (i, period) in state.periods.iter_mut().enumerate() {
            let offset = HEADER_SIZE + i * PERIOD_SIZE;
            *period = VelocityPeriod::read(&bytes[offset..offset + PERIOD_SIZE]);
            if period.count < 0 {
                return None;
            }
        }

        let mut offset = FILTER_OFFSET;
        for value in state.filter.buffer.iter_mut() {
            *value = read_f64(&bytes[offset..offset + 8]);
            offset += 8;
        }
        let count = u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);
        if count as usize > FILTER_WINDOW {
            return None;
        }
        state.filter.count = count as usize;

        Some(state)
    }

    /// Decode a retained block, starting fresh when it is not valid.
    ///
    /// After a cold boot retained memory holds garbage; that is the normal way
    /// for the ring to start empty.
    pub fn restore(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes).unwrap_or_else(|| {
            log_info!(target: "VEL", "No valid velocity state retained, starting fresh");
            Self::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> VelocityState {
        let mut state = VelocityState::new();
        state.periods[0] = VelocityPeriod { total: 16.8, min: 1.049, max: 1.051, count: 16 };
        state.periods[1] = VelocityPeriod { total: 3.12, min: 1.039, max: 1.041, count: 3 };
        state.filter.buffer = [1.04, 1.041, 1.039, 0.0, 0.0];
        state.filter.count = 3;
        state
    }

    #[test]
    fn layout_size_is_fixed() {
        assert_eq!(VelocityState::SIZE, 184);
    }

    #[test]
    fn bytes_restore_identical_state() {
        let state = sample_state();
        let bytes = state.to_bytes();
        assert_eq!(&bytes[0..4], b"HVEL");
        assert_eq!(VelocityState::from_bytes(&bytes), Some(state));
    }

    #[test]
    fn count_is_little_endian_at_fixed_offset() {
        let bytes = sample_state().to_bytes();
        // period 0 count at 8 + 24
        assert_eq!(&bytes[32..34], &16i16.to_le_bytes());
        // filter count at 176
        assert_eq!(&bytes[176..180], &3u32.to_le_bytes());
    }

    #[test]
    fn garbage_starts_fresh() {
        assert_eq!(VelocityState::restore(&[0xA5; VelocityState::SIZE]), VelocityState::new());
        assert_eq!(VelocityState::restore(&[]), VelocityState::new());
    }

    #[test]
    fn other_version_is_rejected() {
        let mut bytes = sample_state().to_bytes();
        bytes[4] = 2;
        assert_eq!(VelocityState::from_bytes(&bytes), None);
    }

    #[test]
    fn corrupt_counts_are_rejected() {
        let mut bytes = sample_state().to_bytes();
        bytes[176] = 9;
        assert_eq!(VelocityState::from_bytes(&bytes), None);

        let mut bytes = sample_state().to_bytes();
        bytes[32..34].copy_from_slice(&(-1i16).to_le_bytes());
        assert_eq!(VelocityState::from_bytes(&bytes), None);
    }
}
