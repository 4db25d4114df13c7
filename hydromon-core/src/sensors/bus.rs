//! Register access over I2C
//!
//! Both IMU families expose byte-wide registers behind a 7-bit address with
//! auto-increment on burst reads. `RegisterBus` wraps the HAL bus with that
//! access pattern and maps HAL errors into [`SensorError`].

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::errors::{SensorError, SensorResult};
use crate::time::{retry_verified, RetryPolicy};

/// An I2C bus bound to one device address
pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> RegisterBus<I2C> {
    /// Bind `i2c` to `address`
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Current device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Point at another device address
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Give the bus back
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Read one register
    pub fn read_reg(&mut self, reg: u8) -> SensorResult<u8> {
        let mut buf = [0u8; 1];
        self.read_regs(reg, &mut buf)?;
        Ok(buf[0])
    }

    /// Read consecutive registers starting at `reg`
    pub fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> SensorResult<()> {
        self.i2c.write_read(self.address, &[reg], buf).map_err(SensorError::bus)
    }

    /// Write one register
    pub fn write_reg(&mut self, reg: u8, value: u8) -> SensorResult<()> {
        self.i2c.write(self.address, &[reg, value]).map_err(SensorError::bus)
    }

    /// Write consecutive registers starting at `reg`
    pub fn write_regs(&mut self, reg: u8, values: &[u8]) -> SensorResult<()> {
        let mut frame = [0u8; 16];
        let len = values.len().min(frame.len() - 1);
        frame[0] = reg;
        frame[1..=len].copy_from_slice(&values[..len]);
        self.i2c.write(self.address, &frame[..=len]).map_err(SensorError::bus)
    }

    /// Read `reg` at `address` without changing the bound address
    pub fn probe(&mut self, address: u8, reg: u8) -> SensorResult<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(address, &[reg], &mut buf)
            .map_err(SensorError::bus)?;
        Ok(buf[0])
    }

    /// Write `value` to `reg` and read it back, retrying per `policy`.
    pub fn write_verified<D: DelayNs + ?Sized>(
        &mut self,
        delay: &mut D,
        policy: RetryPolicy,
        reg: u8,
        value: u8,
    ) -> SensorResult<()> {
        let used = retry_verified(delay, policy, |_| {
            self.write_reg(reg, value)?;
            Ok::<_, SensorError>(self.read_reg(reg)? == value)
        })?;
        verified(used, reg, policy)
    }
}

/// Map the outcome of a write-and-verify loop onto a sensor result
pub(crate) fn verified(used: Option<u8>, reg: u8, policy: RetryPolicy) -> SensorResult<()> {
    match used {
        Some(1) => Ok(()),
        Some(n) => {
            log_warn!(target: "GYRO", "Register 0x{:02x} verified after {} attempts", reg, n);
            Ok(())
        }
        None => {
            log_error!(target: "GYRO", "Register 0x{:02x} failed verification", reg);
            Err(SensorError::ConfigFailed { register: reg, attempts: policy.attempts })
        }
    }
}
