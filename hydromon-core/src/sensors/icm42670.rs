//! FIFO IMU backend (ICM-42670-P)
//!
//! In `Run` mode the sensor records accel and gyro packets into its FIFO while
//! the host is in deep sleep. On wake the queued packets are drained in chunks
//! and every packet taken while the hydrometer was moving is dropped before
//! averaging. The FIFO only holds about eleven seconds at the base rate, so the
//! output rate is decimated to match the sleep interval.
//!
//! `Continuous` mode reads data-ready gated register samples instead, used while
//! the device is awake for configuration.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::bus::verified;
use crate::angle::is_moving;
use crate::constants::sensors::{icm, ADDRESS_PRIMARY, PROBE_ADDRESSES};
use crate::constants::time::{CONTINUOUS_SETTLE_MS, SENSOR_POWER_ON_US};
use crate::errors::{SensorError, SensorResult};
use crate::sensors::{
    AggregateSample, GyroCalibration, RawSample, RegisterBus, RunMode, SampleAccumulator,
    SensorSettings,
};
use crate::time::{poll_until, retry_verified};
use crate::traits::SensorBackend;

/// FDR_CONFIG value for a sleep interval.
///
/// The rate is divided by the smallest power of two that stretches the FIFO
/// window over the interval. `0` means no decimation, `8..=15` divide by
/// `2..=256`.
pub fn fifo_decimation(sleep_interval_s: i32) -> u8 {
    let wanted = sleep_interval_s / icm::FIFO_WINDOW_S;
    let mut exp = 0u32;
    while exp < icm::MAX_DECIMATION_EXP && wanted > (1 << exp) {
        exp += 1;
    }
    if exp == 0 {
        0
    } else {
        (7 + exp as u8).min(icm::MAX_DECIMATION_REG)
    }
}

/// Decode one FIFO packet, `None` when the header is not accel + gyro
fn parse_packet(packet: &[u8]) -> Option<RawSample> {
    if packet[0] & icm::PACKET_HEADER_MASK != icm::PACKET_HEADER {
        return None;
    }
    let word = |i: usize| i16::from_be_bytes([packet[i], packet[i + 1]]);
    Some(RawSample {
        accel: [word(1), word(3), word(5)],
        gyro: [word(7), word(9), word(11)],
        temp: i16::from(packet[13] as i8),
    })
}

fn mreg_write<I2C: I2c, D: DelayNs + ?Sized>(
    bus: &mut RegisterBus<I2C>,
    delay: &mut D,
    reg: u8,
    value: u8,
) -> SensorResult<()> {
    bus.write_reg(icm::BLK_SEL_W, 0)?;
    bus.write_reg(icm::MADDR_W, reg)?;
    bus.write_reg(icm::M_W, value)?;
    delay.delay_us(icm::MREG_ACCESS_US);
    Ok(())
}

fn mreg_read<I2C: I2c, D: DelayNs + ?Sized>(
    bus: &mut RegisterBus<I2C>,
    delay: &mut D,
    reg: u8,
) -> SensorResult<u8> {
    bus.write_reg(icm::BLK_SEL_R, 0)?;
    bus.write_reg(icm::MADDR_R, reg)?;
    delay.delay_us(icm::MREG_ACCESS_US);
    bus.read_reg(icm::M_R)
}

/// ICM-42670-P backend
pub struct Icm42670<I2C, D> {
    bus: RegisterBus<I2C>,
    delay: D,
    settings: SensorSettings,
    mode: RunMode,
    settle_pending: bool,
}

impl<I2C: I2c, D: DelayNs> Icm42670<I2C, D> {
    /// Backend on `i2c`, not yet detected
    pub fn new(i2c: I2C, delay: D, settings: SensorSettings) -> Self {
        Self {
            bus: RegisterBus::new(i2c, ADDRESS_PRIMARY),
            delay,
            settings,
            mode: RunMode::Unconfigured,
            settle_pending: false,
        }
    }

    /// Give back the bus and delay provider
    pub fn release(self) -> (I2C, D) {
        (self.bus.release(), self.delay)
    }

    fn write_mreg_verified(&mut self, reg: u8, value: u8) -> SensorResult<()> {
        let retry = self.settings.retry;
        let bus = &mut self.bus;
        let used = retry_verified(&mut self.delay, retry, |delay| {
            mreg_write(bus, delay, reg, value)?;
            Ok::<_, SensorError>(mreg_read(bus, delay, reg)? == value)
        })?;
        verified(used, reg, retry)
    }

    fn configure_fifo(&mut self, force: bool) -> SensorResult<()> {
        if !force && self.bus.read_reg(icm::PWR_MGMT0)? == icm::SENSORS_ON {
            log_debug!(target: "ICM", "FIFO already recording, keeping configuration");
            return Ok(());
        }

        self.bus.write_reg(icm::PWR_MGMT0, icm::IDLE)?;
        let bus = &mut self.bus;
        poll_until(&mut self.delay, self.settings.ready, || {
            bus.read_reg(icm::MCLK_RDY).map(|v| v != 0)
        })?;

        self.write_mreg_verified(icm::MREG_TMST_CONFIG1, icm::APEX_DISABLE)?;

        let decimation = fifo_decimation(self.settings.sleep_interval_s);
        log_debug!(
            target: "ICM",
            "Decimation register {} for a {}s sleep interval",
            decimation,
            self.settings.sleep_interval_s
        );
        self.write_mreg_verified(icm::MREG_FDR_CONFIG, decimation)?;
        self.write_mreg_verified(icm::MREG_FIFO_CONFIG5, icm::FIFO_ACCEL_GYRO)?;

        self.bus.write_reg(icm::FIFO_CONFIG2, icm::WATERMARK_OFF)?;
        self.bus.write_reg(icm::FIFO_CONFIG3, icm::WATERMARK_OFF)?;
        self.bus.write_reg(icm::INTF_CONFIG0, icm::INTF_FIFO_RECORDS)?;

        self.bus.write_reg(icm::PWR_MGMT0, icm::SENSORS_ON)?;
        self.delay.delay_us(SENSOR_POWER_ON_US);
        self.bus.write_regs(icm::GYRO_CONFIG0, &icm::FIFO_MODE_CONFIG)?;
        self.bus.write_reg(icm::FIFO_CONFIG1, icm::FIFO_STREAM)
    }

    fn configure_registers(&mut self) -> SensorResult<()> {
        self.bus.write_reg(icm::PWR_MGMT0, icm::SENSORS_ON)?;
        self.delay.delay_us(SENSOR_POWER_ON_US);
        self.bus.write_regs(icm::GYRO_CONFIG0, &icm::REGISTER_MODE_CONFIG)?;
        self.settle_pending = true;
        Ok(())
    }

    fn read_fifo(&mut self) -> SensorResult<AggregateSample> {
        let mut count = [0u8; 2];
        self.bus.read_regs(icm::FIFO_COUNTH, &mut count)?;
        let available = usize::from(u16::from_be_bytes(count));
        let mut remaining = available.min(icm::FIFO_PACKETS);
        log_debug!(target: "ICM", "{} packets queued, reading {}", available, remaining);

        let threshold = self.settings.moving_threshold;
        let mut acc = SampleAccumulator::default();
        let mut moving = 0u16;
        let mut invalid = 0u16;
        let mut chunk = [0u8; icm::PACKET_SIZE * icm::PACKETS_PER_CHUNK];

        while remaining > 0 {
            let packets = remaining.min(icm::PACKETS_PER_CHUNK);
            let bytes = &mut chunk[..packets * icm::PACKET_SIZE];
            self.bus.read_regs(icm::FIFO_DATA, bytes)?;

            for packet in bytes.chunks_exact(icm::PACKET_SIZE) {
                match parse_packet(packet) {
                    None => invalid += 1,
                    Some(s) => {
                        let [gx, gy, gz] = s.gyro.map(i32::from);
                        if is_moving(gx, gy, gz, threshold) {
                            moving += 1;
                        } else {
                            acc.add(&s);
                        }
                    }
                }
            }
            remaining -= packets;
        }

        if moving > 0 || invalid > 0 {
            log_debug!(target: "ICM", "Dropped {} moving and {} invalid packets", moving, invalid);
        }
        if acc.count() == 0 {
            log_warn!(target: "ICM", "No still packets in FIFO");
        }
        Ok(acc.finish(|raw| raw / icm::FIFO_TEMP_LSB_PER_C + icm::TEMP_OFFSET_C))
    }

    fn read_registers(&mut self) -> SensorResult<AggregateSample> {
        if self.settle_pending {
            self.delay.delay_ms(CONTINUOUS_SETTLE_MS);
            self.settle_pending = false;
        }
        if self.settings.read_count == 0 {
            log_error!(target: "ICM", "Read count is zero, no samples taken");
            return Ok(AggregateSample::default());
        }

        let mut acc = SampleAccumulator::default();
        let mut buf = [0u8; 14];
        for _ in 0..self.settings.read_count {
            let bus = &mut self.bus;
            poll_until(&mut self.delay, self.settings.ready, || {
                bus.read_reg(icm::INT_STATUS_DRDY).map(|s| s & 0x01 != 0)
            })?;
            self.bus.read_regs(icm::TEMP_DATA1, &mut buf)?;
            let word = |i: usize| i16::from_be_bytes([buf[i], buf[i + 1]]);
            acc.add(&RawSample {
                temp: word(0),
                accel: [word(2), word(4), word(6)],
                gyro: [word(8), word(10), word(12)],
            });
        }
        Ok(acc.finish(|raw| raw / icm::TEMP_LSB_PER_C + icm::TEMP_OFFSET_C))
    }
}

impl<I2C: I2c, D: DelayNs> SensorBackend for Icm42670<I2C, D> {
    fn name(&self) -> &'static str {
        "ICM42670-p"
    }

    fn detect(&mut self) -> SensorResult<u8> {
        for address in PROBE_ADDRESSES {
            if let Ok(icm::ID_ICM42670P) = self.bus.probe(address, icm::WHO_AM_I) {
                self.bus.set_address(address);
                return Ok(address);
            }
        }
        Err(SensorError::NotDetected)
    }

    fn configure(&mut self, mode: RunMode, force: bool) -> SensorResult<()> {
        match mode {
            RunMode::Sleep => return self.enter_sleep(),
            RunMode::Unconfigured => return Ok(()),
            RunMode::Run | RunMode::Continuous => {}
        }
        if self.mode == mode && !force {
            return Ok(());
        }

        match mode {
            RunMode::Run => self.configure_fifo(force)?,
            _ => self.configure_registers()?,
        }
        self.mode = mode;
        Ok(())
    }

    fn read_batch(&mut self) -> SensorResult<AggregateSample> {
        match self.mode {
            RunMode::Run => self.read_fifo(),
            RunMode::Continuous => self.read_registers(),
            RunMode::Unconfigured | RunMode::Sleep => Err(SensorError::NotConfigured),
        }
    }

    fn enter_sleep(&mut self) -> SensorResult<()> {
        if self.mode == RunMode::Run {
            log_debug!(target: "ICM", "Leaving sensors on, FIFO records during sleep");
        } else {
            self.bus.write_reg(icm::PWR_MGMT0, icm::SENSORS_OFF)?;
        }
        self.mode = RunMode::Sleep;
        Ok(())
    }

    fn mode(&self) -> RunMode {
        self.mode
    }

    fn calibrate(&mut self) -> SensorResult<GyroCalibration> {
        log_info!(target: "ICM", "Factory calibrated, keeping offsets");
        Ok(self.settings.offsets)
    }

    fn offsets(&self) -> GyroCalibration {
        self.settings.offsets
    }
}
