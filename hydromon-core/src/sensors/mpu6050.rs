//! Polled IMU backend (MPU-6050 / MPU-6500)
//!
//! Each measurement reads `read_count` samples, one per data-ready interrupt,
//! straight from the data registers and averages them. The device has offset
//! registers but no factory trim, so it must be calibrated lying flat before
//! the angle is meaningful.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::constants::physics::ACCEL_LSB_PER_G;
use crate::constants::sensors::{mpu, ADDRESS_PRIMARY, PROBE_ADDRESSES};
use crate::errors::{SensorError, SensorResult};
use crate::sensors::{
    AggregateSample, GyroCalibration, RawSample, RegisterBus, RunMode, SampleAccumulator,
    SensorSettings,
};
use crate::time::poll_until;
use crate::traits::SensorBackend;

/// MPU-6050 family backend
pub struct Mpu6050<I2C, D> {
    bus: RegisterBus<I2C>,
    delay: D,
    settings: SensorSettings,
    mode: RunMode,
    name: &'static str,
}

impl<I2C: I2c, D: DelayNs> Mpu6050<I2C, D> {
    /// Backend on `i2c`, not yet detected
    pub fn new(i2c: I2C, delay: D, settings: SensorSettings) -> Self {
        Self {
            bus: RegisterBus::new(i2c, ADDRESS_PRIMARY),
            delay,
            settings,
            mode: RunMode::Unconfigured,
            name: "MPU6050",
        }
    }

    /// Give back the bus and delay provider
    pub fn release(self) -> (I2C, D) {
        (self.bus.release(), self.delay)
    }

    fn write_config(&mut self) -> SensorResult<()> {
        let retry = self.settings.retry;
        let sequence = [
            (mpu::PWR_MGMT_1, mpu::CLOCK_PLL_XGYRO),
            (mpu::GYRO_CONFIG, 0x00),
            (mpu::ACCEL_CONFIG, 0x00),
            (mpu::CONFIG, mpu::DLPF_5HZ),
            (mpu::SMPLRT_DIV, mpu::RATE_DIVIDER),
            (mpu::INT_PIN_CFG, mpu::INT_ACTIVE_LOW_OPEN_DRAIN),
            (mpu::INT_ENABLE, mpu::INT_DATA_READY),
        ];
        for (reg, value) in sequence {
            self.bus.write_verified(&mut self.delay, retry, reg, value)?;
        }
        Ok(())
    }

    fn write_offsets(&mut self, offsets: &GyroCalibration) -> SensorResult<()> {
        let mut accel = [0u8; 6];
        let mut gyro = [0u8; 6];
        for (i, v) in [offsets.ax, offsets.ay, offsets.az].iter().enumerate() {
            accel[i * 2..i * 2 + 2].copy_from_slice(&v.to_be_bytes());
        }
        for (i, v) in [offsets.gx, offsets.gy, offsets.gz].iter().enumerate() {
            gyro[i * 2..i * 2 + 2].copy_from_slice(&v.to_be_bytes());
        }
        self.bus.write_regs(mpu::XA_OFFS_H, &accel)?;
        self.bus.write_regs(mpu::XG_OFFS_USRH, &gyro)
    }

    fn apply_offsets(&mut self) -> SensorResult<()> {
        let offsets = self.settings.offsets;
        if offsets.is_zero() {
            log_error!(target: "MPU", "No valid calibration values, please calibrate the device");
            return Ok(());
        }
        log_debug!(target: "MPU", "Applying calibration offsets {:?}", offsets);
        self.write_offsets(&offsets)
    }

    fn read_sample(&mut self) -> SensorResult<RawSample> {
        let bus = &mut self.bus;
        poll_until(&mut self.delay, self.settings.ready, || {
            bus.read_reg(mpu::INT_STATUS).map(|s| s & mpu::INT_DATA_READY != 0)
        })?;

        let mut buf = [0u8; 14];
        self.bus.read_regs(mpu::ACCEL_XOUT_H, &mut buf)?;
        let word = |i: usize| i16::from_be_bytes([buf[i], buf[i + 1]]);
        Ok(RawSample {
            accel: [word(0), word(2), word(4)],
            temp: word(6),
            gyro: [word(8), word(10), word(12)],
        })
    }
}

impl<I2C: I2c, D: DelayNs> SensorBackend for Mpu6050<I2C, D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&mut self) -> SensorResult<u8> {
        for address in PROBE_ADDRESSES {
            let Ok(who_am_i) = self.bus.probe(address, mpu::WHO_AM_I) else {
                continue;
            };
            let name = match (who_am_i >> 1) & 0x3F {
                mpu::ID_MPU6050 => "MPU6050",
                mpu::ID_MPU6500 => "MPU6500",
                id => {
                    log_trace!(target: "MPU", "Unknown identity 0x{:02x} at 0x{:02x}", id, address);
                    continue;
                }
            };
            self.bus.set_address(address);
            self.name = name;
            return Ok(address);
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

        log_debug!(target: "MPU", "Configuring {} for {:?}", self.name, mode);
        self.write_config()?;
        self.apply_offsets()?;
        self.mode = mode;
        Ok(())
    }

    fn read_batch(&mut self) -> SensorResult<AggregateSample> {
        if matches!(self.mode, RunMode::Unconfigured | RunMode::Sleep) {
            return Err(SensorError::NotConfigured);
        }
        if self.settings.read_count == 0 {
            log_error!(target: "MPU", "Read count is zero, no samples taken");
            return Ok(AggregateSample::default());
        }

        let mut acc = SampleAccumulator::default();
        for _ in 0..self.settings.read_count {
            let sample = self.read_sample()?;
            acc.add(&sample);
        }

        let agg = acc.finish(|raw| raw / mpu::TEMP_LSB_PER_C + mpu::TEMP_OFFSET_C);
        if let Some(spread) = agg.spread {
            log_debug!(
                target: "MPU",
                "Spread over {} samples: min {:?} max {:?}",
                acc.count(),
                spread.min,
                spread.max
            );
        }
        Ok(agg)
    }

    fn enter_sleep(&mut self) -> SensorResult<()> {
        let power = self.bus.read_reg(mpu::PWR_MGMT_1)?;
        self.bus.write_reg(mpu::PWR_MGMT_1, power | mpu::SLEEP_BIT)?;
        self.mode = RunMode::Sleep;
        Ok(())
    }

    fn mode(&self) -> RunMode {
        self.mode
    }

    fn needs_calibration(&self) -> bool {
        true
    }

    fn calibrate(&mut self) -> SensorResult<GyroCalibration> {
        if matches!(self.mode, RunMode::Unconfigured | RunMode::Sleep) {
            self.configure(RunMode::Continuous, true)?;
        }
        log_info!(target: "MPU", "Calibrating, keep the device flat and still");

        let agg = self.read_batch()?;
        if agg.samples == 0 {
            return Err(SensorError::NotConfigured);
        }

        let old = self.settings.offsets;
        let accel_scale = mpu::ACCEL_OFFSET_SCALE;
        let gyro_scale = mpu::GYRO_OFFSET_SCALE;
        let shift = |offset: i16, error: i32, scale: i32| {
            let value = i32::from(offset) - error / scale;
            value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
        };

        // Flat with Z up: X and Y read zero, Z reads 1 g.
        let offsets = GyroCalibration {
            ax: shift(old.ax, agg.accel[0], accel_scale),
            ay: shift(old.ay, agg.accel[1], accel_scale),
            az: shift(old.az, agg.accel[2] - ACCEL_LSB_PER_G as i32, accel_scale),
            gx: shift(old.gx, agg.gyro[0], gyro_scale),
            gy: shift(old.gy, agg.gyro[1], gyro_scale),
            gz: shift(old.gz, agg.gyro[2], gyro_scale),
        };

        self.write_offsets(&offsets)?;
        self.settings.offsets = offsets;
        log_info!(target: "MPU", "New offsets {:?}", offsets);
        Ok(offsets)
    }

    fn offsets(&self) -> GyroCalibration {
        self.settings.offsets
    }
}
