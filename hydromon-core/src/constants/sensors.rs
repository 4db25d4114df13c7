//! Sensor Register Maps
//!
//! Register addresses and identity values of the two supported IMU families.
//! Values come from the vendor datasheets; names follow the datasheet names.

// ===== BUS ADDRESSES =====

/// Primary I2C address (AD0 low) shared by both IMU families.
pub const ADDRESS_PRIMARY: u8 = 0x68;

/// Secondary I2C address (AD0 high).
pub const ADDRESS_SECONDARY: u8 = 0x69;

/// Probe order for detection.
pub const PROBE_ADDRESSES: [u8; 2] = [ADDRESS_PRIMARY, ADDRESS_SECONDARY];

/// Polled 6-axis IMU (MPU-6050 family).
pub mod mpu {
    /// Accelerometer offset registers, 3 × i16 big-endian.
    pub const XA_OFFS_H: u8 = 0x06;
    /// Gyroscope offset registers, 3 × i16 big-endian.
    pub const XG_OFFS_USRH: u8 = 0x13;
    /// Sample rate divider.
    pub const SMPLRT_DIV: u8 = 0x19;
    /// Digital low-pass filter configuration.
    pub const CONFIG: u8 = 0x1A;
    /// Gyroscope full-scale range.
    pub const GYRO_CONFIG: u8 = 0x1B;
    /// Accelerometer full-scale range.
    pub const ACCEL_CONFIG: u8 = 0x1C;
    /// Interrupt pin configuration.
    pub const INT_PIN_CFG: u8 = 0x37;
    /// Interrupt enable.
    pub const INT_ENABLE: u8 = 0x38;
    /// Interrupt status, bit 0 is data ready.
    pub const INT_STATUS: u8 = 0x3A;
    /// First data register, 14 bytes: accel, temperature, gyro.
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    /// Power management.
    pub const PWR_MGMT_1: u8 = 0x6B;
    /// Identity register.
    pub const WHO_AM_I: u8 = 0x75;

    /// Identity of the MPU-6050 in bits [6:1] of WHO_AM_I.
    pub const ID_MPU6050: u8 = 0x34;
    /// Identity of the MPU-6500 in bits [6:1] of WHO_AM_I.
    pub const ID_MPU6500: u8 = 0x38;

    /// PWR_MGMT_1: PLL with X gyro reference.
    pub const CLOCK_PLL_XGYRO: u8 = 0x01;
    /// PWR_MGMT_1 sleep bit.
    pub const SLEEP_BIT: u8 = 1 << 6;
    /// CONFIG: 5 Hz low-pass filter.
    pub const DLPF_5HZ: u8 = 0x06;
    /// SMPLRT_DIV value giving 50 Hz at a 1 kHz internal rate.
    pub const RATE_DIVIDER: u8 = 17;
    /// INT_PIN_CFG: active low, open drain.
    pub const INT_ACTIVE_LOW_OPEN_DRAIN: u8 = 0xC0;
    /// INT_ENABLE: data ready interrupt.
    pub const INT_DATA_READY: u8 = 0x01;

    /// Temperature scale (LSB per °C).
    pub const TEMP_LSB_PER_C: f64 = 340.0;
    /// Temperature offset (°C).
    pub const TEMP_OFFSET_C: f64 = 36.53;

    /// Raw accel counts represented by one accel offset LSB.
    pub const ACCEL_OFFSET_SCALE: i32 = 8;
    /// Raw gyro counts represented by one gyro offset LSB.
    pub const GYRO_OFFSET_SCALE: i32 = 4;
}

/// FIFO-capable 6-axis IMU (ICM-42670-P).
pub mod icm {
    /// Signal path reset, nonzero once the device is out of reset.
    pub const MCLK_RDY: u8 = 0x00;
    /// First data register in register mode, 14 bytes: temperature, accel, gyro.
    pub const TEMP_DATA1: u8 = 0x09;
    /// Power management: sensor modes.
    pub const PWR_MGMT0: u8 = 0x1F;
    /// Gyro configuration 0.
    pub const GYRO_CONFIG0: u8 = 0x20;
    /// FIFO configuration 1.
    pub const FIFO_CONFIG1: u8 = 0x28;
    /// FIFO watermark, low byte.
    pub const FIFO_CONFIG2: u8 = 0x29;
    /// FIFO watermark, high byte.
    pub const FIFO_CONFIG3: u8 = 0x2A;
    /// Interface configuration 0.
    pub const INTF_CONFIG0: u8 = 0x35;
    /// Interrupt status data ready, bit 0.
    pub const INT_STATUS_DRDY: u8 = 0x39;
    /// FIFO byte count, big-endian.
    pub const FIFO_COUNTH: u8 = 0x3D;
    /// FIFO data port.
    pub const FIFO_DATA: u8 = 0x3F;
    /// Bank select for indirect MREG1 writes.
    pub const BLK_SEL_W: u8 = 0x79;
    /// Address for indirect MREG1 writes.
    pub const MADDR_W: u8 = 0x7A;
    /// Data for indirect MREG1 writes.
    pub const M_W: u8 = 0x7B;
    /// Bank select for indirect MREG1 reads.
    pub const BLK_SEL_R: u8 = 0x7C;
    /// Address for indirect MREG1 reads.
    pub const MADDR_R: u8 = 0x7D;
    /// Data for indirect MREG1 reads.
    pub const M_R: u8 = 0x7E;
    /// Identity register.
    pub const WHO_AM_I: u8 = 0x75;

    /// Identity of the ICM-42670-P.
    pub const ID_ICM42670P: u8 = 0x67;

    /// MREG1: FIFO configuration 5.
    pub const MREG_FIFO_CONFIG5: u8 = 0x01;
    /// MREG1: APEX configuration.
    pub const MREG_TMST_CONFIG1: u8 = 0x06;
    /// MREG1: FIFO decimation.
    pub const MREG_FDR_CONFIG: u8 = 0x66;

    /// PWR_MGMT0: accel and gyro in low-noise mode.
    pub const SENSORS_ON: u8 = 0x0F;
    /// PWR_MGMT0: accel and gyro off.
    pub const SENSORS_OFF: u8 = 0x00;
    /// PWR_MGMT0: idle, oscillator kept on.
    pub const IDLE: u8 = 0x10;
    /// TMST_CONFIG1: APEX and timestamp off.
    pub const APEX_DISABLE: u8 = 0x40;
    /// FIFO_CONFIG5: accel and gyro into FIFO.
    pub const FIFO_ACCEL_GYRO: u8 = 0x03;
    /// Watermark disabled.
    pub const WATERMARK_OFF: u8 = 0xFF;
    /// INTF_CONFIG0: FIFO count in records, big-endian.
    pub const INTF_FIFO_RECORDS: u8 = 0x70;
    /// FIFO_CONFIG1: stream mode, FIFO not bypassed.
    pub const FIFO_STREAM: u8 = 0x00;

    /// GYRO_CONFIG0..ACCEL_CONFIG1 for FIFO mode: 12.5 Hz output rate.
    pub const FIFO_MODE_CONFIG: [u8; 5] = [0x6C, 0x6C, 0x70, 0x37, 0x47];
    /// GYRO_CONFIG0..ACCEL_CONFIG1 for register mode: 50 Hz output rate.
    pub const REGISTER_MODE_CONFIG: [u8; 5] = [0x66, 0x66, 0x70, 0x37, 0x47];

    /// FIFO packet size (bytes).
    pub const PACKET_SIZE: usize = 16;
    /// Header mask of a valid accel + gyro packet.
    pub const PACKET_HEADER_MASK: u8 = 0xFC;
    /// Header of a valid accel + gyro packet.
    pub const PACKET_HEADER: u8 = 0x68;
    /// Packets held by the hardware FIFO.
    pub const FIFO_PACKETS: usize = 138;
    /// Packets per bus transfer.
    pub const PACKETS_PER_CHUNK: usize = 8;
    /// Seconds of data the FIFO covers at the base output rate.
    pub const FIFO_WINDOW_S: i32 = 11;
    /// Largest decimation exponent the hardware supports.
    pub const MAX_DECIMATION_EXP: u32 = 8;
    /// Largest decimation register value.
    pub const MAX_DECIMATION_REG: u8 = 15;

    /// Register-mode temperature scale (LSB per °C).
    pub const TEMP_LSB_PER_C: f64 = 128.0;
    /// Temperature offset for both FIFO and register data (°C).
    pub const TEMP_OFFSET_C: f64 = 25.0;
    /// FIFO temperature scale (LSB per °C).
    pub const FIFO_TEMP_LSB_PER_C: f64 = 2.0;

    /// Wait after an indirect MREG1 access (microseconds).
    pub const MREG_ACCESS_US: u32 = 10;
}
