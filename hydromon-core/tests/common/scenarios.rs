//! Ready-made devices for integration tests
//!
//! Register addresses come from the crate's own register map so a scenario and
//! the backend under test agree on the layout.

use hydromon_core::constants::sensors::{icm, mpu, ADDRESS_PRIMARY};

use super::bus::SimDevice;

/// Raw counts for 1 g
pub const ONE_G: i16 = 16384;

/// Counts on Y and Z giving a 45° tilt
pub const TILT_45: i16 = 11585;

/// Polled IMU with data ready set and a fixed reading
pub fn mpu6050(address: u8, accel: [i16; 3], gyro: [i16; 3], temp_raw: i16) -> SimDevice {
    let mut dev = SimDevice::new(address);
    dev.set(mpu::WHO_AM_I, 0x68).set(mpu::INT_STATUS, mpu::INT_DATA_READY);
    set_mpu_reading(&mut dev, accel, gyro, temp_raw);
    dev
}

/// Overwrite the data registers of a polled IMU
pub fn set_mpu_reading(dev: &mut SimDevice, accel: [i16; 3], gyro: [i16; 3], temp_raw: i16) {
    let base = mpu::ACCEL_XOUT_H;
    for (i, v) in accel.iter().enumerate() {
        dev.set_i16(base + 2 * i as u8, *v);
    }
    dev.set_i16(base + 6, temp_raw);
    for (i, v) in gyro.iter().enumerate() {
        dev.set_i16(base + 8 + 2 * i as u8, *v);
    }
}

/// Upright, still MPU-6050 at the primary address reading 36.53 °C
pub fn upright_mpu() -> SimDevice {
    mpu6050(ADDRESS_PRIMARY, [0, ONE_G, 0], [3, -2, 1], 0)
}

/// FIFO IMU out of reset with an empty FIFO
pub fn icm42670(address: u8) -> SimDevice {
    let mut dev = SimDevice::new(address);
    dev.set(icm::WHO_AM_I, icm::ID_ICM42670P).set(icm::MCLK_RDY, 0x01);
    dev.mreg = Some([0; 256]);
    dev.fifo_port = Some(icm::FIFO_DATA);
    dev
}

/// One accel + gyro FIFO packet
pub fn fifo_packet(accel: [i16; 3], gyro: [i16; 3], temp: i8) -> [u8; 16] {
    let mut packet = [0u8; 16];
    packet[0] = icm::PACKET_HEADER;
    for (i, v) in accel.iter().enumerate() {
        packet[1 + 2 * i..3 + 2 * i].copy_from_slice(&v.to_be_bytes());
    }
    for (i, v) in gyro.iter().enumerate() {
        packet[7 + 2 * i..9 + 2 * i].copy_from_slice(&v.to_be_bytes());
    }
    packet[13] = temp as u8;
    packet
}

/// Queue packets and update the FIFO record count
pub fn queue_packets(dev: &mut SimDevice, packets: &[[u8; 16]]) {
    for p in packets {
        dev.fifo.extend(p.iter().copied());
    }
    let queued = (dev.fifo.len() / 16) as u16;
    let [hi, lo] = queued.to_be_bytes();
    dev.set(icm::FIFO_COUNTH, hi).set(icm::FIFO_COUNTH + 1, lo);
}
