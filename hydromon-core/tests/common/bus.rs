//! Simulated I2C bus
//!
//! Devices are plain 256-byte register files with auto-increment. A register
//! can be marked as a FIFO port, where reads pop queued bytes instead, or as
//! stuck, where writes are dropped so write-and-verify never succeeds. The
//! ICM indirect MREG1 bank is modelled through its access registers.
//!
//! The bus is a cheap handle over shared state, so a test can keep one clone
//! while the backend owns the other.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

const MADDR_W: u8 = 0x7A;
const M_W: u8 = 0x7B;
const MADDR_R: u8 = 0x7D;
const M_R: u8 = 0x7E;

/// Bus failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// Nothing answered at the address
    NoAck,
}

impl embedded_hal::i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        match self {
            SimError::NoAck => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
        }
    }
}

/// One register-file device
#[derive(Debug, Clone)]
pub struct SimDevice {
    pub address: u8,
    pub regs: [u8; 256],
    pub mreg: Option<[u8; 256]>,
    pub fifo_port: Option<u8>,
    pub fifo: VecDeque<u8>,
    pub stuck: Vec<u8>,
    pub writes: Vec<(u8, u8)>,
}

impl SimDevice {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            regs: [0; 256],
            mreg: None,
            fifo_port: None,
            fifo: VecDeque::new(),
            stuck: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn set(&mut self, reg: u8, value: u8) -> &mut Self {
        self.regs[reg as usize] = value;
        self
    }

    pub fn set_i16(&mut self, reg: u8, value: i16) -> &mut Self {
        let [hi, lo] = value.to_be_bytes();
        self.regs[reg as usize] = hi;
        self.regs[reg as usize + 1] = lo;
        self
    }

    pub fn reg(&self, reg: u8) -> u8 {
        self.regs[reg as usize]
    }

    pub fn i16_at(&self, reg: u8) -> i16 {
        i16::from_be_bytes([self.regs[reg as usize], self.regs[reg as usize + 1]])
    }

    pub fn mreg(&self, reg: u8) -> u8 {
        self.mreg.map_or(0, |bank| bank[reg as usize])
    }

    fn write(&mut self, reg: u8, value: u8) {
        self.writes.push((reg, value));
        if self.stuck.contains(&reg) {
            return;
        }
        if let (Some(bank), M_W) = (self.mreg.as_mut(), reg) {
            bank[self.regs[MADDR_W as usize] as usize] = value;
            return;
        }
        self.regs[reg as usize] = value;
    }

    fn read(&mut self, start: u8, buf: &mut [u8]) {
        if Some(start) == self.fifo_port {
            for b in buf.iter_mut() {
                *b = self.fifo.pop_front().unwrap_or(0);
            }
            return;
        }
        if let (Some(bank), M_R) = (self.mreg.as_ref(), start) {
            buf.fill(bank[self.regs[MADDR_R as usize] as usize]);
            return;
        }
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.regs[(start as usize + i) % 256];
        }
    }

    /// Writes to `reg` in order
    pub fn writes_to(&self, reg: u8) -> Vec<u8> {
        self.writes.iter().filter(|(r, _)| *r == reg).map(|(_, v)| *v).collect()
    }
}

#[derive(Debug, Default)]
struct SimState {
    devices: Vec<SimDevice>,
    transactions: usize,
}

/// Shared handle to the simulated bus
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    state: Rc<RefCell<SimState>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(device: SimDevice) -> Self {
        let bus = Self::new();
        bus.attach(device);
        bus
    }

    pub fn attach(&self, device: SimDevice) {
        self.state.borrow_mut().devices.push(device);
    }

    /// Inspect or modify the device at `address`
    pub fn device<R>(&self, address: u8, f: impl FnOnce(&mut SimDevice) -> R) -> R {
        let mut state = self.state.borrow_mut();
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.address == address)
            .expect("no device at address");
        f(device)
    }

    pub fn transactions(&self) -> usize {
        self.state.borrow().transactions
    }
}

impl ErrorType for SimBus {
    type Error = SimError;
}

impl I2c for SimBus {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), SimError> {
        let mut state = self.state.borrow_mut();
        state.transactions += 1;
        let device = state
            .devices
            .iter_mut()
            .find(|d| d.address == address)
            .ok_or(SimError::NoAck)?;

        let mut pointer = 0u8;
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    pointer = reg;
                    for (i, value) in data.iter().enumerate() {
                        device.write(reg.wrapping_add(i as u8), *value);
                    }
                }
                Operation::Read(buf) => device.read(pointer, buf),
            }
        }
        Ok(())
    }
}
