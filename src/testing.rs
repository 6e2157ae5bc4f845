//! Recording fakes for unit tests.
//!
//! Each fake logs what the code under test did so assertions can check the
//! exact bus and pin traffic.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, I2c, Operation};

use crate::sensors::{AxisMask, MagTransport, REPLY_LEN, STATUS_NO_DATA, SensorSettings};

/// Status byte every healthy [`FakeTransport`] node reports.
pub const HEALTHY_STATUS: u8 = 0x03;

/// One observable action on the fake hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Pin { line: &'static str, high: bool },
    Configure { bank: usize, address: u8 },
    Start { bank: usize, address: u8 },
    Read { bank: usize, address: u8 },
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Delay that returns immediately.
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Output pin that appends every level change to an [`EventLog`].
pub struct RecordingPin {
    line: &'static str,
    log: EventLog,
    writes_left: Option<usize>,
}

impl RecordingPin {
    pub fn new(line: &'static str, log: &EventLog) -> Self {
        Self {
            line,
            log: log.clone(),
            writes_left: None,
        }
    }

    /// Pin whose writes start failing after `writes` successful ones.
    pub fn failing_after(line: &'static str, log: &EventLog, writes: usize) -> Self {
        Self {
            writes_left: Some(writes),
            ..Self::new(line, log)
        }
    }

    fn record(&mut self, high: bool) -> Result<(), digital::ErrorKind> {
        match self.writes_left {
            Some(0) => return Err(digital::ErrorKind::Other),
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        self.log.borrow_mut().push(Event::Pin {
            line: self.line,
            high,
        });
        Ok(())
    }
}

impl digital::ErrorType for RecordingPin {
    type Error = digital::ErrorKind;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.record(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.record(true)
    }
}

/// Transport that answers every node with a reply identifying the read.
///
/// A healthy reply is `[HEALTHY_STATUS, sequence, bank, address, mask, 0, ..]`
/// where `sequence` counts reads across all banks sharing the same counter.
pub struct FakeTransport {
    bank: usize,
    log: EventLog,
    sequence: Rc<Cell<u8>>,
    dead: Vec<u8>,
}

impl FakeTransport {
    pub fn new(bank: usize, log: &EventLog, sequence: &Rc<Cell<u8>>) -> Self {
        Self {
            bank,
            log: log.clone(),
            sequence: sequence.clone(),
            dead: Vec::new(),
        }
    }

    /// Make `address` stop answering on this bank.
    pub fn kill(mut self, address: u8) -> Self {
        self.dead.push(address);
        self
    }

    fn is_dead(&self, address: u8) -> bool {
        self.dead.contains(&address)
    }
}

impl MagTransport for FakeTransport {
    fn configure(&mut self, address: u8, _settings: &SensorSettings) -> u8 {
        self.log.borrow_mut().push(Event::Configure {
            bank: self.bank,
            address,
        });
        if self.is_dead(address) {
            STATUS_NO_DATA
        } else {
            HEALTHY_STATUS
        }
    }

    fn start_measurement(&mut self, address: u8, _mask: AxisMask) -> u8 {
        self.log.borrow_mut().push(Event::Start {
            bank: self.bank,
            address,
        });
        if self.is_dead(address) {
            STATUS_NO_DATA
        } else {
            HEALTHY_STATUS
        }
    }

    fn read_measurement(&mut self, address: u8, mask: AxisMask, reply: &mut [u8; REPLY_LEN]) -> u8 {
        self.log.borrow_mut().push(Event::Read {
            bank: self.bank,
            address,
        });
        let sequence = self.sequence.get();
        self.sequence.set(sequence.wrapping_add(1));

        reply.fill(0);
        if self.is_dead(address) {
            reply[0] = STATUS_NO_DATA;
            return STATUS_NO_DATA;
        }
        reply[..5].copy_from_slice(&[HEALTHY_STATUS, sequence, self.bank as u8, address, mask.bits()]);
        HEALTHY_STATUS
    }
}

/// I2C bus that records writes and serves queued read data.
pub struct FakeI2c {
    writes: Vec<(u8, Vec<u8>)>,
    replies: VecDeque<Vec<u8>>,
    failing: Vec<u8>,
}

impl FakeI2c {
    pub fn new() -> Self {
        Self {
            writes: Vec::new(),
            replies: VecDeque::new(),
            failing: Vec::new(),
        }
    }

    /// Data returned by the next read operation.
    pub fn queue_reply(&mut self, data: &[u8]) {
        self.replies.push_back(data.to_vec());
    }

    /// Every transaction to `address` is NACKed.
    pub fn fail_address(&mut self, address: u8) {
        self.failing.push(address);
    }

    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.writes.clone()
    }
}

impl i2c::ErrorType for FakeI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.failing.contains(&address) {
            return Err(i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(data) => self.writes.push((address, data.to_vec())),
                Operation::Read(buffer) => {
                    let data = self.replies.pop_front().unwrap_or_default();
                    let n = data.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&data[..n]);
                }
            }
        }
        Ok(())
    }
}
