//! Test doubles: a scripted MS5611 on a fake I2C bus and a shared fake clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::drivers::clock::Clock;
use crate::drivers::ms5611::{commands, Conversion, MS5611_ADDR};

/// Coefficients C1..C6 from the datasheet sample calculation
pub const DATASHEET_PROM: [u16; 6] = [40127, 36924, 23317, 23282, 33464, 28312];
pub const DATASHEET_D1: u32 = 9_085_466;
pub const DATASHEET_D2: u32 = 8_569_150;

/// Datasheet maximum conversion time per OSR step (256 .. 4096), ns
const CONVERSION_NS: [u64; 5] = [600_000, 1_170_000, 2_280_000, 4_540_000, 9_040_000];

struct State {
    prom: [u16; 6],
    d1: u32,
    d2: u32,
    converting: Option<Conversion>,
    response: Vec<u8>,
    commands: Vec<u8>,
    completed: Vec<Conversion>,
    unresponsive: bool,
    /// ADC reads still to answer with 0
    not_ready: u32,
    /// When attached, an ADC read before the conversion time has elapsed returns 0
    clock: Option<FakeClock>,
    ready_at_ns: u64,
}

impl State {
    fn command(&mut self, cmd: u8) {
        self.commands.push(cmd);
        match cmd {
            commands::RESET => {
                self.converting = None;
                self.response.clear();
            }
            0x40..=0x48 => {
                self.converting = Some(Conversion::Pressure);
                self.start_timer(cmd);
            }
            0x50..=0x58 => {
                self.converting = Some(Conversion::Temperature);
                self.start_timer(cmd);
            }
            commands::ADC_READ => {
                let early = self.clock.as_ref().is_some_and(|c| c.now_ns() < self.ready_at_ns);
                if early || self.not_ready > 0 {
                    // Early read aborts the conversion and yields 0
                    self.not_ready = self.not_ready.saturating_sub(1);
                    self.converting = None;
                    self.response = vec![0; 3];
                    return;
                }
                let value = match self.converting.take() {
                    Some(Conversion::Pressure) => {
                        self.completed.push(Conversion::Pressure);
                        self.d1
                    }
                    Some(Conversion::Temperature) => {
                        self.completed.push(Conversion::Temperature);
                        self.d2
                    }
                    None => 0,
                };
                self.response = value.to_be_bytes()[1..].to_vec();
            }
            0xA0..=0xAE => {
                let word = if cmd >= commands::PROM_READ {
                    self.prom.get(((cmd - commands::PROM_READ) / 2) as usize).copied().unwrap_or(0)
                } else {
                    0
                };
                self.response = word.to_be_bytes().to_vec();
            }
            _ => {}
        }
    }

    fn start_timer(&mut self, cmd: u8) {
        if let Some(clock) = &self.clock {
            self.ready_at_ns = clock.now_ns() + CONVERSION_NS[((cmd & 0x0F) / 2) as usize];
        }
    }
}

/// Cloneable handle: tests keep one clone to script and inspect the device
/// while the driver owns another.
#[derive(Clone)]
pub struct FakeMs5611(Rc<RefCell<State>>);

impl FakeMs5611 {
    pub fn new(prom: [u16; 6], d1: u32, d2: u32) -> Self {
        Self(Rc::new(RefCell::new(State {
            prom,
            d1,
            d2,
            converting: None,
            response: Vec::new(),
            commands: Vec::new(),
            completed: Vec::new(),
            unresponsive: false,
            not_ready: 0,
            clock: None,
            ready_at_ns: 0,
        })))
    }

    pub fn datasheet() -> Self {
        Self::new(DATASHEET_PROM, DATASHEET_D1, DATASHEET_D2)
    }

    pub fn set_pressure(&self, d1: u32) {
        self.0.borrow_mut().d1 = d1;
    }

    pub fn set_temperature(&self, d2: u32) {
        self.0.borrow_mut().d2 = d2;
    }

    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.0.borrow_mut().unresponsive = unresponsive;
    }

    /// Answer the next `count` ADC reads with 0, as if read too early
    pub fn set_not_ready(&self, count: u32) {
        self.0.borrow_mut().not_ready = count;
    }

    /// Enforce datasheet conversion times against `clock`
    pub fn attach_clock(&self, clock: &FakeClock) {
        self.0.borrow_mut().clock = Some(clock.clone());
    }

    /// Every command byte written so far
    pub fn commands(&self) -> Vec<u8> {
        self.0.borrow().commands.clone()
    }

    /// Conversions whose result was read back, in order
    pub fn completed(&self) -> Vec<Conversion> {
        self.0.borrow().completed.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.0.borrow_mut();
        state.commands.clear();
        state.completed.clear();
    }
}

impl ErrorType for FakeMs5611 {
    type Error = ErrorKind;
}

impl I2c for FakeMs5611 {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.unresponsive || address != MS5611_ADDR {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        state.command(b);
                    }
                }
                Operation::Read(buf) => {
                    for (i, byte) in buf.iter_mut().enumerate() {
                        *byte = state.response.get(i).copied().unwrap_or(0);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Shared nanosecond counter; `FakeDelay` advances it, `Clock` reads it.
#[derive(Clone, Default)]
pub struct FakeClock(Rc<Cell<u64>>);

impl FakeClock {
    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }

    pub fn advance_us(&self, us: u64) {
        self.0.set(self.0.get() + us * 1000);
    }

    pub fn now_ns(&self) -> u64 {
        self.0.get()
    }

    pub fn delay(&self) -> FakeDelay {
        FakeDelay(self.clone())
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }
}

pub struct FakeDelay(FakeClock);

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        let clock = &self.0 .0;
        clock.set(clock.get() + ns as u64);
    }
}
