//! Acquisition scheduler
//!
//! The MS5611 converts one quantity at a time: trigger, wait the
//! oversampling-dependent conversion time, read the ADC. The scheduler owns
//! that cycle without ever blocking. Each call either finds the pending
//! conversion not due yet, or collects its result and immediately triggers
//! the next one, so the ADC is kept busy as long as the caller polls often
//! enough.
//!
//! Pressure and temperature alternate by default. Pressure compensation uses
//! the most recent temperature, which can be a cycle or more old. Temperature
//! drifts slowly, and re-converting it before every pressure sample would
//! halve the pressure rate.

use core::mem;

use embedded_hal::i2c::I2c;

use crate::drivers::ms5611::{Conversion, Ms5611, Oversampling};
use crate::error::Error;

/// Conversion currently running on the device. At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingRequest {
    #[default]
    None,
    Pressure,
    Temperature,
}

impl PendingRequest {
    pub fn conversion(self) -> Option<Conversion> {
        match self {
            PendingRequest::None => None,
            PendingRequest::Pressure => Some(Conversion::Pressure),
            PendingRequest::Temperature => Some(Conversion::Temperature),
        }
    }
}

impl From<Conversion> for PendingRequest {
    fn from(conversion: Conversion) -> Self {
        match conversion {
            Conversion::Pressure => PendingRequest::Pressure,
            Conversion::Temperature => PendingRequest::Temperature,
        }
    }
}

/// A 24-bit ADC result tagged with what it measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub conversion: Conversion,
    pub value: u32,
}

#[derive(Debug)]
pub struct Scheduler {
    pending: PendingRequest,
    /// Earliest time the pending result may be read
    ready_at_ms: u64,
    oversampling: Oversampling,
}

impl Scheduler {
    pub fn new(oversampling: Oversampling) -> Self {
        Self {
            pending: PendingRequest::None,
            ready_at_ms: 0,
            oversampling,
        }
    }

    pub fn pending(&self) -> PendingRequest {
        self.pending
    }

    pub fn oversampling(&self) -> Oversampling {
        self.oversampling
    }

    /// Takes effect with the next triggered conversion
    pub fn set_oversampling(&mut self, oversampling: Oversampling) {
        self.oversampling = oversampling;
    }

    /// True when nothing is pending or the conversion delay has elapsed.
    ///
    /// Strictly later than `ready_at_ms`: the trigger may have landed late in
    /// its millisecond, so one whole extra tick is needed to cover the full
    /// conversion time.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.pending == PendingRequest::None || now_ms > self.ready_at_ms
    }

    /// Conversion deadline; `complete` is safe strictly after it
    pub fn ready_at_ms(&self) -> u64 {
        self.ready_at_ms
    }

    /// Read back the pending conversion, if any. The pending slot is cleared
    /// even when the read fails, so the next request starts clean.
    pub fn complete<I2C, E>(&mut self, driver: &mut Ms5611, i2c: &mut I2C) -> Result<Option<RawSample>, Error>
    where
        I2C: I2c<Error = E>,
    {
        let Some(conversion) = mem::take(&mut self.pending).conversion() else {
            return Ok(None);
        };
        let value = driver.read_adc(i2c)?;
        Ok(Some(RawSample { conversion, value }))
    }

    /// What to convert next: the caller's explicit choice, else alternate on
    /// run-count parity (even: temperature, odd: pressure).
    pub fn next_conversion(requested: Option<Conversion>, run_count: u32) -> Conversion {
        match requested {
            Some(conversion) => conversion,
            None if run_count % 2 == 0 => Conversion::Temperature,
            None => Conversion::Pressure,
        }
    }

    /// Trigger a conversion without waiting for it
    pub fn request<I2C, E>(
        &mut self,
        driver: &mut Ms5611,
        i2c: &mut I2C,
        conversion: Conversion,
        now_ms: u64,
    ) -> Result<(), Error>
    where
        I2C: I2c<Error = E>,
    {
        debug_assert_eq!(self.pending, PendingRequest::None);
        driver.start_conversion(i2c, conversion, self.oversampling)?;
        self.pending = conversion.into();
        self.ready_at_ms = now_ms + self.oversampling.conversion_time_ms() as u64;
        trace!("MS5611 triggered {} ready at {=u64}", conversion, self.ready_at_ms);
        Ok(())
    }
}
