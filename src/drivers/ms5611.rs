//! MS5611 Barometric Pressure & Temperature Sensor Driver
//!
//! Raw register-level access: reset, PROM reads, conversion triggers and ADC
//! reads. No timing is done here; the scheduler decides when a conversion
//! result may be read, and the compensation math lives in `middleware`.
//!
//! Based on the MS5611-01BA03 datasheet:
//! - I2C address: 0x77 (CSB low) or 0x76 (CSB high)
//! - Reset: send 0x1E then wait >2.8ms
//! - Start D1 conversion: 0x40 + OSR offset
//! - Start D2 conversion: 0x50 + OSR offset
//! - Read ADC: command 0x00 returns 24‑bit big‑endian result
//! - PROM: 0xA2..0xAC hold the six calibration words C1..C6
//!
//! Reading the ADC before the conversion has finished returns 0.

use embedded_hal::i2c::I2c;

use crate::error::Error;

pub const MS5611_ADDR: u8 = 0x77; // Default (CSB low)
pub const MS5611_ADDR_ALT: u8 = 0x76; // Alternate (CSB high)

/// Wait after a reset command before the PROM can be read
pub const RESET_DELAY_MS: u32 = 3;

/// Register/commands
pub mod commands {
    pub const RESET: u8 = 0x1E;
    pub const CONVERT_D1: u8 = 0x40; // Pressure conversion, + OSR offset
    pub const CONVERT_D2: u8 = 0x50; // Temperature conversion, + OSR offset
    pub const ADC_READ: u8 = 0x00;
    pub const PROM_READ: u8 = 0xA2; // C1; C2..C6 follow at +2 steps
}

/// Number of calibration words exposed by the PROM
pub const PROM_WORDS: u8 = 6;

/// Internal oversampling ratio of the ADC.
///
/// Higher ratios reduce noise and take longer to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    /// 256 samples
    UltraLowPower,
    /// 512 samples
    LowPower,
    /// 1024 samples
    Standard,
    /// 2048 samples
    HighRes,
    /// 4096 samples
    #[default]
    UltraHighRes,
}

impl Oversampling {
    pub const ALL: [Oversampling; 5] = [
        Oversampling::UltraLowPower,
        Oversampling::LowPower,
        Oversampling::Standard,
        Oversampling::HighRes,
        Oversampling::UltraHighRes,
    ];

    /// Offset added to the conversion command
    pub const fn command_offset(self) -> u8 {
        match self {
            Oversampling::UltraLowPower => 0x00,
            Oversampling::LowPower => 0x02,
            Oversampling::Standard => 0x04,
            Oversampling::HighRes => 0x06,
            Oversampling::UltraHighRes => 0x08,
        }
    }

    /// Minimum time in whole milliseconds before the result can be read
    /// (datasheet max: 0.60 / 1.17 / 2.28 / 4.54 / 9.04 ms)
    pub const fn conversion_time_ms(self) -> u32 {
        match self {
            Oversampling::UltraLowPower => 1,
            Oversampling::LowPower => 2,
            Oversampling::Standard => 3,
            Oversampling::HighRes => 5,
            Oversampling::UltraHighRes => 10,
        }
    }

    pub const fn samples(self) -> u16 {
        match self {
            Oversampling::UltraLowPower => 256,
            Oversampling::LowPower => 512,
            Oversampling::Standard => 1024,
            Oversampling::HighRes => 2048,
            Oversampling::UltraHighRes => 4096,
        }
    }
}

/// The two physical quantities the ADC can convert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Conversion {
    /// D1
    Pressure,
    /// D2
    Temperature,
}

impl Conversion {
    /// Full trigger command for this conversion at the given oversampling
    pub const fn command(self, osr: Oversampling) -> u8 {
        let base = match self {
            Conversion::Pressure => commands::CONVERT_D1,
            Conversion::Temperature => commands::CONVERT_D2,
        };
        base + osr.command_offset()
    }
}

/// MS5611 driver (bus passed per call)
#[derive(Debug)]
pub struct Ms5611 {
    address: u8,
}

impl Ms5611 {
    /// Create a new driver instance
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Issue the reset sequence. The caller must wait `RESET_DELAY_MS`.
    pub fn reset<I2C, E>(&mut self, i2c: &mut I2C) -> Result<(), Error>
    where
        I2C: I2c<Error = E>,
    {
        i2c.write(self.address, &[commands::RESET]).map_err(|_| Error::WriteFailed)
    }

    /// Read a 16-bit calibration PROM coefficient (index 0..6 maps to addresses 0xA2..0xAC)
    pub fn read_prom<I2C, E>(&mut self, i2c: &mut I2C, index: u8) -> Result<u16, Error>
    where
        I2C: I2c<Error = E>,
    {
        if index >= PROM_WORDS {
            return Err(Error::ReadFailed);
        }
        let addr = commands::PROM_READ + (index * 2);
        let mut buf = [0u8; 2];
        i2c.write_read(self.address, &[addr], &mut buf).map_err(|_| Error::ReadFailed)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Trigger a conversion and return immediately
    pub fn start_conversion<I2C, E>(
        &mut self,
        i2c: &mut I2C,
        conversion: Conversion,
        osr: Oversampling,
    ) -> Result<(), Error>
    where
        I2C: I2c<Error = E>,
    {
        i2c.write(self.address, &[conversion.command(osr)]).map_err(|_| Error::WriteFailed)
    }

    /// Read the 24-bit result of the last conversion
    pub fn read_adc<I2C, E>(&mut self, i2c: &mut I2C) -> Result<u32, Error>
    where
        I2C: I2c<Error = E>,
    {
        let mut buffer = [0u8; 3];
        i2c.write_read(self.address, &[commands::ADC_READ], &mut buffer)
            .map_err(|_| Error::ReadFailed)?;

        let value = ((buffer[0] as u32) << 16) | ((buffer[1] as u32) << 8) | (buffer[2] as u32);
        if value == 0 {
            return Err(Error::NoData);
        }
        Ok(value)
    }
}
