//! Factory calibration store
//!
//! Every MS5611 is calibrated at two temperatures and two pressures; the six
//! resulting coefficients live in PROM and are read once at startup. After
//! loading they are never written again.

use embedded_hal::i2c::I2c;

use crate::drivers::ms5611::{Ms5611, PROM_WORDS};
use crate::error::Error;

/// The six PROM coefficients C1..C6 (indices 0..5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    coefficients: [u16; PROM_WORDS as usize],
}

impl Calibration {
    /// Build a store from already known coefficients
    pub const fn from_coefficients(coefficients: [u16; PROM_WORDS as usize]) -> Self {
        Self { coefficients }
    }

    /// Read C1..C6 in index order. No retries; the first bus failure is returned.
    pub fn load<I2C, E>(driver: &mut Ms5611, i2c: &mut I2C) -> Result<Self, Error>
    where
        I2C: I2c<Error = E>,
    {
        let mut coefficients = [0u16; PROM_WORDS as usize];
        for (index, slot) in coefficients.iter_mut().enumerate() {
            *slot = driver.read_prom(i2c, index as u8)?;
        }

        // A floating bus reads back all ones, a held-down one all zeros
        if coefficients.iter().all(|&c| c == 0) || coefficients.iter().all(|&c| c == u16::MAX) {
            error!("MS5611 PROM unusable: {}", coefficients);
            return Err(Error::InvalidCalibration);
        }

        debug!("MS5611 PROM: {}", coefficients);
        Ok(Self { coefficients })
    }

    pub fn coefficients(&self) -> &[u16; PROM_WORDS as usize] {
        &self.coefficients
    }

    /// Coefficient by zero-based index (0 = C1)
    pub fn coefficient(&self, index: usize) -> Option<u16> {
        self.coefficients.get(index).copied()
    }

    /// C1, SENS_T1
    pub fn pressure_sensitivity(&self) -> u16 {
        self.coefficients[0]
    }

    /// C2, OFF_T1
    pub fn pressure_offset(&self) -> u16 {
        self.coefficients[1]
    }

    /// C3, TCS
    pub fn temp_coef_pressure_sensitivity(&self) -> u16 {
        self.coefficients[2]
    }

    /// C4, TCO
    pub fn temp_coef_pressure_offset(&self) -> u16 {
        self.coefficients[3]
    }

    /// C5, T_REF
    pub fn reference_temperature(&self) -> u16 {
        self.coefficients[4]
    }

    /// C6, TEMPSENS
    pub fn temp_coef_temperature(&self) -> u16 {
        self.coefficients[5]
    }
}
