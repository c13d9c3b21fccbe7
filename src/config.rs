//! # Variometer configuration
//!
//! All tunables of the acquisition engine in one place. The defaults
//! reproduce a GY-63 breakout at full resolution; override individual
//! fields with struct update syntax:
//!
//! ```
//! use vario_ms5611::{Oversampling, VarioConfig};
//!
//! let config = VarioConfig {
//!     oversampling: Oversampling::HighRes,
//!     pressure_smoothing: 0.93,
//!     ..VarioConfig::DEFAULT
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::drivers::ms5611::{Oversampling, MS5611_ADDR};
use crate::error::Error;
use crate::middleware::filter::{validate_smoothing_factor, DEFAULT_SMOOTHING_FACTOR};

/// Configuration structure for one sensor instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarioConfig {
    /// 7-bit I2C address (0x77 with CSB low, 0x76 with CSB high)
    pub address: u8,

    /// ADC oversampling for every conversion
    pub oversampling: Oversampling,

    /// IIR factor for pressure, `[0, 1)`
    pub pressure_smoothing: f64,

    /// IIR factor for vertical speed, `[0, 1)`
    pub vertical_speed_smoothing: f64,

    /// Apply the low-temperature correction in `run()` cycles
    pub second_order_compensation: bool,

    /// Completed cycles before the sensor counts as thermally settled
    pub warm_up_runs: u32,

    /// Blocking pressure reads averaged for the startup reference
    pub startup_samples: u16,

    /// Budget for each blocking read during startup
    pub read_timeout_ms: u32,
}

impl VarioConfig {
    pub const DEFAULT: VarioConfig = VarioConfig {
        address: MS5611_ADDR,
        oversampling: Oversampling::UltraHighRes,
        pressure_smoothing: DEFAULT_SMOOTHING_FACTOR,
        vertical_speed_smoothing: DEFAULT_SMOOTHING_FACTOR,
        second_order_compensation: false,
        warm_up_runs: 100,
        startup_samples: 50,
        read_timeout_ms: 100,
    };

    pub fn validate(&self) -> Result<(), Error> {
        validate_smoothing_factor(self.pressure_smoothing)?;
        validate_smoothing_factor(self.vertical_speed_smoothing)?;
        if self.startup_samples == 0 {
            return Err(Error::InvalidConfig);
        }
        // A blocking read must at least outlast one conversion
        if self.read_timeout_ms <= self.oversampling.conversion_time_ms() {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for VarioConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = VarioConfig::default();
        assert_eq!(config.address, 0x77);
        assert_eq!(config.warm_up_runs, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_factor = VarioConfig { vertical_speed_smoothing: 1.0, ..VarioConfig::DEFAULT };
        assert_eq!(bad_factor.validate(), Err(Error::InvalidSmoothingFactor));

        let no_samples = VarioConfig { startup_samples: 0, ..VarioConfig::DEFAULT };
        assert_eq!(no_samples.validate(), Err(Error::InvalidConfig));

        let short_timeout = VarioConfig { read_timeout_ms: 10, ..VarioConfig::DEFAULT };
        assert_eq!(short_timeout.validate(), Err(Error::InvalidConfig));
    }
}
