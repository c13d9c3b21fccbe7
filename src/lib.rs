//! # MS5611 variometer
//!
//! Barometric variometer engine for the MS5611-01BA03 pressure sensor on any
//! `embedded-hal` 1.0 I2C bus.
//!
//! - [`drivers`]: command-level access to the sensor and the [`Clock`] seam
//! - [`middleware`]: calibration, compensation, the non-blocking acquisition
//!   scheduler, the IIR filter chain and the [`Variometer`] session tying them
//!   together
//! - [`config`]: [`VarioConfig`] tunables
//!
//! ```ignore
//! let mut vario = Variometer::begin(i2c, clock, &mut delay, VarioConfig::default())?;
//! loop {
//!     vario.run()?;
//!     let climb_cm_s = vario.vertical_speed();
//!     // ...
//! }
//! ```
//!
//! Enable the `defmt` feature for logging through `defmt`.

#![cfg_attr(not(test), no_std)]

// Must stay first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod config;
pub mod drivers;
pub mod error;
pub mod middleware;

#[cfg(test)]
mod mock;

pub use config::VarioConfig;
pub use drivers::clock::Clock;
pub use drivers::ms5611::{Conversion, Oversampling, MS5611_ADDR, MS5611_ADDR_ALT};
pub use error::Error;
pub use middleware::calibration::Calibration;
pub use middleware::compensation::CompensatedSample;
pub use middleware::filter::{altitude as calc_altitude, pressure_at_altitude, SEA_LEVEL_PRESSURE};
pub use middleware::ms5611_api::Variometer;
pub use middleware::scheduler::PendingRequest;
