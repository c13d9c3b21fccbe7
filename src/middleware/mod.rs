//! Middleware module
//!
//! Acquisition and signal processing on top of the bus driver.

pub mod calibration;
pub mod compensation;
pub mod filter;
pub mod ms5611_api; // Variometer session
pub mod scheduler;
