//! Drivers module
//!
//! Bus-level access to the sensor and the time source the engine runs on.

pub mod clock;
pub mod ms5611;
