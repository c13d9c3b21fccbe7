//! Driver errors
//!
//! Bus failures are reported as soon as the transport reports them. The
//! blocking helpers add `Timeout` on top, so a silent device surfaces as an
//! error instead of a hung instrument.

/// Errors produced by the driver and the acquisition engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The device did not accept a command (NACK or bus fault)
    WriteFailed,
    /// A register or ADC read did not complete
    ReadFailed,
    /// The ADC returned 0: the conversion result was not available
    NoData,
    /// The PROM image is unusable (all zeros or all ones)
    InvalidCalibration,
    /// A blocking read did not complete within its time budget
    Timeout,
    /// Smoothing factors must lie in `[0, 1)`
    InvalidSmoothingFactor,
    /// Rejected configuration value
    InvalidConfig,
}

// Implement defmt::Format manually (avoid pulling in derive macros)
#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::WriteFailed => defmt::write!(f, "WriteFailed"),
            Error::ReadFailed => defmt::write!(f, "ReadFailed"),
            Error::NoData => defmt::write!(f, "NoData"),
            Error::InvalidCalibration => defmt::write!(f, "InvalidCalibration"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::InvalidSmoothingFactor => defmt::write!(f, "InvalidSmoothingFactor"),
            Error::InvalidConfig => defmt::write!(f, "InvalidConfig"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::WriteFailed => "bus write failed",
            Error::ReadFailed => "bus read failed",
            Error::NoData => "conversion result not available",
            Error::InvalidCalibration => "invalid calibration PROM",
            Error::Timeout => "device did not respond in time",
            Error::InvalidSmoothingFactor => "smoothing factor outside [0, 1)",
            Error::InvalidConfig => "invalid configuration",
        };
        f.write_str(msg)
    }
}
