//! Pressure smoothing, barometric altitude and vertical speed.
//!
//! Both stages are single-pole IIR low-pass filters:
//!
//! ```text
//! y[i] = x[i] + β * (y[i-1] - x[i])
//! ```
//!
//! which is the usual `y[i-1] + α (x[i] - y[i-1])` with `α = 1 - β`. β near 1
//! smooths more and responds slower; β = 0 passes the input through.

use crate::error::Error;

/// ISA sea-level pressure, Pa
pub const SEA_LEVEL_PRESSURE: f64 = 101_325.0;

const ALTITUDE_SCALE_M: f64 = 44_330.0;
const BAROMETRIC_EXPONENT: f64 = 0.190_294_9;

pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.9;

/// Altitude in metres of `pressure` relative to `reference_pressure` (both Pa),
/// international barometric formula.
pub fn altitude(pressure: f64, reference_pressure: f64) -> f64 {
    ALTITUDE_SCALE_M * (1.0 - libm::pow(pressure / reference_pressure, BAROMETRIC_EXPONENT))
}

/// Inverse of [`altitude`]: the pressure observed at `altitude_m`.
pub fn pressure_at_altitude(altitude_m: f64, reference_pressure: f64) -> f64 {
    reference_pressure * libm::pow(1.0 - altitude_m / ALTITUDE_SCALE_M, 1.0 / BAROMETRIC_EXPONENT)
}

/// Accepts factors in `[0, 1)`. NaN is rejected by the range check.
pub fn validate_smoothing_factor(factor: f64) -> Result<f64, Error> {
    if (0.0..1.0).contains(&factor) {
        Ok(factor)
    } else {
        Err(Error::InvalidSmoothingFactor)
    }
}

/// Single-pole IIR low-pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iir {
    factor: f64,
    value: f64,
}

impl Iir {
    pub fn new(factor: f64, initial: f64) -> Result<Self, Error> {
        Ok(Self { factor: validate_smoothing_factor(factor)?, value: initial })
    }

    pub fn update(&mut self, input: f64) -> f64 {
        self.value = input + self.factor * (self.value - input);
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn reset(&mut self, value: f64) {
        self.value = value;
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: f64) -> Result<(), Error> {
        self.factor = validate_smoothing_factor(factor)?;
        Ok(())
    }
}

/// Pressure IIR, then altitude, then the derivative of altitude through a
/// second IIR. Fed once per completed pressure conversion.
#[derive(Debug, Clone)]
pub struct FilterChain {
    pressure: Iir,
    vertical_speed: Iir,
    /// cm, sea-level referenced
    last_altitude_cm: f64,
    last_time_ms: u64,
}

impl FilterChain {
    pub fn new(pressure_factor: f64, vertical_speed_factor: f64) -> Result<Self, Error> {
        Ok(Self {
            pressure: Iir::new(pressure_factor, SEA_LEVEL_PRESSURE)?,
            vertical_speed: Iir::new(vertical_speed_factor, 0.0)?,
            last_altitude_cm: 0.0,
            last_time_ms: 0,
        })
    }

    /// Restart from a known pressure with zero vertical speed
    pub fn seed(&mut self, pressure: f64, now_ms: u64) {
        self.pressure.reset(pressure);
        self.vertical_speed.reset(0.0);
        self.last_altitude_cm = altitude(pressure, SEA_LEVEL_PRESSURE) * 100.0;
        self.last_time_ms = now_ms;
    }

    /// Feed one compensated pressure sample.
    ///
    /// While `warming_up` the previous altitude is pinned to the current one,
    /// so the derivative is zero and thermal settling of the sensor does not
    /// show up as a climb.
    pub fn update(&mut self, pressure: f64, now_ms: u64, warming_up: bool) {
        let smoothed = self.pressure.update(pressure);
        let altitude_cm = altitude(smoothed, SEA_LEVEL_PRESSURE) * 100.0;
        if warming_up {
            self.last_altitude_cm = altitude_cm;
        }

        let dt_ms = now_ms.saturating_sub(self.last_time_ms);
        if dt_ms == 0 {
            // Same millisecond as the last sample; keep the old time base
            return;
        }

        let speed = (altitude_cm - self.last_altitude_cm) * 1000.0 / dt_ms as f64;
        self.vertical_speed.update(speed);
        self.last_altitude_cm = altitude_cm;
        self.last_time_ms = now_ms;
    }

    /// Pa
    pub fn smoothed_pressure(&self) -> f64 {
        self.pressure.value()
    }

    /// cm/s, positive when climbing
    pub fn vertical_speed(&self) -> f64 {
        self.vertical_speed.value()
    }

    pub fn pressure_factor(&self) -> f64 {
        self.pressure.factor()
    }

    pub fn set_pressure_factor(&mut self, factor: f64) -> Result<(), Error> {
        self.pressure.set_factor(factor)
    }

    pub fn vertical_speed_factor(&self) -> f64 {
        self.vertical_speed.factor()
    }

    pub fn set_vertical_speed_factor(&mut self, factor: f64) -> Result<(), Error> {
        self.vertical_speed.set_factor(factor)
    }
}
