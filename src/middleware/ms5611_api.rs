//! Variometer session for the MS5611
//!
//! Owns the bus, the clock and all acquisition state of one sensor. Two ways
//! to use it:
//!
//! - call [`Variometer::run`] on every pass of the main loop and read the
//!   prefetched values with the accessors (`smoothed_pressure`,
//!   `vertical_speed`, ...). `run` never waits.
//! - call the `read_*` helpers, which poll the same state machine with a
//!   1 ms idle wait until the requested conversion is in, or the timeout
//!   expires.
//!
//! Don't mix both styles in one loop; a blocking read steals the
//! conversions the loop expects.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use embedded_hal_nb::nb;

use crate::config::VarioConfig;
use crate::drivers::clock::Clock;
use crate::drivers::ms5611::{Conversion, Ms5611, Oversampling, RESET_DELAY_MS};
use crate::error::Error;
use crate::middleware::calibration::Calibration;
use crate::middleware::compensation::{compensate, compensate_pressure, compensate_temperature};
use crate::middleware::filter::{altitude, FilterChain, SEA_LEVEL_PRESSURE};
use crate::middleware::scheduler::{PendingRequest, Scheduler};

/// Idle wait between polls of the blocking helpers
const POLL_INTERVAL_MS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Startup burst inside `begin`
    Priming,
    /// Sensor still settling thermally; vertical speed suppressed
    WarmUp,
    Running,
}

/// Pressure acquisitions per second, over one-second windows
#[derive(Debug)]
struct ReadRate {
    count: u32,
    window_start_ms: u64,
    per_second: f32,
}

impl ReadRate {
    fn new(now_ms: u64) -> Self {
        Self { count: 0, window_start_ms: now_ms, per_second: 0.0 }
    }

    fn record(&mut self, now_ms: u64) {
        self.count += 1;
        let elapsed = now_ms.saturating_sub(self.window_start_ms);
        if elapsed >= 1000 {
            self.per_second = self.count as f32 * 1000.0 / elapsed as f32;
            self.count = 0;
            self.window_start_ms = now_ms;
        }
    }
}

/// Non-blocking barometric variometer on one MS5611
pub struct Variometer<I2C, C> {
    i2c: I2C,
    clock: C,
    driver: Ms5611,
    calibration: Calibration,
    scheduler: Scheduler,
    filter: FilterChain,
    second_order: bool,
    warm_up_runs: u32,
    phase: Phase,
    run_count: u32,
    raw_pressure: u32,
    raw_temperature: u32,
    /// Pa
    pressure: i32,
    /// centi-degrees Celsius
    temperature: i32,
    /// m above sea level
    reference_height: f64,
    read_rate: ReadRate,
}

impl<I2C, C> Variometer<I2C, C>
where
    I2C: I2c,
    C: Clock,
{
    /// Reset the sensor, load its calibration and capture the startup
    /// reference altitude from an averaged burst of blocking reads.
    ///
    /// Bus and calibration failures are returned here rather than showing up
    /// later as nonsense readings.
    pub fn begin<D: DelayNs>(mut i2c: I2C, clock: C, delay: &mut D, config: VarioConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut driver = Ms5611::new(config.address);
        info!("Initializing MS5611 at 0x{:02X}, {}", driver.address(), config.oversampling);

        driver.reset(&mut i2c).map_err(|e| {
            error!("MS5611 reset failed: {}", e);
            e
        })?;
        delay.delay_ms(RESET_DELAY_MS);

        let calibration = Calibration::load(&mut driver, &mut i2c)?;
        let now = clock.now_ms();

        let mut vario = Self {
            i2c,
            clock,
            driver,
            calibration,
            scheduler: Scheduler::new(config.oversampling),
            filter: FilterChain::new(config.pressure_smoothing, config.vertical_speed_smoothing)?,
            second_order: config.second_order_compensation,
            warm_up_runs: config.warm_up_runs,
            phase: Phase::Priming,
            run_count: 0,
            raw_pressure: 0,
            raw_temperature: 0,
            pressure: 0,
            temperature: 0,
            reference_height: 0.0,
            read_rate: ReadRate::new(now),
        };
        vario.prime(delay, config.startup_samples, config.read_timeout_ms)?;
        Ok(vario)
    }

    fn prime<D: DelayNs>(&mut self, delay: &mut D, samples: u16, timeout_ms: u32) -> Result<(), Error> {
        // Temperature first, so no pressure is ever compensated against D2 = 0
        self.read_raw_temperature(delay, timeout_ms)?;

        let mut sum = 0.0;
        for _ in 0..samples {
            sum += self.read_pressure(delay, true, timeout_ms)? as f64;
        }
        let average = sum / samples as f64;

        let raw_temperature = self.read_raw_temperature(delay, timeout_ms)?;
        self.temperature = compensate_temperature(raw_temperature, &self.calibration, true);

        let now = self.clock.now_ms();
        self.filter.seed(average, now);
        self.reference_height = altitude(average, SEA_LEVEL_PRESSURE);
        self.run_count = 0;
        self.phase = Phase::WarmUp;
        self.read_rate = ReadRate::new(now);

        info!(
            "MS5611 ready: {=f64} Pa, {=i32} cC, reference {=f64} m",
            average,
            self.temperature,
            self.reference_height
        );
        Ok(())
    }

    /// One step of the acquisition state machine.
    ///
    /// Returns `WouldBlock` while the running conversion is not due yet, and
    /// also when a conversion was collected but it is not the `requested`
    /// one. With `requested == None` any serviced step is `Ok`.
    pub fn service(&mut self, requested: Option<Conversion>) -> nb::Result<(), Error> {
        let now = self.clock.now_ms();
        if !self.scheduler.is_due(now) {
            return Err(nb::Error::WouldBlock);
        }

        let completed = self.scheduler.complete(&mut self.driver, &mut self.i2c).map_err(|e| {
            warn!("MS5611 ADC read failed: {}", e);
            e
        })?;
        if let Some(sample) = completed {
            match sample.conversion {
                Conversion::Pressure => {
                    self.raw_pressure = sample.value;
                    self.on_pressure(now);
                }
                // Cached; used by every pressure sample until the next one
                Conversion::Temperature => self.raw_temperature = sample.value,
            }
        }

        self.run_count = self.run_count.wrapping_add(1);
        if self.phase == Phase::WarmUp && self.run_count >= self.warm_up_runs {
            self.phase = Phase::Running;
            self.reference_height = altitude(self.filter.smoothed_pressure(), SEA_LEVEL_PRESSURE);
            info!(
                "MS5611 warm-up done after {=u32} runs, reference {=f64} m",
                self.run_count,
                self.reference_height
            );
        }

        let next = Scheduler::next_conversion(requested, self.run_count);
        self.scheduler.request(&mut self.driver, &mut self.i2c, next, now).map_err(|e| {
            warn!("MS5611 conversion trigger failed: {}", e);
            e
        })?;

        match requested {
            None => Ok(()),
            Some(wanted) if completed.map(|s| s.conversion) == Some(wanted) => Ok(()),
            Some(_) => Err(nb::Error::WouldBlock),
        }
    }

    /// Non-blocking acquisition; call from the main loop as often as possible
    pub fn run(&mut self) -> Result<(), Error> {
        match self.service(None) {
            Ok(()) | Err(nb::Error::WouldBlock) => Ok(()),
            Err(nb::Error::Other(e)) => Err(e),
        }
    }

    fn on_pressure(&mut self, now_ms: u64) {
        let sample = compensate(self.raw_pressure, self.raw_temperature, &self.calibration, self.second_order);
        self.temperature = sample.temperature;
        self.pressure = sample.pressure;
        self.filter.update(sample.pressure as f64, now_ms, self.phase != Phase::Running);
        self.read_rate.record(now_ms);
    }

    fn block_until<D: DelayNs>(&mut self, conversion: Conversion, delay: &mut D, timeout_ms: u32) -> Result<(), Error> {
        let start = self.clock.now_ms();
        loop {
            match self.service(Some(conversion)) {
                Ok(()) => return Ok(()),
                // ADC not ready; the conversion was dropped and gets re-triggered
                Err(nb::Error::Other(Error::NoData)) | Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(e)) => return Err(e),
            }
            if self.clock.now_ms().saturating_sub(start) >= timeout_ms as u64 {
                warn!("MS5611 {} read timed out after {=u32} ms", conversion, timeout_ms);
                return Err(Error::Timeout);
            }
            delay.delay_ms(POLL_INTERVAL_MS);
        }
    }

    /// Blocking read of a fresh D1
    pub fn read_raw_pressure<D: DelayNs>(&mut self, delay: &mut D, timeout_ms: u32) -> Result<u32, Error> {
        self.block_until(Conversion::Pressure, delay, timeout_ms)?;
        Ok(self.raw_pressure)
    }

    /// Blocking read of a fresh D2
    pub fn read_raw_temperature<D: DelayNs>(&mut self, delay: &mut D, timeout_ms: u32) -> Result<u32, Error> {
        self.block_until(Conversion::Temperature, delay, timeout_ms)?;
        Ok(self.raw_temperature)
    }

    /// Blocking pressure in Pa from a fresh D1/D2 pair. The timeout applies
    /// to each of the two conversions.
    pub fn read_pressure<D: DelayNs>(&mut self, delay: &mut D, second_order: bool, timeout_ms: u32) -> Result<i32, Error> {
        let d1 = self.read_raw_pressure(delay, timeout_ms)?;
        let d2 = self.read_raw_temperature(delay, timeout_ms)?;
        Ok(compensate_pressure(d1, d2, &self.calibration, second_order))
    }

    /// Blocking temperature in °C from a fresh D2
    pub fn read_temperature<D: DelayNs>(&mut self, delay: &mut D, second_order: bool, timeout_ms: u32) -> Result<f64, Error> {
        let d2 = self.read_raw_temperature(delay, timeout_ms)?;
        Ok(compensate_temperature(d2, &self.calibration, second_order) as f64 / 100.0)
    }

    /// Last D1
    pub fn raw_pressure(&self) -> u32 {
        self.raw_pressure
    }

    /// Last D2
    pub fn raw_temperature(&self) -> u32 {
        self.raw_temperature
    }

    /// Last compensated pressure, Pa
    pub fn pressure(&self) -> f64 {
        self.pressure as f64
    }

    /// IIR-smoothed pressure, Pa
    pub fn smoothed_pressure(&self) -> f64 {
        self.filter.smoothed_pressure()
    }

    /// Last compensated temperature, °C
    pub fn temperature(&self) -> f64 {
        self.temperature as f64 / 100.0
    }

    /// Smoothed vertical speed, cm/s (positive = climbing)
    pub fn vertical_speed(&self) -> f64 {
        self.filter.vertical_speed()
    }

    /// Altitude (m, sea-level referenced) captured at startup and again when
    /// warm-up ends
    pub fn reference_height(&self) -> f64 {
        self.reference_height
    }

    /// Completed service cycles since `begin`
    pub fn run_count(&self) -> u32 {
        self.run_count
    }

    pub fn is_warming_up(&self) -> bool {
        self.phase != Phase::Running
    }

    pub fn pending(&self) -> PendingRequest {
        self.scheduler.pending()
    }

    /// Pressure acquisitions per second over the last full second.
    /// Depends on the oversampling and on how often `run` is called.
    pub fn reads_per_second(&self) -> f32 {
        self.read_rate.per_second
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn oversampling(&self) -> Oversampling {
        self.scheduler.oversampling()
    }

    /// Takes effect with the next triggered conversion
    pub fn set_oversampling(&mut self, oversampling: Oversampling) {
        debug!("MS5611 oversampling -> {} ({=u16} samples)", oversampling, oversampling.samples());
        self.scheduler.set_oversampling(oversampling);
    }

    pub fn pressure_smoothing_factor(&self) -> f64 {
        self.filter.pressure_factor()
    }

    /// Near 1: heavier smoothing. Must be in `[0, 1)`.
    pub fn set_pressure_smoothing_factor(&mut self, factor: f64) -> Result<(), Error> {
        self.filter.set_pressure_factor(factor)
    }

    pub fn vertical_speed_smoothing_factor(&self) -> f64 {
        self.filter.vertical_speed_factor()
    }

    /// Near 1: heavier smoothing. Must be in `[0, 1)`.
    pub fn set_vertical_speed_smoothing_factor(&mut self, factor: f64) -> Result<(), Error> {
        self.filter.set_vertical_speed_factor(factor)
    }

    pub fn second_order_compensation(&self) -> bool {
        self.second_order
    }

    /// Second-order compensation for the values prefetched by `run`
    pub fn set_second_order_compensation(&mut self, enabled: bool) {
        self.second_order = enabled;
    }

    /// Altitude in m of `pressure` against `reference_pressure` (Pa)
    pub fn calc_altitude(&self, pressure: f64, reference_pressure: f64) -> f64 {
        altitude(pressure, reference_pressure)
    }

    /// Altitude in m of `pressure` above the reference height
    pub fn calc_rel_altitude(&self, pressure: f64) -> f64 {
        altitude(pressure, SEA_LEVEL_PRESSURE) - self.reference_height
    }

    /// Give back the bus and the clock
    pub fn release(self) -> (I2C, C) {
        (self.i2c, self.clock)
    }
}
