//! Temperature and pressure compensation (MS5611-01BA03 datasheet, "Pressure
//! and temperature calculation" and "Second order temperature compensation").
//!
//! Everything is integer math in `i64`. The products `C * dT` and `D1 * SENS`
//! overflow 32 bits, and division truncates toward zero exactly like the
//! datasheet reference code, so results are bit-reproducible.
//!
//! Variable names follow the datasheet.

use crate::middleware::calibration::Calibration;

/// 20.00 °C in centi-degrees; below this the second-order terms kick in
pub const REFERENCE_TEMPERATURE: i32 = 2000;

/// -15.00 °C; below this the "very low temperature" terms are added
pub const VERY_LOW_TEMPERATURE: i32 = -1500;

/// Divisor of the second-order temperature term. `i32::MAX` rather than the
/// datasheet's 2^31; kept verbatim so readings match the reference instrument.
const T2_DIVISOR: i64 = i32::MAX as i64;

/// One compensated reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompensatedSample {
    /// Centi-degrees Celsius (2007 = 20.07 °C)
    pub temperature: i32,
    /// Pascals
    pub pressure: i32,
}

impl CompensatedSample {
    pub fn celsius(&self) -> f64 {
        self.temperature as f64 / 100.0
    }

    pub fn hectopascal(&self) -> f64 {
        self.pressure as f64 / 100.0
    }
}

/// dT = D2 - C5 * 2^8
fn delta_temperature(raw_temperature: u32, cal: &Calibration) -> i64 {
    raw_temperature as i64 - ((cal.reference_temperature() as i64) << 8)
}

/// TEMP = 2000 + dT * C6 / 2^23
fn first_order_temperature(dt: i64, cal: &Calibration) -> i32 {
    (REFERENCE_TEMPERATURE as i64 + dt * cal.temp_coef_temperature() as i64 / (1 << 23)) as i32
}

/// Compensated temperature in centi-degrees Celsius
pub fn compensate_temperature(raw_temperature: u32, cal: &Calibration, second_order: bool) -> i32 {
    let dt = delta_temperature(raw_temperature, cal);
    let temp = first_order_temperature(dt, cal);

    if second_order && temp < REFERENCE_TEMPERATURE {
        let t2 = dt * dt / T2_DIVISOR;
        return (temp as i64 - t2) as i32;
    }
    temp
}

/// Compensated pressure in pascals.
///
/// `raw_temperature` is whichever D2 was read last; the scheduler does not
/// re-convert temperature before every pressure sample.
pub fn compensate_pressure(raw_pressure: u32, raw_temperature: u32, cal: &Calibration, second_order: bool) -> i32 {
    let dt = delta_temperature(raw_temperature, cal);

    // OFF = C2 * 2^16 + (C4 * dT) / 2^7
    let mut off = ((cal.pressure_offset() as i64) << 16) + cal.temp_coef_pressure_offset() as i64 * dt / 128;
    // SENS = C1 * 2^15 + (C3 * dT) / 2^8
    let mut sens =
        ((cal.pressure_sensitivity() as i64) << 15) + cal.temp_coef_pressure_sensitivity() as i64 * dt / 256;

    if second_order {
        let temp = first_order_temperature(dt, cal) as i64;
        let mut off2 = 0i64;
        let mut sens2 = 0i64;

        if temp < REFERENCE_TEMPERATURE as i64 {
            let low = (temp - REFERENCE_TEMPERATURE as i64).pow(2);
            off2 = 5 * low / 2;
            sens2 = 5 * low / 4;

            if temp < VERY_LOW_TEMPERATURE as i64 {
                let very_low = (temp - VERY_LOW_TEMPERATURE as i64).pow(2);
                off2 += 7 * very_low;
                sens2 += 11 * very_low / 2;
            }
        }

        off -= off2;
        sens -= sens2;
    }

    // P = (D1 * SENS / 2^21 - OFF) / 2^15
    ((raw_pressure as i64 * sens / (1 << 21) - off) / (1 << 15)) as i32
}

/// Temperature and pressure from one D1/D2 pair
pub fn compensate(raw_pressure: u32, raw_temperature: u32, cal: &Calibration, second_order: bool) -> CompensatedSample {
    CompensatedSample {
        temperature: compensate_temperature(raw_temperature, cal, second_order),
        pressure: compensate_pressure(raw_pressure, raw_temperature, cal, second_order),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{DATASHEET_D1, DATASHEET_D2, DATASHEET_PROM};

    const CAL: Calibration = Calibration::from_coefficients(DATASHEET_PROM);

    // D2 values giving dT = -400_000 (about 6.5 °C) and dT = -1_500_000 (about -30.6 °C)
    const D2_COLD: u32 = 8_166_784;
    const D2_VERY_COLD: u32 = 7_066_784;

    #[test]
    fn test_datasheet_example() {
        let sample = compensate(DATASHEET_D1, DATASHEET_D2, &CAL, false);
        assert_eq!(sample.temperature, 2007);
        assert_eq!(sample.pressure, 100_009);
        assert!((sample.celsius() - 20.07).abs() < 1e-9);
        assert!((sample.hectopascal() - 1000.09).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        for &(d1, d2) in &[(DATASHEET_D1, DATASHEET_D2), (1, 1), (0xFF_FFFF, 0xFF_FFFF), (DATASHEET_D1, D2_COLD)] {
            for &second_order in &[false, true] {
                assert_eq!(compensate(d1, d2, &CAL, second_order), compensate(d1, d2, &CAL, second_order));
            }
        }
    }

    #[test]
    fn test_second_order_is_noop_above_20c() {
        assert_eq!(compensate(DATASHEET_D1, DATASHEET_D2, &CAL, true), compensate(DATASHEET_D1, DATASHEET_D2, &CAL, false));
    }

    #[test]
    fn test_second_order_low_temperature() {
        assert_eq!(compensate_temperature(D2_COLD, &CAL, false), 650);
        // T2 = 400000^2 / i32::MAX = 74
        assert_eq!(compensate_temperature(D2_COLD, &CAL, true), 576);

        assert_eq!(compensate_pressure(DATASHEET_D1, D2_COLD, &CAL, false), 97_397);
        assert_eq!(compensate_pressure(DATASHEET_D1, D2_COLD, &CAL, true), 97_235);
    }

    #[test]
    fn test_second_order_very_low_temperature() {
        assert_eq!(compensate_temperature(D2_VERY_COLD, &CAL, false), -3062);
        assert_eq!(compensate_temperature(D2_VERY_COLD, &CAL, true), -4109);

        assert_eq!(compensate_pressure(DATASHEET_D1, D2_VERY_COLD, &CAL, false), 90_256);
        assert_eq!(compensate_pressure(DATASHEET_D1, D2_VERY_COLD, &CAL, true), 86_724);
    }

    #[test]
    fn test_full_scale_inputs_do_not_overflow() {
        let max = Calibration::from_coefficients([u16::MAX; 6]);
        let _ = compensate(0xFF_FFFF, 0xFF_FFFF, &max, true);
        let _ = compensate(1, 1, &max, true);
    }
}
