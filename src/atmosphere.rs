//! Calibrated to true airspeed conversion
//!
//!  Compressible-flow relation under the International Standard Atmosphere,
//!  with the static air temperature extrapolated from a nearby station report.

/// Speed of sound at sea level in the ISA (m/s)
const A0: f64 = 340.3;
/// Standard acceleration due to gravity (m/s²)
const G: f64 = 9.80665;
/// ISA temperature lapse rate for the troposphere (K/m)
const L: f64 = 0.0065;
/// Molar mass of dry air (kg/mol)
const M: f64 = 0.0289644;
/// Universal gas constant (J/(mol·K))
const R: f64 = 8.31446261815324;
/// Static air temperature at sea level in the ISA (K)
const T0: f64 = 288.15;

const KNOTS_TO_MPS: f64 = 0.514444;
const MPS_TO_KNOTS: f64 = 1.94384;
const FEET_TO_METERS: f64 = 0.3048;
const CELSIUS_TO_KELVIN: f64 = 273.15;

/// Convert calibrated airspeed to true airspeed.
///
/// `temp_c` and `elevation_m` describe the reporting station, `cas` is in
/// knots and `altitude` in feet. Returns knots, rounded to nearest.
pub fn cas_to_tas(temp_c: f64, elevation_m: f64, cas: i32, altitude: i32) -> i32 {
    let cas_mps = cas as f64 * KNOTS_TO_MPS;
    let h = altitude as f64 * FEET_TO_METERS;

    // Static air temperature at the aircraft, lapsed from the station
    let t = temp_c - L * (h - elevation_m) + CELSIUS_TO_KELVIN;

    let lh_div_t0 = (L * h) / T0;
    let neg_gm_div_rl = -((G * M) / (R * L));
    let cas_sq_div_5a0_sq = cas_mps.powf(2.0) / (5.0 * A0.powf(2.0));
    let seven_rt_div_m = (7.0 * R * t) / M;

    let expr0 = (cas_sq_div_5a0_sq + 1.0).powf(7.0 / 2.0) - 1.0;
    let expr1 = (1.0 - lh_div_t0).powf(neg_gm_div_rl);
    let expr2 = expr0 * expr1 + 1.0;
    let expr3 = expr2.powf(2.0 / 7.0) - 1.0;
    let tas_mps = (seven_rt_div_m * expr3).sqrt();

    (tas_mps * MPS_TO_KNOTS + 0.5) as i32
}
