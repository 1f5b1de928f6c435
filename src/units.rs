//! Unit and coordinate conversions shared by the CSV log and the photo geotag.

use uom::si::f64::Length;
use uom::si::length::{foot, meter};

use crate::gps::LatLon;

const MPS_TO_MPH: f64 = 2.23694;
const METERS_TO_FEET: f64 = 3.28084;
/// Mean earth radius (IUGG), meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Convert decimal degrees to a (degrees, minutes, hundredths of seconds) triple.
///
/// The sign is dropped, hemispheres are carried by a separate reference letter.
/// Every component is truncated, never rounded, so the result matches the
/// `D/1,M/1,S/100` rational encoding used by EXIF GPS tags.
pub fn decimal_to_dms(degrees: f64) -> (u32, u32, u32) {
    let ddeg = degrees.abs();
    let whole = ddeg.trunc();
    let fractional_minutes = 60.0 * (ddeg - whole);
    let minutes = fractional_minutes.trunc();
    let seconds = (6000.0 * (fractional_minutes - minutes)).trunc();

    (whole as u32, minutes as u32, seconds as u32)
}

/// Parse a number, falling back to `default` for anything that is not a finite value.
///
/// `"NaN"` and `"inf"` parse as floats but are still rejected.
pub fn parse_numeric_or_default(s: &str, default: f64) -> f64 {
    match s.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => default,
    }
}

pub fn to_mph(meters_per_second: f64) -> f64 {
    round_to_tenth(meters_per_second * MPS_TO_MPH)
}

pub fn to_feet(meters: f64) -> f64 {
    round_to_tenth(meters * METERS_TO_FEET)
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    round_to_tenth(celsius * 9.0 / 5.0 + 32.0)
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Great-circle distance between two points, in feet.
///
/// (0, 0) is an ordinary point here even though it doubles as the session seed.
pub fn great_circle_feet(a: LatLon, b: LatLon) -> f64 {
    great_circle(a, b).get::<foot>()
}

pub fn great_circle(a: LatLon, b: LatLon) -> Length {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = lat_b - lat_a;
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    let central_angle = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());

    Length::new::<meter>(EARTH_RADIUS_M * central_angle)
}

/// Render a float the way the data log expects it: shortest round-trip form,
/// always with a decimal point.
pub fn format_decimal(value: f64) -> String {
    let rendered = value.to_string();
    if rendered.contains('.') || !value.is_finite() {
        rendered
    } else {
        format!("{rendered}.0")
    }
}
