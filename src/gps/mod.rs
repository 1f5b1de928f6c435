pub mod acquisition;
pub mod producer;

use jiff::Timestamp;
use serde::{Deserialize, Deserializer};

pub use acquisition::{AcquisitionSettings, acquire_fix};
pub use producer::{GpsReportProducer, GpsdReportProducer, MockReportProducer};

use crate::{GpsLoggerError, units::parse_numeric_or_default};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Seed position for a fresh session.
    pub const ORIGIN: LatLon = LatLon::new(0.0, 0.0);

    pub fn lat_ref(&self) -> char {
        if self.lat < 0.0 { 'S' } else { 'N' }
    }

    pub fn lon_ref(&self) -> char {
        if self.lon < 0.0 { 'W' } else { 'E' }
    }
}

/// NMEA mode as reported by gpsd in the TPV `mode` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixMode {
    Unknown,
    NoFix,
    Fix2D,
    Fix3D,
}

impl FixMode {
    pub fn from_gpsd_mode(mode: f64) -> Self {
        match mode as i64 {
            1 => FixMode::NoFix,
            2 => FixMode::Fix2D,
            3 => FixMode::Fix3D,
            _ => FixMode::Unknown,
        }
    }

    pub fn has_fix(&self) -> bool {
        matches!(self, FixMode::Fix2D | FixMode::Fix3D)
    }
}

/// One report from the gpsd JSON stream. Only the two classes the logger needs
/// are decoded, everything else (VERSION, DEVICES, WATCH, PPS, ...) is `Other`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "class")]
pub enum GpsReport {
    #[serde(rename = "TPV")]
    Position(TpvReport),
    #[serde(rename = "SKY")]
    SkyView(SkyReport),
    #[serde(other)]
    Other,
}

/// Time-position-velocity report.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TpvReport {
    #[serde(default, deserialize_with = "lenient_number")]
    pub mode: Option<f64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub alt: Option<f64>,
    #[serde(default, rename = "altMSL", deserialize_with = "lenient_number")]
    pub alt_msl: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub speed: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SkyReport {
    #[serde(default)]
    pub satellites: Option<Vec<serde_json::Value>>,
    #[serde(default, rename = "nSat", deserialize_with = "lenient_number")]
    pub n_sat: Option<f64>,
}

/// Accepts JSON numbers, numeric strings and junk alike. Junk and non-finite
/// values become 0.0 rather than failing the whole report.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.map(|value| match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        serde_json::Value::String(s) => parse_numeric_or_default(&s, 0.0),
        _ => 0.0,
    }))
}

impl TpvReport {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat.unwrap_or(0.0), self.lon.unwrap_or(0.0))
    }

    pub fn fix_mode(&self) -> FixMode {
        FixMode::from_gpsd_mode(self.mode.unwrap_or(0.0))
    }

    /// Build a fix from this report.
    ///
    /// Returns `Ok(None)` while latitude or longitude is still zero. Standing
    /// exactly on the equator or the prime meridian therefore never produces a fix.
    pub fn to_fix(&self) -> Result<Option<GpsFix>, GpsLoggerError> {
        let position = self.position();
        if position.lat == 0.0 || position.lon == 0.0 {
            return Ok(None);
        }

        let raw_time = self.time.clone().unwrap_or_default();
        let timestamp = raw_time
            .parse::<Timestamp>()
            .map_err(|_| GpsLoggerError::InvalidFixTime { value: raw_time })?;

        Ok(Some(GpsFix {
            position,
            mode: self.fix_mode(),
            timestamp,
            speed_mps: self.speed.unwrap_or(0.0),
            alt_m: self.alt.or(self.alt_msl).unwrap_or(0.0),
        }))
    }
}

impl SkyReport {
    /// Satellites in view, `None` when the report carries no count at all.
    pub fn satellite_count(&self) -> Option<u32> {
        match (&self.satellites, self.n_sat) {
            (Some(satellites), _) => Some(satellites.len() as u32),
            (None, Some(n_sat)) => Some(n_sat.max(0.0) as u32),
            (None, None) => None,
        }
    }
}

/// An accepted position report.
#[derive(Clone, Debug, PartialEq)]
pub struct GpsFix {
    pub position: LatLon,
    pub mode: FixMode,
    pub timestamp: Timestamp,
    /// Speed over ground, m/s
    pub speed_mps: f64,
    /// Altitude, meters
    pub alt_m: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkyView {
    pub satellites: u32,
}
