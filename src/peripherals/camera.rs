use std::{
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    GpsLoggerError,
    gps::{GpsFix, SkyView},
    units::decimal_to_dms,
};

/// GPS EXIF values burned into each photo, already rendered as EXIF rationals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Geotag {
    pub latitude: String,
    pub latitude_ref: char,
    pub longitude: String,
    pub longitude_ref: char,
    /// Centimeters over 100
    pub altitude: String,
    pub altitude_ref: String,
    /// Millimeters per second over 1000
    pub speed: String,
    pub speed_ref: char,
    pub satellites: String,
    /// UTC time of day
    pub timestamp: String,
    /// UTC date
    pub datestamp: String,
}

fn dms_rational(degrees: f64) -> String {
    let (d, m, s) = decimal_to_dms(degrees);
    format!("{d}/1,{m}/1,{s}/100")
}

impl Geotag {
    pub fn new(fix: &GpsFix, sky: SkyView) -> Self {
        Self {
            latitude: dms_rational(fix.position.lat),
            latitude_ref: fix.position.lat_ref(),
            longitude: dms_rational(fix.position.lon),
            longitude_ref: fix.position.lon_ref(),
            altitude: format!("{}/100", (100.0 * fix.alt_m).trunc() as i64),
            // below sea level is never reported
            altitude_ref: "0".to_string(),
            speed: format!("{}/1000", (1000.0 * fix.speed_mps).trunc() as i64),
            speed_ref: 'M',
            satellites: sky.satellites.to_string(),
            timestamp: fix.timestamp.strftime("%H/1,%M/1,%S/1").to_string(),
            datestamp: fix.timestamp.strftime("%Y:%m:%d").to_string(),
        }
    }

    /// Tag name and value pairs, in the order they are applied.
    pub fn tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("GPS.GPSLatitude", self.latitude.clone()),
            ("GPS.GPSLatitudeRef", self.latitude_ref.to_string()),
            ("GPS.GPSLongitude", self.longitude.clone()),
            ("GPS.GPSLongitudeRef", self.longitude_ref.to_string()),
            ("GPS.GPSAltitude", self.altitude.clone()),
            ("GPS.GPSAltitudeRef", self.altitude_ref.clone()),
            ("GPS.GPSSpeed", self.speed.clone()),
            ("GPS.GPSSpeedRef", self.speed_ref.to_string()),
            ("GPS.GPSSatellites", self.satellites.clone()),
            ("GPS.GPSTimeStamp", self.timestamp.clone()),
            ("GPS.GPSDateStamp", self.datestamp.clone()),
        ]
    }
}

pub trait PhotoCapturer {
    /// Take one photo, write it to `destination` and tag it. Blocks for the
    /// whole capture including sensor warm-up.
    fn capture(&mut self, destination: &Path, geotag: &Geotag) -> Result<(), GpsLoggerError>;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    pub command: String,
    pub width: u32,
    pub height: u32,
    /// Degrees, libcamera accepts 0 or 180
    pub rotation: u32,
    pub warmup_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: "libcamera-still".to_string(),
            width: 3280,
            height: 2464,
            rotation: 0,
            warmup_ms: 2000,
        }
    }
}

/// Captures stills by running `libcamera-still`, passing the geotag as `--exif` options.
pub struct LibcameraCapturer {
    config: CameraConfig,
}

impl LibcameraCapturer {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    fn command(&self, destination: &Path, geotag: &Geotag) -> Command {
        let warmup = Duration::from_millis(self.config.warmup_ms);
        let mut command = Command::new(&self.config.command);
        command
            .arg("--nopreview")
            .args(["--timeout", &warmup.as_millis().to_string()])
            .args(["--width", &self.config.width.to_string()])
            .args(["--height", &self.config.height.to_string()])
            .args(["--rotation", &self.config.rotation.to_string()])
            .arg("--output")
            .arg(destination);
        for (tag, value) in geotag.tags() {
            command.arg("--exif").arg(format!("{tag}={value}"));
        }
        command
    }
}

impl PhotoCapturer for LibcameraCapturer {
    fn capture(&mut self, destination: &Path, geotag: &Geotag) -> Result<(), GpsLoggerError> {
        let mut command = self.command(destination, geotag);
        debug!("Running {:?}", command);

        let output = command.output().map_err(|e| GpsLoggerError::CaptureSpawn {
            command: self.config.command.clone(),
            source: e,
        })?;
        if !output.status.success() {
            return Err(GpsLoggerError::CaptureFailure {
                path: PathBuf::from(destination),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        debug!("Captured {:?}", destination);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::{FixMode, LatLon};

    fn fix() -> GpsFix {
        GpsFix {
            position: LatLon::new(40.7128, -74.006),
            mode: FixMode::Fix3D,
            timestamp: "2024-01-05T07:08:09.500Z".parse().unwrap(),
            speed_mps: 10.5555,
            alt_m: 12.345,
        }
    }

    #[test]
    fn test_geotag_values() {
        let geotag = Geotag::new(&fix(), SkyView { satellites: 7 });

        assert_eq!(geotag.latitude, "40/1,42/1,4608/100");
        assert_eq!(geotag.latitude_ref, 'N');
        assert_eq!(geotag.longitude, "74/1,0/1,2160/100");
        assert_eq!(geotag.longitude_ref, 'W');
        assert_eq!(geotag.altitude, "1234/100");
        assert_eq!(geotag.altitude_ref, "0");
        assert_eq!(geotag.speed, "10555/1000");
        assert_eq!(geotag.speed_ref, 'M');
        assert_eq!(geotag.satellites, "7");
        assert_eq!(geotag.timestamp, "07/1,08/1,09/1");
        assert_eq!(geotag.datestamp, "2024:01:05");
    }

    #[test]
    fn test_geotag_below_sea_level_keeps_reference() {
        let mut fix = fix();
        fix.alt_m = -3.219;
        let geotag = Geotag::new(&fix, SkyView { satellites: 0 });
        assert_eq!(geotag.altitude, "-321/100");
        assert_eq!(geotag.altitude_ref, "0");
    }

    #[test]
    fn test_tags_order() {
        let geotag = Geotag::new(&fix(), SkyView { satellites: 7 });
        let names: Vec<&str> = geotag.tags().iter().map(|(name, _)| *name).collect();
        assert_eq!(names.first(), Some(&"GPS.GPSLatitude"));
        assert_eq!(names.last(), Some(&"GPS.GPSDateStamp"));
        assert_eq!(names.len(), 11);
    }

    #[test]
    fn test_command_arguments() {
        let capturer = LibcameraCapturer::new(CameraConfig::default());
        let geotag = Geotag::new(&fix(), SkyView { satellites: 7 });
        let command = capturer.command(Path::new("/tmp/a-1.jpg"), &geotag);

        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(command.get_program(), "libcamera-still");
        assert!(args.contains(&"/tmp/a-1.jpg".to_string()));
        assert!(args.contains(&"GPS.GPSLatitude=40/1,42/1,4608/100".to_string()));
        assert!(args.contains(&"GPS.GPSSpeedRef=M".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "--exif").count(), 11);
    }

    #[test]
    #[cfg(unix)]
    fn test_capture_failures() {
        let geotag = Geotag::new(&fix(), SkyView { satellites: 7 });

        let mut failing = LibcameraCapturer::new(CameraConfig {
            command: "false".to_string(),
            ..CameraConfig::default()
        });
        assert!(matches!(
            failing.capture(Path::new("x.jpg"), &geotag),
            Err(GpsLoggerError::CaptureFailure { .. })
        ));

        let mut missing = LibcameraCapturer::new(CameraConfig {
            command: "/nonexistent/libcamera-still".to_string(),
            ..CameraConfig::default()
        });
        assert!(matches!(
            missing.capture(Path::new("x.jpg"), &geotag),
            Err(GpsLoggerError::CaptureSpawn { .. })
        ));

        let mut succeeding = LibcameraCapturer::new(CameraConfig {
            command: "true".to_string(),
            ..CameraConfig::default()
        });
        assert!(succeeding.capture(Path::new("x.jpg"), &geotag).is_ok());
    }
}
