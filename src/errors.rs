// Error types for gpslogger

use snafu::Snafu;
use std::{io, path::PathBuf};

/// How the event loop should react to a failed logging attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Log it, cool down and try again.
    Recoverable,
    /// Stop the event loop.
    Fatal,
}

#[derive(Debug, Snafu)]
pub enum GpsLoggerError {
    // Errors for the gpsd client
    #[snafu(display("Unable to connect to gpsd at {address}"))]
    GpsdConnection { address: String, source: io::Error },
    #[snafu(display("Error reading from the gpsd stream"))]
    GpsStreamRead { source: io::Error },
    #[snafu(display("The gpsd stream was closed"))]
    GpsStreamClosed,
    #[snafu(display("Position report has an invalid timestamp: {value:?}"))]
    InvalidFixTime { value: String },

    // Errors for the temperature probe
    #[snafu(display("No temperature sensor found under {}", path.display()))]
    SensorUnavailable { path: PathBuf },
    #[snafu(display("Error reading temperature sensor {}", path.display()))]
    SensorRead { path: PathBuf, source: io::Error },
    #[snafu(display("Malformed temperature sensor output: {reason}"))]
    SensorMalformed { reason: String },

    // Errors for the camera
    #[snafu(display("Could not start photo capture command {command}"))]
    CaptureSpawn { command: String, source: io::Error },
    #[snafu(display("Photo capture failed for {}: {reason}", path.display()))]
    CaptureFailure { path: PathBuf, reason: String },

    // Errors for the GPIO trigger
    #[snafu(display("GPIO operation failed: {operation}"))]
    Gpio { operation: String, source: io::Error },

    // Errors for the data log
    #[snafu(display("Could not create output directory {}", path.display()))]
    OutputDirectory { path: PathBuf, source: io::Error },
    #[snafu(display("Error writing data log {}", path.display()))]
    WriterError { path: PathBuf, source: io::Error },
    #[snafu(display("Error writing CSV record to {}", path.display()))]
    CsvRecord { path: PathBuf, source: csv::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
    #[snafu(display("Unknown time zone {name}"))]
    UnknownTimeZone { name: String, source: jiff::Error },

    #[snafu(display("Shutdown requested"))]
    ShutdownRequested,
}

impl GpsLoggerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GpsLoggerError::ShutdownRequested
            | GpsLoggerError::OutputDirectory { .. }
            | GpsLoggerError::NoConfigDir
            | GpsLoggerError::ConfigIOError { .. }
            | GpsLoggerError::ConfigSerializeError { .. }
            | GpsLoggerError::UnknownTimeZone { .. } => ErrorClass::Fatal,
            _ => ErrorClass::Recoverable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_errors_are_recoverable() {
        let sensor = GpsLoggerError::SensorUnavailable {
            path: PathBuf::from("/sys/bus/w1/devices"),
        };
        let capture = GpsLoggerError::CaptureFailure {
            path: PathBuf::from("photo.jpg"),
            reason: "exit status 1".to_string(),
        };
        assert_eq!(sensor.class(), ErrorClass::Recoverable);
        assert_eq!(capture.class(), ErrorClass::Recoverable);
        assert_eq!(GpsLoggerError::GpsStreamClosed.class(), ErrorClass::Recoverable);

        let csv = GpsLoggerError::CsvRecord {
            path: PathBuf::from("gpsdata.csv"),
            source: csv::Error::from(io::Error::other("disk full")),
        };
        assert_eq!(csv.class(), ErrorClass::Recoverable);
    }

    #[test]
    fn test_shutdown_is_fatal() {
        assert_eq!(GpsLoggerError::ShutdownRequested.class(), ErrorClass::Fatal);
        assert_eq!(GpsLoggerError::NoConfigDir.class(), ErrorClass::Fatal);
    }
}
