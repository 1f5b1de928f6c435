use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use csv::WriterBuilder;
use itertools::Itertools;

use crate::{GpsLoggerError, gps::LatLon, units::format_decimal};

pub const CSV_HEADER: &str = "Date,Localtime,latitude,longitude,speed,alt,temp,sats,photo";
pub const CONSOLE_HEADER: &str =
    "Date\t\tLocaltime\tlatitude\tlongitude\tspeed\talt\ttemp\tsats\tphoto";

/// One data log row. Its photo is captured right after the row is written.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// Local date, e.g. `Jan 15 2024`
    pub date: String,
    /// Local time of day, e.g. `12:30:00PM EST`
    pub local_time: String,
    pub position: LatLon,
    pub speed_mph: f64,
    pub alt_ft: f64,
    pub temp_f: f64,
    pub satellites: u32,
    pub photo: String,
}

impl LogRecord {
    fn fields(&self) -> [String; 9] {
        [
            self.date.clone(),
            self.local_time.clone(),
            format_decimal(self.position.lat),
            format_decimal(self.position.lon),
            format!("{:.1}", self.speed_mph),
            format!("{:.1}", self.alt_ft),
            format!("{:.1}", self.temp_f),
            self.satellites.to_string(),
            self.photo.clone(),
        ]
    }

    pub fn console_line(&self) -> String {
        self.fields().iter().join("\t")
    }
}

/// Append-only CSV data log, one per session.
pub struct CsvLogWriter {
    path: PathBuf,
}

impl CsvLogWriter {
    /// Create the file and write the header row, replacing any existing file.
    pub fn create(path: &Path) -> Result<Self, GpsLoggerError> {
        let file = File::create(path).map_err(|e| GpsLoggerError::WriterError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(CSV_HEADER.split(','))
            .map_err(|e| GpsLoggerError::CsvRecord {
                path: path.to_path_buf(),
                source: e,
            })?;
        writer.flush().map_err(|e| GpsLoggerError::WriterError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Writer for a log that already has its header.
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one newline-terminated row, quoting fields only where needed.
    /// The file is reopened for every row so a crash never leaves a buffered
    /// row behind.
    pub fn append(&mut self, record: &LogRecord) -> Result<(), GpsLoggerError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| GpsLoggerError::WriterError {
                path: self.path.clone(),
                source: e,
            })?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .write_record(record.fields())
            .map_err(|e| GpsLoggerError::CsvRecord {
                path: self.path.clone(),
                source: e,
            })?;
        writer.flush().map_err(|e| GpsLoggerError::WriterError {
            path: self.path.clone(),
            source: e,
        })
    }
}
