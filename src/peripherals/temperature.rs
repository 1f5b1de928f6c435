use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use log::{debug, trace};

use crate::{GpsLoggerError, event_loop::ShutdownSignal};

pub const W1_DEVICES_PATH: &str = "/sys/bus/w1/devices";
/// 1-Wire family code of the DS18B20.
const DS18B20_FAMILY_PREFIX: &str = "28";
const READY_POLL_MS: u64 = 200;

pub trait TemperatureReader {
    /// Ambient temperature in degrees Celsius. May block until the sensor is
    /// ready, unless shutdown is requested in the meantime.
    fn read_celsius(&mut self, shutdown: &ShutdownSignal) -> Result<f64, GpsLoggerError>;
}

/// DS18B20 probe exposed by the `w1-gpio`/`w1-therm` kernel drivers.
pub struct Ds18b20 {
    devices_path: PathBuf,
    ready_poll: Duration,
}

impl Default for Ds18b20 {
    fn default() -> Self {
        Ds18b20::new(W1_DEVICES_PATH)
    }
}

impl Ds18b20 {
    pub fn new(devices_path: impl Into<PathBuf>) -> Self {
        Self {
            devices_path: devices_path.into(),
            ready_poll: Duration::from_millis(READY_POLL_MS),
        }
    }

    pub fn with_ready_poll(mut self, ready_poll: Duration) -> Self {
        self.ready_poll = ready_poll;
        self
    }

    /// `w1_slave` file of the first probe found, in name order.
    fn slave_file(&self) -> Result<PathBuf, GpsLoggerError> {
        let entries =
            fs::read_dir(&self.devices_path).map_err(|_| GpsLoggerError::SensorUnavailable {
                path: self.devices_path.clone(),
            })?;

        let mut probes: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(DS18B20_FAMILY_PREFIX)
            })
            .map(|entry| entry.path().join("w1_slave"))
            .collect();
        probes.sort();

        probes
            .into_iter()
            .next()
            .ok_or_else(|| GpsLoggerError::SensorUnavailable {
                path: self.devices_path.clone(),
            })
    }

    fn read_lines(path: &Path) -> Result<Vec<String>, GpsLoggerError> {
        let contents = fs::read_to_string(path).map_err(|e| GpsLoggerError::SensorRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(contents.lines().map(str::to_string).collect())
    }
}

impl TemperatureReader for Ds18b20 {
    fn read_celsius(&mut self, shutdown: &ShutdownSignal) -> Result<f64, GpsLoggerError> {
        let path = self.slave_file()?;
        debug!("Reading temperature from {:?}", path);

        let mut lines = Self::read_lines(&path)?;
        // first line ends in YES once the CRC check passed
        while !lines
            .first()
            .is_some_and(|crc| crc.trim_end().ends_with("YES"))
        {
            if shutdown.is_requested() {
                return Err(GpsLoggerError::ShutdownRequested);
            }
            trace!("Temperature sensor not ready");
            thread::sleep(self.ready_poll);
            lines = Self::read_lines(&path)?;
        }

        parse_reading(lines.get(1).map(String::as_str).unwrap_or_default())
    }
}

/// Parse the `t=<millidegrees>` field of the second `w1_slave` line.
fn parse_reading(line: &str) -> Result<f64, GpsLoggerError> {
    let (_, raw) = line
        .split_once("t=")
        .ok_or_else(|| GpsLoggerError::SensorMalformed {
            reason: format!("missing temperature field in {line:?}"),
        })?;

    raw.trim()
        .parse::<f64>()
        .map(|milli| milli / 1000.0)
        .map_err(|_| GpsLoggerError::SensorMalformed {
            reason: format!("bad temperature value {raw:?}"),
        })
}
