use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};

use crate::{
    GpsLoggerError,
    event_loop::{LoopTiming, POLL_INTERVAL_S, RETRY_COOLDOWN_MS, TICK_MS},
    gps::{AcquisitionSettings, acquisition::UNFIXED_BACKOFF_MS, producer::DEFAULT_GPSD_ADDRESS},
    peripherals::{
        CameraConfig,
        trigger::{DEBOUNCE_MS, DEFAULT_TRIGGER_GPIO},
    },
    sequencer::{DEFAULT_DISTANCE_THRESHOLD_FT, LoggingSettings},
    session::DEFAULT_OUTPUT_PATH,
};

const CONFIG_DIR_NAME: &str = "gpslogger";
const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_TIME_ZONE: &str = "America/Chicago";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub output_path: PathBuf,
    pub poll_interval_s: u64,
    pub distance_threshold_ft: f64,
    /// IANA zone name for the local date and time columns
    pub time_zone: String,
    pub gpsd_address: String,
    /// BCM number of the manual trigger button, `None` to run without one
    pub trigger_gpio: Option<u32>,
    pub trigger_debounce_ms: u64,
    pub camera: CameraConfig,
    pub retry_cooldown_ms: u64,
    pub tick_ms: u64,
    pub unfixed_backoff_ms: u64,
    pub quiet: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            poll_interval_s: POLL_INTERVAL_S,
            distance_threshold_ft: DEFAULT_DISTANCE_THRESHOLD_FT,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            gpsd_address: DEFAULT_GPSD_ADDRESS.to_string(),
            trigger_gpio: Some(DEFAULT_TRIGGER_GPIO),
            trigger_debounce_ms: DEBOUNCE_MS,
            camera: CameraConfig::default(),
            retry_cooldown_ms: RETRY_COOLDOWN_MS,
            tick_ms: TICK_MS,
            unfixed_backoff_ms: UNFIXED_BACKOFF_MS,
            quiet: false,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf, GpsLoggerError> {
        Ok(dirs::config_dir()
            .ok_or(GpsLoggerError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Config saved in the user config directory, `None` when there is none yet.
    pub fn from_local_file() -> Result<Option<Self>, GpsLoggerError> {
        Self::from_file(&Self::default_path()?)
    }

    pub fn from_file(config_path: &Path) -> Result<Option<Self>, GpsLoggerError> {
        if !config_path.exists() {
            return Ok(None);
        }

        let file = std::fs::File::open(config_path)
            .map_err(|e| GpsLoggerError::ConfigIOError { source: e })?;
        serde_json::from_reader(file)
            .map(Some)
            .map_err(|e| GpsLoggerError::ConfigSerializeError { source: e })
    }

    pub fn save(&self) -> Result<(), GpsLoggerError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), GpsLoggerError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GpsLoggerError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| GpsLoggerError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| GpsLoggerError::ConfigSerializeError { source: e })
    }

    pub fn time_zone(&self) -> Result<TimeZone, GpsLoggerError> {
        TimeZone::get(&self.time_zone).map_err(|e| GpsLoggerError::UnknownTimeZone {
            name: self.time_zone.clone(),
            source: e,
        })
    }

    pub fn logging_settings(&self) -> Result<LoggingSettings, GpsLoggerError> {
        Ok(LoggingSettings {
            distance_threshold_ft: self.distance_threshold_ft,
            time_zone: self.time_zone()?,
            echo: !self.quiet,
            acquisition: AcquisitionSettings {
                unfixed_backoff: Duration::from_millis(self.unfixed_backoff_ms),
            },
        })
    }

    pub fn loop_timing(&self) -> LoopTiming {
        LoopTiming {
            poll_interval: Duration::from_secs(self.poll_interval_s),
            tick: Duration::from_millis(self.tick_ms),
            retry_cooldown: Duration::from_millis(self.retry_cooldown_ms),
        }
    }
}
