//! One logging event: sample the GPS, and when the device has moved far
//! enough since the last row, write a new row and take a geotagged photo.

use std::io::{self, Write};

use jiff::{Timestamp, tz::TimeZone};
use log::{debug, warn};

use crate::{
    GpsLoggerError,
    event_loop::ShutdownSignal,
    gps::{AcquisitionSettings, GpsReportProducer, acquire_fix},
    peripherals::{Geotag, PhotoCapturer, TemperatureReader},
    session::SessionState,
    units::{celsius_to_fahrenheit, great_circle_feet, to_feet, to_mph},
    writer::{CsvLogWriter, LogRecord},
};

pub const DEFAULT_DISTANCE_THRESHOLD_FT: f64 = 100.0;

#[derive(Clone, Debug)]
pub struct LoggingSettings {
    /// A row is written only when the device is strictly farther than this
    /// from the last logged position.
    pub distance_threshold_ft: f64,
    /// Zone for the date and time columns of the data log.
    pub time_zone: TimeZone,
    /// Echo every row to stdout. This is the only per-row console output,
    /// the log only carries it at debug level.
    pub echo: bool,
    pub acquisition: AcquisitionSettings,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            distance_threshold_ft: DEFAULT_DISTANCE_THRESHOLD_FT,
            time_zone: TimeZone::UTC,
            echo: false,
            acquisition: AcquisitionSettings::default(),
        }
    }
}

/// The movement gate. Exactly at the threshold does not count as moved.
pub fn exceeds_threshold(distance_ft: f64, threshold_ft: f64) -> bool {
    distance_ft > threshold_ft
}

/// Local (date, time of day) columns for a fix timestamp.
pub fn local_date_time(timestamp: Timestamp, time_zone: &TimeZone) -> (String, String) {
    let local = timestamp.to_zoned(time_zone.clone());
    (
        local.strftime("%b %d %Y").to_string(),
        local.strftime("%I:%M:%S%p %Z").to_string(),
    )
}

pub struct Sequencer<P, T, C> {
    producer: P,
    thermometer: T,
    camera: C,
    settings: LoggingSettings,
    echo: Option<Box<dyn Write + Send>>,
}

impl<P, T, C> Sequencer<P, T, C>
where
    P: GpsReportProducer,
    T: TemperatureReader,
    C: PhotoCapturer,
{
    pub fn new(producer: P, thermometer: T, camera: C, settings: LoggingSettings) -> Self {
        let echo = settings
            .echo
            .then(|| Box::new(io::stdout()) as Box<dyn Write + Send>);
        Self {
            producer,
            thermometer,
            camera,
            settings,
            echo,
        }
    }

    /// Echo rows to `sink` instead of stdout.
    pub fn with_echo(mut self, sink: impl Write + Send + 'static) -> Self {
        self.echo = Some(Box::new(sink));
        self
    }

    pub fn settings(&self) -> &LoggingSettings {
        &self.settings
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Run one logging event and return the state for the next one.
    ///
    /// Blocks while waiting for a GPS fix and for the temperature probe.
    /// Errors are returned as-is, retrying is up to the caller. The row is
    /// written before the photo is taken, so a failed capture leaves a row
    /// that names a photo that does not exist, and the session state is not
    /// advanced for it.
    pub fn run_logging_event(
        &mut self,
        session: SessionState,
        shutdown: &ShutdownSignal,
    ) -> Result<SessionState, GpsLoggerError> {
        let (fix, sky) = acquire_fix(&mut self.producer, &self.settings.acquisition, shutdown)?;

        let (date, local_time) = local_date_time(fix.timestamp, &self.settings.time_zone);
        let speed_mph = to_mph(fix.speed_mps);
        let alt_ft = to_feet(fix.alt_m);
        let temp_f = celsius_to_fahrenheit(self.thermometer.read_celsius(shutdown)?);

        let distance_ft = great_circle_feet(session.last_position, fix.position);
        if !exceeds_threshold(distance_ft, self.settings.distance_threshold_ft) {
            debug!(
                "Moved {:.1} ft since last row, threshold is {} ft, not logging",
                distance_ft, self.settings.distance_threshold_ft
            );
            return Ok(session);
        }

        let photo_index = session.photo_index + 1;
        let record = LogRecord {
            date,
            local_time,
            position: fix.position,
            speed_mph,
            alt_ft,
            temp_f,
            satellites: sky.satellites,
            photo: session.paths.photo_name(photo_index),
        };

        CsvLogWriter::open(&session.paths.csv_path).append(&record)?;
        if let Some(echo) = self.echo.as_mut() {
            let echoed = writeln!(echo, "{}", record.console_line()).and_then(|_| echo.flush());
            if let Err(e) = echoed {
                warn!("Could not echo row {}: {}", photo_index, e);
            }
        }
        debug!(
            "Logged row {} after moving {:.1} ft",
            photo_index, distance_ft
        );

        let geotag = Geotag::new(&fix, sky);
        self.camera
            .capture(&session.paths.photo_path(photo_index), &geotag)?;

        Ok(SessionState {
            last_position: fix.position,
            photo_index,
            ..session
        })
    }
}
