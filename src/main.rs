use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use gpslogger::{
    AppConfig, CsvLogWriter, EventLoop, GpsLoggerError, Sequencer, SessionPaths, SessionState,
    ShutdownSignal,
    gps::GpsdReportProducer,
    peripherals::{Ds18b20, GpioButton, LibcameraCapturer},
    writer::CONSOLE_HEADER,
};
use jiff::Zoned;
use log::{LevelFilter, error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Don't write to stdout
    #[arg(short, long)]
    quiet: bool,

    /// Absolute path to the destination folder
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Time in seconds to wait between logging attempts
    #[arg(short = 't', long = "poll")]
    poll: Option<u64>,

    /// Distance in feet to travel before writing a new data point
    #[arg(short, long = "dist")]
    dist: Option<f64>,

    /// IANA time zone for the local date and time columns
    #[arg(long)]
    time_zone: Option<String>,

    /// gpsd address as host:port
    #[arg(long)]
    gpsd: Option<String>,

    /// BCM GPIO number of the manual trigger button
    #[arg(long)]
    trigger_gpio: Option<u32>,

    /// Run without a manual trigger button
    #[arg(long, conflicts_with = "trigger_gpio")]
    no_trigger: bool,

    /// Save the resulting settings as the defaults for future runs
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if self.quiet {
            config.quiet = true;
        }
        if let Some(path) = &self.path {
            config.output_path = path.clone();
        }
        if let Some(poll) = self.poll {
            config.poll_interval_s = poll;
        }
        if let Some(dist) = self.dist {
            config.distance_threshold_ft = dist;
        }
        if let Some(time_zone) = &self.time_zone {
            config.time_zone = time_zone.clone();
        }
        if let Some(gpsd) = &self.gpsd {
            config.gpsd_address = gpsd.clone();
        }
        if let Some(pin) = self.trigger_gpio {
            config.trigger_gpio = Some(pin);
        }
        if self.no_trigger {
            config.trigger_gpio = None;
        }
    }
}

fn run(config: &AppConfig) -> Result<(), GpsLoggerError> {
    let settings = config.logging_settings()?;

    let paths = SessionPaths::new(
        &config.output_path,
        Zoned::now().with_time_zone(settings.time_zone.clone()),
    );
    paths.create_dir()?;
    CsvLogWriter::create(&paths.csv_path)?;
    info!("Logging to {:?}", paths.csv_path);
    if !config.quiet {
        println!("{CONSOLE_HEADER}");
    }

    let shutdown = ShutdownSignal::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown requested");
        handler_shutdown.request();
    })
    .expect("Could not set Ctrl-C handler");

    let sequencer = Sequencer::new(
        GpsdReportProducer::new(config.gpsd_address.clone()),
        Ds18b20::default(),
        LibcameraCapturer::new(config.camera.clone()),
        settings,
    );
    let event_loop = EventLoop::new(
        sequencer,
        SessionState::new(paths),
        shutdown,
        config.loop_timing(),
    );

    // released when it goes out of scope after the loop ends
    let _button = match config.trigger_gpio {
        Some(pin) => GpioButton::open(
            pin,
            event_loop.trigger_handle(),
            Duration::from_millis(config.trigger_debounce_ms),
        )
        .map_err(|e| warn!("Manual trigger disabled: {}", snafu::Report::from_error(e)))
        .ok(),
        None => None,
    };

    event_loop.run()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match AppConfig::from_local_file() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Ignoring saved config: {}", snafu::Report::from_error(e));
            AppConfig::default()
        }
    };
    args.apply(&mut config);

    let mut logger = colog::default_builder();
    logger.filter_level(if config.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    });
    logger.parse_default_env();
    logger.init();

    if args.save_config {
        if let Err(e) = config.save() {
            warn!("Could not save config: {}", snafu::Report::from_error(e));
        }
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", snafu::Report::from_error(e));
            ExitCode::FAILURE
        }
    }
}
