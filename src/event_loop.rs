use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use log::{error, info};

use crate::{
    ErrorClass, GpsLoggerError,
    gps::GpsReportProducer,
    peripherals::{ManualTrigger, PhotoCapturer, TemperatureReader, TriggerHandle},
    sequencer::Sequencer,
    session::SessionState,
};

pub const POLL_INTERVAL_S: u64 = 10;
pub const TICK_MS: u64 = 100;
pub const RETRY_COOLDOWN_MS: u64 = 1000;

/// Set from the signal handler, checked by the event loop every tick and by
/// fix acquisition between reports.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LoopTiming {
    /// Time between scheduled logging events.
    pub poll_interval: Duration,
    /// How often the trigger and the clock are checked.
    pub tick: Duration,
    /// Pause after a failed logging event before the forced retry.
    pub retry_cooldown: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(POLL_INTERVAL_S),
            tick: Duration::from_millis(TICK_MS),
            retry_cooldown: Duration::from_millis(RETRY_COOLDOWN_MS),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Triggered,
}

/// Decides when to run a logging event and keeps the process alive across
/// failed ones.
pub struct EventLoop<P, T, C> {
    sequencer: Sequencer<P, T, C>,
    session: SessionState,
    trigger: ManualTrigger,
    shutdown: ShutdownSignal,
    timing: LoopTiming,
    last_attempt: Instant,
    failures: usize,
}

impl<P, T, C> EventLoop<P, T, C>
where
    P: GpsReportProducer,
    T: TemperatureReader,
    C: PhotoCapturer,
{
    pub fn new(
        sequencer: Sequencer<P, T, C>,
        session: SessionState,
        shutdown: ShutdownSignal,
        timing: LoopTiming,
    ) -> Self {
        Self {
            sequencer,
            session,
            trigger: ManualTrigger::new(),
            shutdown,
            timing,
            last_attempt: Instant::now(),
            failures: 0,
        }
    }

    /// Handle for the manual trigger source, e.g. a GPIO button.
    pub fn trigger_handle(&self) -> TriggerHandle {
        self.trigger.handle()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn sequencer(&self) -> &Sequencer<P, T, C> {
        &self.sequencer
    }

    /// Failed logging events so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn state(&self) -> LoopState {
        if self.trigger.is_set() || self.last_attempt.elapsed() >= self.timing.poll_interval {
            LoopState::Triggered
        } else {
            LoopState::Idle
        }
    }

    /// Run one logging event. Recoverable failures are logged and arm the
    /// trigger so the next tick retries immediately; only fatal ones are returned.
    pub fn attempt(&mut self) -> Result<(), GpsLoggerError> {
        match self
            .sequencer
            .run_logging_event(self.session.clone(), &self.shutdown)
        {
            Ok(next) => {
                self.session = next;
                self.last_attempt = Instant::now();
                self.trigger.clear();
                Ok(())
            }
            Err(e) if e.class() == ErrorClass::Fatal => Err(e),
            Err(e) => {
                self.failures += 1;
                error!("Error while polling the GPS: {}", snafu::Report::from_error(&e));
                thread::sleep(self.timing.retry_cooldown);
                info!("Trying GPS again...");
                self.trigger.set();
                Ok(())
            }
        }
    }

    /// Loop until shutdown is requested, then hand back the final session state.
    pub fn run(mut self) -> Result<SessionState, GpsLoggerError> {
        loop {
            if self.shutdown.is_requested() {
                break;
            }

            if self.state() == LoopState::Triggered {
                match self.attempt() {
                    Ok(()) => {}
                    Err(GpsLoggerError::ShutdownRequested) => break,
                    Err(e) => return Err(e),
                }
            }

            thread::sleep(self.timing.tick);
        }

        info!(
            "GPSLogger done after {} photos, exiting",
            self.session.photo_index
        );
        Ok(self.session)
    }
}
