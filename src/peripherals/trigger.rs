use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::GpsLoggerError;

pub const SYSFS_GPIO_PATH: &str = "/sys/class/gpio";
pub const DEFAULT_TRIGGER_GPIO: u32 = 23;
pub const DEBOUNCE_MS: u64 = 300;
const GPIO_POLL_MS: u64 = 10;

/// Manual trigger flag owned by the event loop.
///
/// Interrupt sources never see this type, only a [`TriggerHandle`] that can
/// raise the flag.
#[derive(Default)]
pub struct ManualTrigger {
    flag: Arc<AtomicBool>,
}

/// Write side of a [`ManualTrigger`], handed to whatever detects button presses.
#[derive(Clone)]
pub struct TriggerHandle {
    flag: Arc<AtomicBool>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> TriggerHandle {
        TriggerHandle {
            flag: Arc::clone(&self.flag),
        }
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl TriggerHandle {
    pub fn fire(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Drops edges that arrive within `window` of the last accepted one.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }
}

/// Push button on a sysfs GPIO line. A watcher thread polls the line and
/// fires the trigger on every debounced rising edge.
///
/// The watcher is stopped and the line unexported when the button is dropped.
pub struct GpioButton {
    pin: u32,
    gpio_path: PathBuf,
    exported: bool,
    stop: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl GpioButton {
    pub fn open(
        pin: u32,
        trigger: TriggerHandle,
        debounce: Duration,
    ) -> Result<Self, GpsLoggerError> {
        Self::open_at(SYSFS_GPIO_PATH, pin, trigger, debounce)
    }

    pub fn open_at(
        gpio_path: impl Into<PathBuf>,
        pin: u32,
        trigger: TriggerHandle,
        debounce: Duration,
    ) -> Result<Self, GpsLoggerError> {
        let gpio_path = gpio_path.into();
        let line_path = gpio_path.join(format!("gpio{pin}"));

        let mut exported = false;
        if !line_path.exists() {
            fs::write(gpio_path.join("export"), pin.to_string()).map_err(|e| {
                GpsLoggerError::Gpio {
                    operation: format!("export pin {pin}"),
                    source: e,
                }
            })?;
            exported = true;
        }
        // not every board lets us change these, a read-only line still works
        if let Err(e) = fs::write(line_path.join("direction"), "in") {
            warn!("Could not set GPIO {} direction: {}", pin, e);
        }

        let value_path = line_path.join("value");
        let stop = Arc::new(AtomicBool::new(false));
        let watcher_stop = Arc::clone(&stop);
        let watcher = thread::Builder::new()
            .name(format!("gpio{pin}-button"))
            .spawn(move || {
                let mut debouncer = Debouncer::new(debounce);
                let mut prev_high = read_level(&value_path).unwrap_or(false);
                while !watcher_stop.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(GPIO_POLL_MS));
                    let Some(high) = read_level(&value_path) else {
                        continue;
                    };
                    if high && !prev_high && debouncer.accept(Instant::now()) {
                        debug!("Manual trigger from GPIO {}", pin);
                        trigger.fire();
                    }
                    prev_high = high;
                }
            })
            .map_err(|e| GpsLoggerError::Gpio {
                operation: format!("start watcher for pin {pin}"),
                source: e,
            })?;

        info!("Listening for manual trigger on GPIO {}", pin);
        Ok(Self {
            pin,
            gpio_path,
            exported,
            stop,
            watcher: Some(watcher),
        })
    }
}

fn read_level(value_path: &Path) -> Option<bool> {
    fs::read_to_string(value_path)
        .ok()
        .map(|value| value.trim() == "1")
}

impl Drop for GpioButton {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
        if self.exported {
            if let Err(e) = fs::write(self.gpio_path.join("unexport"), self.pin.to_string()) {
                warn!("Could not release GPIO {}: {}", self.pin, e);
            }
        }
        debug!("Released GPIO {}", self.pin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn wait_for(trigger: &ManualTrigger) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if trigger.is_set() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_handle_sets_owner_flag() {
        let trigger = ManualTrigger::new();
        let handle = trigger.handle();
        assert!(!trigger.is_set());

        handle.fire();
        assert!(trigger.is_set());

        trigger.clear();
        assert!(!trigger.is_set());
    }

    #[test]
    fn test_debouncer_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        let start = Instant::now();

        assert!(debouncer.accept(start));
        assert!(!debouncer.accept(start + Duration::from_millis(100)));
        assert!(!debouncer.accept(start + Duration::from_millis(299)));
        assert!(debouncer.accept(start + Duration::from_millis(300)));
    }

    #[test]
    fn test_gpio_button_fires_on_rising_edge() {
        let sysfs = TempDir::new().unwrap();
        let line = sysfs.path().join("gpio23");
        fs::create_dir_all(&line).unwrap();
        fs::write(line.join("value"), "0\n").unwrap();

        let trigger = ManualTrigger::new();
        let button =
            GpioButton::open_at(sysfs.path(), 23, trigger.handle(), Duration::ZERO).unwrap();
        assert!(!button.exported);

        thread::sleep(Duration::from_millis(30));
        assert!(!trigger.is_set());

        fs::write(line.join("value"), "1\n").unwrap();
        assert!(wait_for(&trigger));

        drop(button);
        assert_eq!(fs::read_to_string(line.join("direction")).unwrap(), "in");
    }

    #[test]
    fn test_gpio_button_exports_and_releases_line() {
        let sysfs = TempDir::new().unwrap();
        fs::write(sysfs.path().join("export"), "").unwrap();

        let trigger = ManualTrigger::new();
        let button =
            GpioButton::open_at(sysfs.path(), 17, trigger.handle(), Duration::ZERO).unwrap();
        assert!(button.exported);
        assert_eq!(fs::read_to_string(sysfs.path().join("export")).unwrap(), "17");

        drop(button);
        assert_eq!(fs::read_to_string(sysfs.path().join("unexport")).unwrap(), "17");
    }
}
