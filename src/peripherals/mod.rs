//! Hardware the logger talks to besides the GPS: temperature probe, camera
//! and the manual trigger button.

pub mod camera;
pub mod temperature;
pub mod trigger;

pub use camera::{CameraConfig, Geotag, LibcameraCapturer, PhotoCapturer};
pub use temperature::{Ds18b20, TemperatureReader};
pub use trigger::{GpioButton, ManualTrigger, TriggerHandle};
