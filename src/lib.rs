// lcdscope: live spectrum bars on an iMON two-line LCD
// Expose public modules for use in integration tests

pub mod app;
pub mod audio;
pub mod device;
pub mod display;
pub mod error;

// Re-export commonly used types for convenience
pub use app::{App, ConfigManager, Settings};
pub use audio::{FrameAccumulator, MonitorCapture, PactlVolumeSource, VolumeEvent};
pub use device::{DeviceWriter, EndpointTransport, ImonLcd, Transport};
pub use display::{CharacterMatrix, DisplayRenderer, LevelMatrix, SpectrumAnalyzer};
pub use error::{Error, Result};
