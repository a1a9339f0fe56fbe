mod accumulator;
mod capture;
pub mod volume;

pub use accumulator::{Frame, FrameAccumulator, Frames};
pub use capture::{AudioControl, MonitorCapture, DEFAULT_MONITOR_SOURCE};
pub use volume::{PactlVolumeSource, VolumeEvent};

// Stream format requested from the sound server
pub const SAMPLE_RATE: u32 = 44100;
pub const CHANNELS: u16 = 1; // Mono keeps the FFT input simple

/// Samples per analysis frame, about ten frames per second at 44.1 kHz.
pub const FRAME_LEN: usize = 4096;
