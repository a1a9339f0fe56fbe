use super::{CHANNELS, SAMPLE_RATE};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, warn};
use tokio::sync::mpsc;

/// Source recorded when none is configured.
pub const DEFAULT_MONITOR_SOURCE: &str = "@DEFAULT_MONITOR@";

/// Environment variable the PulseAudio ALSA plugin takes its source from.
const SOURCE_ENV: &str = "PULSE_SOURCE";

/// ALSA PCMs routed through the sound server, in order of preference.
const SERVER_PCMS: [&str; 2] = ["pulse", "pipewire"];

/// Pause and resume of the sample source (cork / uncork).
pub trait AudioControl {
    fn pause(&mut self);
    fn resume(&mut self);
}

/// Captures the monitor of the playback sink as mono f32 chunks.
pub struct MonitorCapture {
    device_name: String,
    stream: cpal::Stream,
    paused: bool,
}

impl MonitorCapture {
    /// Open the capture PCM and start streaming `source` from the sound server.
    ///
    /// `device` names an ALSA PCM; without one the `pulse` or `pipewire` PCM is
    /// used. Every callback buffer is forwarded on the returned channel; stream
    /// errors are reported on `faults`.
    pub fn open(
        device: Option<&str>,
        source: &str,
        faults: mpsc::UnboundedSender<Error>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Vec<f32>>)> {
        // Read by the sound server's ALSA plugin when the stream is built
        if std::env::var_os(SOURCE_ENV).is_none() {
            std::env::set_var(SOURCE_ENV, source);
        }

        let host = cpal::default_host();
        let names: Vec<String> = host
            .input_devices()
            .map_err(|e| Error::Audio(format!("Failed to get input devices: {}", e)))?
            .filter_map(|d| d.name().ok())
            .collect();

        let device = match select_input(device, &names)? {
            Some(wanted) => host
                .input_devices()
                .map_err(|e| Error::Audio(format!("Failed to get input devices: {}", e)))?
                .find(|d| d.name().map(|name| name == wanted).unwrap_or(false))
                .ok_or_else(|| Error::Audio(format!("Input device '{}' not found", wanted)))?,
            None => {
                warn!("No sound server PCM found, the default input may be a microphone");
                host.default_input_device()
                    .ok_or_else(|| Error::Audio("No input device available".to_string()))?
            }
        };
        let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let config = cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // The receiver only goes away on shutdown
                    let _ = tx.send(data.to_vec());
                },
                move |err| {
                    let _ = faults.send(Error::Audio(format!("Stream failure: {}", err)));
                },
                None,
            )
            .map_err(|e| Error::Audio(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::Audio(format!("Failed to start audio stream: {}", e)))?;
        debug!("Recording source {}", source);

        Ok((
            Self {
                device_name,
                stream,
                paused: false,
            },
            rx,
        ))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

/// Pick the PCM to open: `Some(name)`, or `None` for the system default input.
fn select_input(requested: Option<&str>, available: &[String]) -> Result<Option<String>> {
    if let Some(wanted) = requested {
        return if available.iter().any(|name| name == wanted) {
            Ok(Some(wanted.to_string()))
        } else {
            Err(Error::Audio(format!(
                "Input device '{}' not found (available: {})",
                wanted,
                available.join(", ")
            )))
        };
    }

    Ok(SERVER_PCMS
        .iter()
        .find(|pcm| available.iter().any(|name| name == *pcm))
        .map(|pcm| pcm.to_string()))
}

impl AudioControl for MonitorCapture {
    fn pause(&mut self) {
        if self.paused {
            return;
        }
        match self.stream.pause() {
            Ok(()) => {
                debug!("Corked audio stream");
                self.paused = true;
            }
            Err(e) => warn!("Failed to pause audio stream: {}", e),
        }
    }

    fn resume(&mut self) {
        if !self.paused {
            return;
        }
        match self.stream.play() {
            Ok(()) => {
                debug!("Uncorked audio stream");
                self.paused = false;
            }
            Err(e) => warn!("Failed to resume audio stream: {}", e),
        }
    }
}
