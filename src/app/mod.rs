pub mod config;
pub mod overlay;

use crate::audio::{AudioControl, FrameAccumulator, VolumeEvent};
use crate::device::{DeviceWriter, Transport};
use crate::display::SpectrumAnalyzer;
use crate::error::{Error, Result};
use log::{debug, info};
use overlay::{DisplayEvent, OverlayController, OverlayState};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub use config::{ConfigManager, Settings};

/// Main application struct that owns the whole display pipeline
pub struct App<T: Transport, A: AudioControl> {
    accumulator: FrameAccumulator,
    analyzer: SpectrumAnalyzer,
    overlay: OverlayController,
    writer: DeviceWriter<T>,
    audio: A,
}

impl<T: Transport, A: AudioControl> App<T, A> {
    pub fn new(
        analyzer: SpectrumAnalyzer,
        writer: DeviceWriter<T>,
        audio: A,
        overlay_timeout: Duration,
    ) -> Self {
        Self {
            accumulator: FrameAccumulator::new(analyzer.frame_len()),
            analyzer,
            overlay: OverlayController::new(overlay_timeout),
            writer,
            audio,
        }
    }

    /// New audio from the capture stream.
    pub fn on_data(&mut self, chunk: &[f32], now: Instant) {
        for frame in self.accumulator.ingest(chunk) {
            let levels = self.analyzer.analyze(&frame);
            self.overlay.handle(
                DisplayEvent::SpectrumFrameReady(levels),
                now,
                &mut self.audio,
                &self.writer,
            );
        }
    }

    /// The sink volume or mute state changed.
    pub fn on_volume(&mut self, event: VolumeEvent, now: Instant) {
        debug!("Volume changed: {:?}", event);
        self.overlay.handle(
            DisplayEvent::VolumeChanged(event),
            now,
            &mut self.audio,
            &self.writer,
        );
    }

    /// Timer check for the overlay.
    pub fn on_tick(&mut self, now: Instant) {
        let was_overlay = self.overlay.deadline().is_some();
        self.overlay
            .handle(DisplayEvent::Tick, now, &mut self.audio, &self.writer);

        // Samples from before the pause do not continue the ones after it
        if was_overlay && self.overlay.state() == OverlayState::Spectrum {
            self.accumulator.reset();
        }
    }

    /// When `on_tick` next needs to run.
    pub fn deadline(&self) -> Option<Instant> {
        self.overlay.deadline()
    }

    pub fn overlay_state(&self) -> OverlayState {
        self.overlay.state()
    }

    pub fn residue_len(&self) -> usize {
        self.accumulator.residue_len()
    }

    pub fn writer(&self) -> &DeviceWriter<T> {
        &self.writer
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    /// Dispatch events until `shutdown` resolves or a fatal error arrives.
    pub async fn run<F>(
        &mut self,
        mut samples: mpsc::UnboundedReceiver<Vec<f32>>,
        mut volume: mpsc::Receiver<VolumeEvent>,
        mut faults: mpsc::UnboundedReceiver<Error>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut volume_open = true;

        info!("Display loop started");
        loop {
            let deadline = self.overlay.deadline();
            // Only polled while the overlay is showing
            let wake = deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(());
                }

                Some(err) = faults.recv() => {
                    return Err(err);
                }

                chunk = samples.recv() => match chunk {
                    Some(chunk) => self.on_data(&chunk, Instant::now()),
                    None => return Err(Error::Audio("Audio stream ended".to_string())),
                },

                event = volume.recv(), if volume_open => match event {
                    Some(event) => self.on_volume(event, Instant::now()),
                    None => {
                        debug!("Volume notifications ended");
                        volume_open = false;
                    }
                },

                _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                    self.on_tick(Instant::now());
                }
            }
        }
    }

    /// Drain the display and release the device.
    pub async fn close(self) -> Result<()> {
        self.writer.close().await?;
        info!("Display closed");
        Ok(())
    }
}
