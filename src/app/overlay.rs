//! Volume overlay state machine.
//!
//! A volume change takes over the panel for a few seconds. While it is shown
//! the audio stream is corked and spectrum frames are discarded.

use crate::audio::{AudioControl, VolumeEvent};
use crate::device::FrameSink;
use crate::display::{CharacterMatrix, DisplayRenderer, LevelMatrix, BAR_COUNT};
use log::{debug, trace};
use std::time::{Duration, Instant};

/// How long the overlay stays up after the last volume change.
pub const OVERLAY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Spectrum,
    VolumeOverlay { expiry: Instant },
}

/// Inputs to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayEvent {
    VolumeChanged(VolumeEvent),
    Tick,
    SpectrumFrameReady(LevelMatrix),
}

pub struct OverlayController {
    state: OverlayState,
    renderer: DisplayRenderer,
    timeout: Duration,
}

impl OverlayController {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: OverlayState::Spectrum,
            renderer: DisplayRenderer::new(),
            timeout,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// When the overlay should next be checked, if it is showing.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            OverlayState::Spectrum => None,
            OverlayState::VolumeOverlay { expiry } => Some(expiry),
        }
    }

    pub fn handle<A, S>(&mut self, event: DisplayEvent, now: Instant, audio: &mut A, sink: &S)
    where
        A: AudioControl + ?Sized,
        S: FrameSink + ?Sized,
    {
        match (event, self.state) {
            (DisplayEvent::VolumeChanged(volume), _) => {
                audio.pause();
                let matrix = self
                    .renderer
                    .render_overlay(&volume.caption(), volume.fill(BAR_COUNT));
                if !sink.submit(&matrix) {
                    debug!("Volume overlay dropped, display busy");
                }
                // A newer change restarts the timer
                self.state = OverlayState::VolumeOverlay {
                    expiry: now + self.timeout,
                };
            }

            (DisplayEvent::Tick, OverlayState::VolumeOverlay { expiry }) if now >= expiry => {
                if !sink.submit(&CharacterMatrix::blank()) {
                    debug!("Overlay clear dropped, display busy");
                }
                audio.resume();
                self.state = OverlayState::Spectrum;
            }

            (DisplayEvent::Tick, _) => {}

            (DisplayEvent::SpectrumFrameReady(levels), OverlayState::Spectrum) => {
                sink.submit(&self.renderer.render(&levels));
            }

            (DisplayEvent::SpectrumFrameReady(_), OverlayState::VolumeOverlay { .. }) => {
                trace!("Overlay showing, spectrum frame discarded");
            }
        }
    }
}

impl Default for OverlayController {
    fn default() -> Self {
        Self::new(OVERLAY_TIMEOUT)
    }
}
