//! Sink volume notifications.
//!
//! Listens to `pactl subscribe` and reads the sink's volume and mute state
//! whenever a sink reports a change.

use log::{debug, error, warn};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Default sink to follow.
pub const DEFAULT_SINK: &str = "@DEFAULT_SINK@";

/// A change of the sink's volume or mute state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeEvent {
    /// Volume in percent of nominal; may exceed 100 when boosted.
    pub level: u16,
    pub muted: bool,
}

impl VolumeEvent {
    /// Overlay caption.
    pub fn caption(&self) -> String {
        if self.muted {
            "Muted".to_string()
        } else {
            format!("Volume: {}%", self.level)
        }
    }

    /// Bar length on a display `columns` wide.
    pub fn fill(&self, columns: usize) -> usize {
        (self.level as usize * columns / 100).min(columns)
    }
}

/// Pulls the first channel's percentage out of `pactl get-sink-volume` output:
///
/// `Volume: front-left: 32768 /  50% / -18.06 dB,   front-right: ...`
pub fn parse_volume(output: &str) -> Option<u16> {
    let line = output.lines().find(|l| l.trim_start().starts_with("Volume:"))?;
    line.split('/')
        .map(str::trim)
        .find_map(|field| field.strip_suffix('%'))
        .and_then(|percent| percent.trim().parse().ok())
}

/// Parses `pactl get-sink-mute` output: `Mute: yes` / `Mute: no`.
pub fn parse_mute(output: &str) -> Option<bool> {
    let value = output.trim().strip_prefix("Mute:")?.trim();
    match value {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// True for `pactl subscribe` lines announcing a change on a sink.
///
/// `Event 'change' on sink #0`; sink inputs and sources do not count.
pub fn is_sink_change(line: &str) -> bool {
    line.trim().starts_with("Event 'change' on sink #")
}

/// Remembers the last reading so only real changes are reported.
#[derive(Debug, Default)]
struct VolumeTracker {
    last: Option<VolumeEvent>,
}

impl VolumeTracker {
    fn update(&mut self, event: VolumeEvent) -> Option<VolumeEvent> {
        if self.last == Some(event) {
            return None;
        }
        self.last = Some(event);
        Some(event)
    }
}

/// Follows a PulseAudio/PipeWire sink through `pactl subscribe`.
pub struct PactlVolumeSource {
    sink: String,
}

impl PactlVolumeSource {
    pub fn new(sink: impl Into<String>) -> Self {
        Self { sink: sink.into() }
    }

    /// Start listening. Events stop when the receiver is dropped or `pactl` is unavailable.
    pub fn spawn(self) -> mpsc::Receiver<VolumeEvent> {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move { self.run(tx).await });
        rx
    }

    async fn run(self, tx: mpsc::Sender<VolumeEvent>) {
        let mut child = match Command::new("pactl")
            .arg("subscribe")
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!("Cannot run pactl, volume overlay disabled: {}", e);
                return;
            }
        };
        let Some(stdout) = child.stdout.take() else {
            error!("pactl subscribe has no output, volume overlay disabled");
            return;
        };
        let mut lines = BufReader::new(stdout).lines();

        let mut tracker = VolumeTracker::default();
        // For throttling repeated error messages
        let mut last_error_time: Option<Instant> = None;
        let error_throttle_duration = Duration::from_secs(5);

        // The first reading is the baseline, not a change
        match self.query().await {
            Ok(event) => {
                debug!("Initial volume {:?}", event);
                tracker.update(event);
            }
            Err(QueryError::Spawn(e)) => {
                error!("Cannot run pactl, volume overlay disabled: {}", e);
                return;
            }
            Err(QueryError::Output(msg)) => warn!("Volume query failed: {}", msg),
        }

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    warn!("pactl subscribe exited, volume overlay disabled");
                    return;
                }
                Err(e) => {
                    warn!("Failed to read pactl events: {}", e);
                    return;
                }
            };
            if !is_sink_change(&line) {
                continue;
            }

            let event = match self.query().await {
                Ok(event) => event,
                Err(QueryError::Spawn(e)) => {
                    error!("Cannot run pactl, volume overlay disabled: {}", e);
                    return;
                }
                Err(QueryError::Output(msg)) => {
                    let now = Instant::now();
                    if last_error_time
                        .map_or(true, |t| now.duration_since(t) > error_throttle_duration)
                    {
                        warn!("Volume query failed: {}", msg);
                        last_error_time = Some(now);
                    }
                    continue;
                }
            };

            if let Some(event) = tracker.update(event) {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn query(&self) -> std::result::Result<VolumeEvent, QueryError> {
        let volume = self.pactl("get-sink-volume").await?;
        let mute = self.pactl("get-sink-mute").await?;

        let level = parse_volume(&volume)
            .ok_or_else(|| QueryError::Output(format!("unexpected volume output: {:?}", volume)))?;
        let muted = parse_mute(&mute)
            .ok_or_else(|| QueryError::Output(format!("unexpected mute output: {:?}", mute)))?;
        Ok(VolumeEvent { level, muted })
    }

    async fn pactl(&self, command: &str) -> std::result::Result<String, QueryError> {
        let output = Command::new("pactl")
            .arg(command)
            .arg(&self.sink)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(QueryError::Spawn)?;
        if !output.status.success() {
            return Err(QueryError::Output(format!(
                "pactl {} exited with {}",
                command, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

enum QueryError {
    Spawn(std::io::Error),
    Output(String),
}
