//! Configuration management for lcdscope
//!
//! Settings live in `<config dir>/lcdscope/config.toml`. Display geometry,
//! band layout and packet format are fixed by the hardware and not configurable.

use super::overlay::OVERLAY_TIMEOUT;
use crate::audio::volume::DEFAULT_SINK;
use crate::audio::DEFAULT_MONITOR_SOURCE;
use crate::device::TRANSFER_TIMEOUT;
use crate::error::Error;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// ALSA capture PCM (none means the sound server's PCM, see `monitor_source`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_device: Option<String>,

    /// Sound server source to record, normally the monitor of the playback sink
    pub monitor_source: String,

    /// Sink whose volume drives the overlay
    pub volume_sink: String,

    /// Timeout for a single packet transfer
    pub transfer_timeout_ms: u64,

    /// How long the volume overlay stays up
    pub overlay_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audio_device: None,
            monitor_source: DEFAULT_MONITOR_SOURCE.to_string(),
            volume_sink: DEFAULT_SINK.to_string(),
            transfer_timeout_ms: TRANSFER_TIMEOUT.as_millis() as u64,
            overlay_timeout_ms: OVERLAY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Settings {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn overlay_timeout(&self) -> Duration {
        Duration::from_millis(self.overlay_timeout_ms)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.monitor_source.is_empty() {
            return Err(Error::Config("monitor_source must not be empty".to_string()));
        }
        if self.transfer_timeout_ms == 0 {
            return Err(Error::Config(
                "transfer_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    settings: Settings,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Load from the user's config directory, falling back to defaults
    pub fn new() -> Result<Self, Error> {
        let mut config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?;
        config_dir.push("lcdscope");

        Self::with_file(config_dir.join("config.toml"))
    }

    /// Create a new ConfigManager with a custom file path
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_file = path.as_ref().to_path_buf();
        let settings = if config_file.exists() {
            Self::load_from_file(&config_file)?
        } else {
            debug!("Config file {:?} not found, using defaults", config_file);
            Settings::default()
        };
        settings.validate()?;

        Ok(Self {
            settings,
            config_file,
        })
    }

    /// Load settings from a TOML file
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Settings, Error> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save settings to the config file
    pub fn save(&self) -> Result<(), Error> {
        let toml = toml::to_string_pretty(&self.settings)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = self.config_file.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        fs::write(&self.config_file, toml)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        debug!("Saved config to {:?}", self.config_file);
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}
