//! Configuration loading for the scheduler
//!
//! Resolution priority, highest first:
//! 1. Explicit path handed in by the host
//! 2. `TRACKSYNC_CONFIG` environment variable
//! 3. Platform config directory (`<config-dir>/tracksync/config.toml`)
//! 4. Compiled defaults
//!
//! Every field has a default, so a partial (or absent) config file is fine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tunables for the queue sync scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between in-progress position writes for long-form content
    pub position_save_interval_secs: u64,

    /// Tolerance before the end of a track at which it counts as completed
    pub end_buffer_secs: f64,

    /// Resolution retries per track before it is treated as permanently
    /// unresolvable
    pub max_resolution_retries: u32,

    /// Buffer size of the consumer-facing event broadcast channel
    pub event_channel_capacity: usize,

    /// Seconds moved by remote jump-forward/jump-backward commands
    pub jump_interval_secs: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            position_save_interval_secs: 10,
            end_buffer_secs: 2.0,
            max_resolution_retries: 3,
            event_channel_capacity: 100,
            jump_interval_secs: 15.0,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration following the documented priority order
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var("TRACKSYNC_CONFIG") {
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        if self.position_save_interval_secs == 0 {
            return Err(Error::Config(
                "position_save_interval_secs must be positive".to_string(),
            ));
        }
        if self.end_buffer_secs < 0.0 {
            return Err(Error::Config(
                "end_buffer_secs must not be negative".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Config(
                "event_channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform config file location (`~/.config/tracksync/config.toml` on Linux)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tracksync").join("config.toml"))
}
