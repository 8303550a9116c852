// Player configuration supplied by the host on `init`

use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest accepted position sampling period
pub const MIN_PROGRESS_INTERVAL_MS: u64 = 100;

/// Longest accepted position sampling period
pub const MAX_PROGRESS_INTERVAL_MS: u64 = 60_000;

/// Audio session category requested from the host OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioSessionCategory {
    #[default]
    Playback,
    PlayAndRecord,
    Ambient,
    SoloAmbient,
}

/// Options recognized by `init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerConfig {
    /// Register for lock-screen / hardware remote-control events
    pub remote_control_enabled: bool,
    pub audio_session_category: AudioSessionCategory,
    /// Period of the position sampling timer while a session is live
    pub progress_interval_ms: u64,
    /// Resume once the last tracked interruption ends with `restart`
    pub resume_after_interruption: bool,
    /// Resume a remote source paused by a connectivity loss
    pub resume_on_reconnect: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            remote_control_enabled: false,
            audio_session_category: AudioSessionCategory::Playback,
            progress_interval_ms: 1000,
            resume_after_interruption: true,
            resume_on_reconnect: true,
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PROGRESS_INTERVAL_MS..=MAX_PROGRESS_INTERVAL_MS).contains(&self.progress_interval_ms) {
            return Err(PlayerError::Configuration(format!(
                "progressIntervalMs must be within {}..={}, got {}",
                MIN_PROGRESS_INTERVAL_MS, MAX_PROGRESS_INTERVAL_MS, self.progress_interval_ms
            )));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
