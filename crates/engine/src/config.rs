// Engine configuration

use nowplay_core::{PlayerError, Result};
use nowplay_transport_http::HttpConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub http: HttpConfig,
    /// Period of `PositionTick` events while playing
    pub tick_interval_ms: u64,
    /// Consecutive undecodable packets tolerated before the session fails
    pub max_decode_errors: u32,
    /// Audio queued ahead of the output device
    pub output_buffer_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            tick_interval_ms: 250,
            max_decode_errors: 16,
            output_buffer_ms: 2000,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        if self.tick_interval_ms == 0 {
            return Err(PlayerError::Configuration(
                "tickIntervalMs must be positive".to_string(),
            ));
        }
        if !(100..=30_000).contains(&self.output_buffer_ms) {
            return Err(PlayerError::Configuration(format!(
                "outputBufferMs must be within 100..=30000, got {}",
                self.output_buffer_ms
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
