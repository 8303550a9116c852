// Host and platform message channels
// Both directions out of the bridge are JSON strings handed to a sink; the
// platform side owns the actual now-playing display and audio session.

use crate::wire::{Outbound, PlatformMessage};
use nowplay_core::{
    Ack, AudioSessionCategory, HostCallback, Metadata, Notification, PlaybackState, PlayerError,
    RemoteControlEventSink, RemoteControlSurface, Result, Token,
};
use std::sync::Arc;
use std::time::Duration;

/// Receives outbound JSON. Returns 0 when the message was taken.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, json: &str) -> i32;
}

/// Renders acknowledgments and notifications for the web layer
pub struct JsonHostCallback {
    sink: Arc<dyn MessageSink>,
}

impl JsonHostCallback {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    fn post(&self, message: Outbound) {
        let status = self.sink.deliver(&message.to_json());
        if status != 0 {
            log::warn!("Host dropped message ({}): {:?}", status, message);
        }
    }
}

impl HostCallback for JsonHostCallback {
    fn on_ack(&self, token: &Token, ack: Ack) {
        self.post(Outbound::ack(token, &ack));
    }

    fn on_notification(&self, notification: Notification) {
        self.post(Outbound::notification(&notification));
    }
}

/// Remote-control surface that forwards to the platform layer. Device events
/// flow back through the bridge, not through this surface.
pub struct PlatformSurface {
    sink: Arc<dyn MessageSink>,
}

impl PlatformSurface {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    fn post(&self, message: &PlatformMessage<'_>) -> i32 {
        self.sink.deliver(&message.to_json())
    }

    /// Capability requests fail when the platform answers non-zero
    fn request(&self, message: PlatformMessage<'_>, what: &str) -> Result<()> {
        match self.post(&message) {
            0 => Ok(()),
            status => Err(PlayerError::ResourceUnavailable(format!(
                "platform denied {} ({})",
                what, status
            ))),
        }
    }
}

impl RemoteControlSurface for PlatformSurface {
    fn attach(&mut self, _sink: Arc<dyn RemoteControlEventSink>) {
        log::debug!("Platform surface attached");
    }

    fn configure_audio_session(&mut self, category: AudioSessionCategory) -> Result<()> {
        self.request(PlatformMessage::AudioSession { category }, "audio session")
    }

    fn set_remote_control_enabled(&mut self, enabled: bool) -> Result<()> {
        self.request(PlatformMessage::RemoteControl { enabled }, "remote control")
    }

    fn update_now_playing(
        &mut self,
        metadata: Option<&Metadata>,
        state: PlaybackState,
        position: Duration,
        duration: Option<Duration>,
    ) {
        self.post(&PlatformMessage::now_playing(metadata, state, position, duration));
    }

    fn set_saved(&mut self, saved: bool) {
        self.post(&PlatformMessage::Saved { saved });
    }

    fn clear_now_playing(&mut self) {
        self.post(&PlatformMessage::ClearNowPlaying);
    }
}

/// Sink that keeps messages in memory, for tests
#[cfg(test)]
pub(crate) struct MemorySink {
    pub messages: parking_lot::Mutex<Vec<String>>,
    pub status: i32,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Arc<Self> {
        Self::answering(0)
    }

    pub fn answering(status: i32) -> Arc<Self> {
        Arc::new(Self {
            messages: parking_lot::Mutex::new(Vec::new()),
            status,
        })
    }

    pub fn values(&self) -> Vec<serde_json::Value> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .collect()
    }
}

#[cfg(test)]
impl MessageSink for MemorySink {
    fn deliver(&self, json: &str) -> i32 {
        self.messages.lock().push(json.to_string());
        self.status
    }
}
