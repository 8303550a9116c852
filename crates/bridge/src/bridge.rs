// One player instance as seen by a host

use crate::platform::{JsonHostCallback, MessageSink, PlatformSurface};
use crate::wire::{self, AudioStatus, Outbound, Request};
use nowplay_core::{
    Ack, MediaEngine, PlayerError, PlayerHandle, RemoteControlEventSink, Result,
};
use nowplay_engine::{EngineConfig, SymphoniaEngine};
use std::sync::Arc;
use std::time::Duration;

/// Longest wait for a status snapshot from the session worker
const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// Wires the controller to a host message channel and a platform channel
pub struct NowplayBridge {
    handle: PlayerHandle,
    host: Arc<dyn MessageSink>,
}

impl NowplayBridge {
    /// Bridge around the symphonia engine
    pub fn new(
        config: EngineConfig,
        host: Arc<dyn MessageSink>,
        platform: Arc<dyn MessageSink>,
    ) -> Result<Self> {
        let engine = SymphoniaEngine::new(config)?;
        Self::with_engine(Box::new(engine), host, platform)
    }

    pub fn with_engine(
        engine: Box<dyn MediaEngine>,
        host: Arc<dyn MessageSink>,
        platform: Arc<dyn MessageSink>,
    ) -> Result<Self> {
        let handle = PlayerHandle::spawn(engine, Box::new(PlatformSurface::new(platform)))?;
        // The sampling period set by `init` already paces progress
        handle.add_callback(Arc::new(JsonHostCallback::new(host.clone())), Duration::ZERO);
        Ok(Self { handle, host })
    }

    /// Run one host command. Malformed envelopes are errors; commands with
    /// bad arguments are acknowledged as rejected.
    pub fn execute(&self, json: &str) -> Result<()> {
        let request = Request::from_json(json)?;
        let token = request.token();
        log::debug!("Host action {} [{}]", request.action, token);

        match request.command() {
            Ok(command) => self.handle.submit(token, command),
            Err(err) => {
                log::warn!("Action {} [{}] rejected: {}", request.action, token, err);
                self.host
                    .deliver(&Outbound::ack(&token, &Ack::Rejected(err)).to_json());
                Ok(())
            }
        }
    }

    /// Forward a button press, interruption or connectivity change.
    pub fn device_event(&self, json: &str) -> Result<()> {
        let event = wire::device_event(json)?;
        log::debug!("Device event {:?}", event);
        self.handle.relay().on_remote_event(event);
        Ok(())
    }

    /// Current status as wire JSON
    pub fn status_json(&self) -> Result<String> {
        let snapshot = self.handle.status(STATUS_TIMEOUT).ok_or_else(|| {
            PlayerError::ResourceUnavailable("session worker did not answer".to_string())
        })?;
        serde_json::to_string(&AudioStatus::from(&snapshot))
            .map_err(|e| PlayerError::InvalidState(format!("status encoding failed: {}", e)))
    }

    /// Stop playback and the session worker
    pub fn release(&mut self) {
        self.handle.shutdown();
    }
}
