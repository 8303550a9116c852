// Remote-control / now-playing surface

use crate::config::AudioSessionCategory;
use crate::error::Result;
use crate::session::Metadata;
use crate::state::PlaybackState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Hardware or lock-screen control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteButton {
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    SkipForward,
    SkipBackward,
    NextTrack,
    PreviousTrack,
}

/// Source of an audio interruption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterruptKind {
    Phone,
    Headset,
    OtherApp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum InterruptPhase {
    /// `track`: remember the interruption and hold playback until it ends;
    /// otherwise the session is stopped.
    Began { track: bool },
    /// `restart`: resume if no other interruption is pending
    Ended { restart: bool },
}

/// Events forwarded by the device surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEvent {
    Button(RemoteButton),
    Interruption {
        kind: InterruptKind,
        phase: InterruptPhase,
    },
    Connectivity { online: bool },
}

/// Receives remote-control and device events. Must not block.
pub trait RemoteControlEventSink: Send + Sync {
    fn on_remote_event(&self, event: RemoteEvent);
}

/// Now-playing display and audio-session capabilities of the host device
pub trait RemoteControlSurface: Send {
    /// Install the sink that receives button presses and device events
    fn attach(&mut self, sink: Arc<dyn RemoteControlEventSink>);

    /// Activate the audio session with `category`
    fn configure_audio_session(&mut self, category: AudioSessionCategory) -> Result<()>;

    /// Start or stop receiving remote-control events
    fn set_remote_control_enabled(&mut self, enabled: bool) -> Result<()>;

    /// Publish now-playing information
    fn update_now_playing(
        &mut self,
        metadata: Option<&Metadata>,
        state: PlaybackState,
        position: Duration,
        duration: Option<Duration>,
    );

    /// Whether the current item is saved in the user's library
    fn set_saved(&mut self, saved: bool);

    /// Remove now-playing information
    fn clear_now_playing(&mut self);
}
