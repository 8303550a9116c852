// Inbound host commands and their acknowledgments

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::session::{Metadata, StatusSnapshot};
use serde::Serialize;
use std::time::Duration;

/// Correlation token pairing a command with its acknowledgment and the
/// notifications it causes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Token(pub String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Verbs the host can issue
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Init(PlayerConfig),
    PlayStream {
        url: String,
        metadata: Option<Metadata>,
        /// Duration hint used until the engine reports one
        estimated_duration: Option<Duration>,
    },
    PlayFile {
        path: String,
        metadata: Option<Metadata>,
        start_position: Duration,
        estimated_duration: Option<Duration>,
    },
    /// Resume a paused session
    Play,
    Pause,
    Stop,
    /// Relative seek in seconds
    Seek(f64),
    /// Absolute seek in seconds
    SeekTo(f64),
    SetAudioInfo(Metadata),
    AudioSavedStatus(bool),
    QueryStatus,
    QueueCompleted,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init(_) => "init",
            Command::PlayStream { .. } => "playStream",
            Command::PlayFile { .. } => "playFile",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::Stop => "stop",
            Command::Seek(_) => "seek",
            Command::SeekTo(_) => "seekTo",
            Command::SetAudioInfo(_) => "setAudioInfo",
            Command::AudioSavedStatus(_) => "audioSavedStatus",
            Command::QueryStatus => "queryStatus",
            Command::QueueCompleted => "queueCompleted",
        }
    }
}

/// Exactly one is delivered per command
#[derive(Debug, Clone, PartialEq)]
pub enum Ack {
    /// Command taken; its outcome arrives as notifications
    Accepted,
    /// `init` result with the session that was already live, if any
    Initialized { current: Option<StatusSnapshot> },
    /// `queryStatus` result
    Status(StatusSnapshot),
    /// Command refused without touching the session
    Rejected(PlayerError),
}

impl Ack {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Ack::Rejected(_))
    }
}
