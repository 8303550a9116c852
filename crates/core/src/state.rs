// Playback session state machine

use serde::Serialize;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    /// No session has been started
    Idle,
    /// Engine is opening and buffering the source
    Loading,
    /// Audio is currently playing
    Playing,
    /// Audio is paused
    Paused,
    /// A position change is in flight
    Seeking,
    /// Session was stopped and discarded
    Stopped,
    /// Session failed and was discarded
    Failed,
}

impl PlaybackState {
    /// `Stopped` and `Failed` end a session.
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackState::Stopped | PlaybackState::Failed)
    }

    /// States in which a session is live.
    pub fn has_session(self) -> bool {
        matches!(
            self,
            PlaybackState::Loading
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Seeking
        )
    }

    /// Legacy numeric media state understood by the web layer:
    /// NONE 0, STARTING 1, RUNNING 2, PAUSED 3, STOPPED 4, LOADING 5, COMPLETED 6
    pub fn legacy_code(self) -> i32 {
        match self {
            PlaybackState::Idle => 0,
            PlaybackState::Loading => 5,
            PlaybackState::Playing => 2,
            PlaybackState::Paused => 3,
            PlaybackState::Seeking => 1,
            PlaybackState::Stopped => 4,
            PlaybackState::Failed => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Loading => "Loading",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Seeking => "Seeking",
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Failed => "Failed",
        }
    }

    /// Whether `self -> to` is an edge of the session state machine.
    pub fn can_transition(self, to: PlaybackState) -> bool {
        use PlaybackState::*;

        match (self, to) {
            // A new session may start from anywhere; live sessions are torn down first
            (_, Loading) => true,

            (Loading, Playing) | (Loading, Paused) => true,

            (Playing, Paused) | (Paused, Playing) => true,

            (Playing, Seeking) | (Paused, Seeking) => true,
            (Seeking, Playing) | (Seeking, Paused) => true,

            // Stop and failure from any live state
            (from, Stopped) | (from, Failed) if from.has_session() => true,

            _ => false,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
