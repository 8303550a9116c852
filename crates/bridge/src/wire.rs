// Host wire protocol
// Commands arrive as `{"token", "action", "args"}`; acknowledgments and
// notifications leave as JSON objects tagged by `type`. Durations are
// milliseconds on the wire.

use nowplay_core::{
    Ack, Command, InterruptKind, InterruptPhase, Metadata, Notification, PlaybackState,
    PlayerConfig, PlayerError, RemoteButton, RemoteEvent, Result, StatusSnapshot, Token,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Legacy media state for an item that played to its end
pub const LEGACY_COMPLETED: i32 = 6;

/// One host command as posted by the web layer
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub token: String,
    pub action: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PlayerError::InvalidState(format!("malformed request: {}", e)))
    }

    pub fn token(&self) -> Token {
        Token::new(self.token.clone())
    }

    /// Decode the action and its arguments.
    pub fn command(&self) -> Result<Command> {
        let action = self.action.to_ascii_lowercase();
        match action.as_str() {
            "init" => init_config(self.args.first()).map(Command::Init),
            "playstream" => {
                let url = self
                    .args
                    .first()
                    .and_then(stream_url)
                    .ok_or_else(|| PlayerError::InvalidSource("playStream needs a URL".into()))?;
                Ok(Command::PlayStream {
                    url,
                    metadata: self.args.get(1).and_then(stream_metadata),
                    estimated_duration: self.args.get(2).and_then(estimated_duration),
                })
            }
            "playfile" | "playremotefile" => {
                let path = self
                    .args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        PlayerError::InvalidSource(format!("{} needs a path", self.action))
                    })?;
                Ok(Command::PlayFile {
                    path: path.to_string(),
                    metadata: self.args.get(1).and_then(file_metadata),
                    start_position: self.start_position()?,
                    estimated_duration: self.args.get(3).and_then(estimated_duration),
                })
            }
            "play" => Ok(Command::Play),
            "pause" => Ok(Command::Pause),
            "stop" | "hardstop" => Ok(Command::Stop),
            "seek" => self.millis_arg().map(|ms| Command::Seek(ms / 1000.0)),
            "seekto" => self.millis_arg().map(|ms| Command::SeekTo(ms / 1000.0)),
            "setaudioinfo" => Ok(Command::SetAudioInfo(
                self.args
                    .first()
                    .and_then(file_metadata)
                    .unwrap_or_default(),
            )),
            "getaudiostate" => Ok(Command::QueryStatus),
            "audiosavedstatus" => {
                let saved = self.args.first().and_then(flag).ok_or_else(|| {
                    PlayerError::InvalidState("audioSavedStatus needs a boolean".into())
                })?;
                Ok(Command::AudioSavedStatus(saved))
            }
            "queuecompleted" => Ok(Command::QueueCompleted),
            _ => Err(PlayerError::InvalidState(format!(
                "unknown action {}",
                self.action
            ))),
        }
    }

    /// Optional `positionMs`; absent or non-positive starts at zero
    fn start_position(&self) -> Result<Duration> {
        match self.args.get(2).and_then(Value::as_f64) {
            Some(ms) if ms > 0.0 => Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| {
                PlayerError::InvalidState(format!(
                    "{} start position {} out of range",
                    self.action, ms
                ))
            }),
            _ => Ok(Duration::ZERO),
        }
    }

    fn millis_arg(&self) -> Result<f64> {
        self.args
            .first()
            .and_then(Value::as_f64)
            .filter(|ms| ms.is_finite())
            .ok_or_else(|| {
                PlayerError::InvalidState(format!("{} needs milliseconds", self.action))
            })
    }
}

fn init_config(arg: Option<&Value>) -> Result<PlayerConfig> {
    match arg {
        None | Some(Value::Null) => Ok(PlayerConfig::default()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| PlayerError::Configuration(format!("unusable init options: {}", e))),
    }
}

/// Key of the per-platform URL object preferred by this build
#[cfg(target_os = "android")]
const PLATFORM_URL_KEY: &str = "android";
#[cfg(not(target_os = "android"))]
const PLATFORM_URL_KEY: &str = "ios";

fn stream_url(value: &Value) -> Option<String> {
    match value {
        Value::String(url) => Some(url.clone()),
        Value::Object(urls) => [PLATFORM_URL_KEY, "url", "android", "ios"]
            .iter()
            .find_map(|key| urls.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

fn text(info: &Value, key: &str) -> Option<String> {
    info.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn artwork(info: &Value) -> Option<String> {
    info.get("imageThumbnail").and_then(|thumb| text(thumb, "url"))
}

fn some_metadata(metadata: Metadata) -> Option<Metadata> {
    (!metadata.is_empty()).then_some(metadata)
}

/// Station info: `name`, `description`, `imageThumbnail.url`
fn stream_metadata(info: &Value) -> Option<Metadata> {
    some_metadata(Metadata {
        title: text(info, "name"),
        artist: text(info, "description"),
        artwork: artwork(info),
    })
}

/// Item info: `title`, `artist`, `imageThumbnail.url`, with the station keys
/// as fallbacks
fn file_metadata(info: &Value) -> Option<Metadata> {
    some_metadata(Metadata {
        title: text(info, "title").or_else(|| text(info, "name")),
        artist: text(info, "artist").or_else(|| text(info, "description")),
        artwork: artwork(info),
    })
}

/// `audioJson.estimated_duration`, in seconds
fn estimated_duration(audio: &Value) -> Option<Duration> {
    let secs = match audio.get("estimated_duration")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|duration| !duration.is_zero())
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Saturates at `i64::MAX`
fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Unknown durations travel as -1
fn optional_millis(duration: Option<Duration>) -> i64 {
    duration.map_or(-1, millis)
}

/// Snapshot of a session as seen by the web layer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStatus {
    pub state: i32,
    pub description: &'static str,
    pub position: i64,
    pub duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub saved: bool,
}

impl From<&StatusSnapshot> for AudioStatus {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            state: snapshot.state.legacy_code(),
            description: snapshot.state.as_str(),
            position: millis(snapshot.position),
            duration: optional_millis(snapshot.duration),
            source: snapshot.source.clone(),
            metadata: snapshot.metadata.clone(),
            saved: snapshot.saved,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

/// Outbound message
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    Ack {
        token: String,
        status: AckStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<AudioStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    State {
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        state: i32,
        description: &'static str,
        position: i64,
        duration: i64,
    },
    Progress {
        progress: i64,
        duration: i64,
        available: i64,
    },
    Buffering {
        fraction: f32,
    },
    Remote {
        kind: RemoteButton,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        kind: String,
        reason: String,
    },
    Complete {
        state: i32,
    },
    QueueCompleted {
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

fn error_kind(error: &PlayerError) -> String {
    format!("{:?}", error.kind())
}

impl Outbound {
    pub fn ack(token: &Token, ack: &Ack) -> Self {
        let (status, audio, error) = match ack {
            Ack::Accepted => (AckStatus::Ok, None, None),
            Ack::Initialized { current } => {
                (AckStatus::Ok, current.as_ref().map(AudioStatus::from), None)
            }
            Ack::Status(snapshot) => (AckStatus::Ok, Some(AudioStatus::from(snapshot)), None),
            Ack::Rejected(err) => (AckStatus::Error, None, Some(err)),
        };
        Outbound::Ack {
            token: token.to_string(),
            status,
            audio,
            kind: error.map(error_kind),
            reason: error.map(PlayerError::detail),
        }
    }

    pub fn notification(notification: &Notification) -> Self {
        match notification {
            Notification::StateChanged {
                token,
                state,
                position,
                duration,
            } => Outbound::State {
                token: token.as_ref().map(Token::to_string),
                state: state.legacy_code(),
                description: state.as_str(),
                position: millis(*position),
                duration: optional_millis(*duration),
            },
            Notification::Progress { position, duration } => Outbound::Progress {
                progress: millis(*position),
                duration: optional_millis(*duration),
                available: -1,
            },
            Notification::BufferingProgress { fraction } => Outbound::Buffering {
                fraction: *fraction,
            },
            Notification::RemoteControlEvent { kind } => Outbound::Remote { kind: *kind },
            Notification::Error { token, error } => Outbound::Error {
                token: token.as_ref().map(Token::to_string),
                kind: error_kind(error),
                reason: error.detail(),
            },
            Notification::MediaCompleted => Outbound::Complete {
                state: LEGACY_COMPLETED,
            },
            Notification::QueueCompleted { token } => Outbound::QueueCompleted {
                token: token.as_ref().map(Token::to_string),
            },
        }
    }

    pub fn to_json(&self) -> String {
        // Every field is a plain string, number or enum
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Failed to encode outbound message: {}", e);
            String::from("{}")
        })
    }
}

/// Device-side event posted by the platform layer
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum DeviceEvent {
    Button {
        button: RemoteButton,
    },
    Interruption {
        kind: InterruptKind,
        #[serde(flatten)]
        phase: InterruptPhase,
    },
    Connectivity {
        online: bool,
    },
}

pub fn device_event(json: &str) -> Result<RemoteEvent> {
    let event: DeviceEvent = serde_json::from_str(json)
        .map_err(|e| PlayerError::InvalidState(format!("malformed device event: {}", e)))?;
    Ok(match event {
        DeviceEvent::Button { button } => RemoteEvent::Button(button),
        DeviceEvent::Interruption { kind, phase } => RemoteEvent::Interruption { kind, phase },
        DeviceEvent::Connectivity { online } => RemoteEvent::Connectivity { online },
    })
}

/// Messages for the platform's now-playing and audio-session layer
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlatformMessage<'a> {
    AudioSession {
        category: nowplay_core::AudioSessionCategory,
    },
    RemoteControl {
        enabled: bool,
    },
    NowPlaying {
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<&'a Metadata>,
        state: PlaybackState,
        position: i64,
        duration: i64,
    },
    Saved {
        saved: bool,
    },
    ClearNowPlaying,
}

impl<'a> PlatformMessage<'a> {
    pub fn now_playing(
        metadata: Option<&'a Metadata>,
        state: PlaybackState,
        position: Duration,
        duration: Option<Duration>,
    ) -> Self {
        PlatformMessage::NowPlaying {
            metadata,
            state,
            position: millis(position),
            duration: optional_millis(duration),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Failed to encode platform message: {}", e);
            String::from("{}")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nowplay_core::{AudioSessionCategory, EngineFailure};
    use serde_json::json;

    fn request(action: &str, args: Value) -> Request {
        Request::from_json(
            &json!({"token": "cb-1", "action": action, "args": args}).to_string(),
        )
        .unwrap()
    }

    fn encode(outbound: Outbound) -> Value {
        serde_json::from_str(&outbound.to_json()).unwrap()
    }

    #[test]
    fn test_actions_are_case_insensitive() {
        assert_eq!(request("Pause", json!([])).command().unwrap(), Command::Pause);
        assert_eq!(request("GETAUDIOSTATE", json!([])).command().unwrap(), Command::QueryStatus);
        assert_eq!(request("hardStop", json!([])).command().unwrap(), Command::Stop);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = request("rewind", json!([])).command().unwrap_err();
        assert!(matches!(err, PlayerError::InvalidState(ref d) if d.contains("rewind")));
    }

    #[test]
    fn test_missing_args_default_to_empty() {
        let req = Request::from_json(r#"{"token":"t","action":"play"}"#).unwrap();
        assert!(req.args.is_empty());
        assert!(Request::from_json("{not json").is_err());
    }

    #[test]
    fn test_init_options() {
        let cmd = request(
            "init",
            json!([{"remoteControlEnabled": true, "progressIntervalMs": 500}]),
        )
        .command()
        .unwrap();
        match cmd {
            Command::Init(config) => {
                assert!(config.remote_control_enabled);
                assert_eq!(config.progress_interval_ms, 500);
                assert_eq!(config.audio_session_category, AudioSessionCategory::Playback);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            request("init", json!([])).command().unwrap(),
            Command::Init(PlayerConfig::default())
        );
        assert!(matches!(
            request("init", json!([{"progressIntervalMs": "fast"}])).command(),
            Err(PlayerError::Configuration(_))
        ));
    }

    #[test]
    fn test_play_stream_with_station_info() {
        let cmd = request(
            "playstream",
            json!([
                {"android": "https://ex.com/a.aac", "ios": "https://ex.com/i.aac"},
                {"name": "WNYC", "description": "FM", "imageThumbnail": {"url": "https://ex.com/t.png"}},
                {"estimated_duration": 90}
            ]),
        )
        .command()
        .unwrap();

        let expected_url = if cfg!(target_os = "android") {
            "https://ex.com/a.aac"
        } else {
            "https://ex.com/i.aac"
        };
        assert_eq!(
            cmd,
            Command::PlayStream {
                url: expected_url.to_string(),
                metadata: Some(Metadata {
                    title: Some("WNYC".into()),
                    artist: Some("FM".into()),
                    artwork: Some("https://ex.com/t.png".into()),
                }),
                estimated_duration: Some(Duration::from_secs(90)),
            }
        );
    }

    #[test]
    fn test_play_stream_needs_a_url() {
        assert!(matches!(
            request("playStream", json!([{"web": "x"}])).command(),
            Err(PlayerError::InvalidSource(_))
        ));
        let cmd = request("playStream", json!(["https://ex.com/live"])).command().unwrap();
        assert!(matches!(cmd, Command::PlayStream { metadata: None, .. }));
    }

    #[test]
    fn test_play_file_arguments() {
        let cmd = request(
            "playFile",
            json!(["file:///data/ep.mp3?x=1", {"title": "Ep", "artist": "Show"}, 30000, {"estimated_duration": "600"}]),
        )
        .command()
        .unwrap();
        assert_eq!(
            cmd,
            Command::PlayFile {
                path: "file:///data/ep.mp3?x=1".to_string(),
                metadata: Some(Metadata {
                    title: Some("Ep".into()),
                    artist: Some("Show".into()),
                    artwork: None,
                }),
                start_position: Duration::from_secs(30),
                estimated_duration: Some(Duration::from_secs(600)),
            }
        );

        let cmd = request("playRemoteFile", json!(["https://ex.com/ep.mp3", {}])).command().unwrap();
        assert!(matches!(
            cmd,
            Command::PlayFile { metadata: None, start_position, .. } if start_position.is_zero()
        ));
        assert!(request("playFile", json!([])).command().is_err());
    }

    #[test]
    fn test_out_of_range_start_position_is_rejected() {
        let err = request("playFile", json!(["/data/ep.mp3", {}, 1e300]))
            .command()
            .unwrap_err();
        assert!(matches!(err, PlayerError::InvalidState(ref d) if d.contains("out of range")));

        let cmd = request("playFile", json!(["/data/ep.mp3", {}, -2000])).command().unwrap();
        assert!(matches!(cmd, Command::PlayFile { start_position, .. } if start_position.is_zero()));
    }

    #[test]
    fn test_unusable_estimated_duration_is_dropped() {
        let cmd = request(
            "playStream",
            json!(["https://ex.com/live", {}, {"estimated_duration": "1e300"}]),
        )
        .command()
        .unwrap();
        assert!(matches!(cmd, Command::PlayStream { estimated_duration: None, .. }));

        let cmd = request(
            "playFile",
            json!(["/data/ep.mp3", {}, 0, {"estimated_duration": 1e300}]),
        )
        .command()
        .unwrap();
        assert!(matches!(cmd, Command::PlayFile { estimated_duration: None, .. }));

        let cmd = request("playStream", json!(["https://ex.com/live", {}, {"estimated_duration": "NaN"}]))
            .command()
            .unwrap();
        assert!(matches!(cmd, Command::PlayStream { estimated_duration: None, .. }));
    }

    #[test]
    fn test_huge_durations_saturate_on_the_wire() {
        let value = encode(Outbound::notification(&Notification::Progress {
            position: Duration::MAX,
            duration: Some(Duration::MAX),
        }));
        assert_eq!(value["progress"], i64::MAX);
        assert_eq!(value["duration"], i64::MAX);
    }

    #[test]
    fn test_seek_arguments_are_milliseconds() {
        assert_eq!(request("seek", json!([-15000])).command().unwrap(), Command::Seek(-15.0));
        assert_eq!(request("seekTo", json!([2500])).command().unwrap(), Command::SeekTo(2.5));
        assert!(request("seekTo", json!(["soon"])).command().is_err());
    }

    #[test]
    fn test_saved_status_flag() {
        assert_eq!(
            request("audioSavedStatus", json!([true])).command().unwrap(),
            Command::AudioSavedStatus(true)
        );
        assert_eq!(
            request("audioSavedStatus", json!([0])).command().unwrap(),
            Command::AudioSavedStatus(false)
        );
        assert!(request("audioSavedStatus", json!([])).command().is_err());
    }

    #[test]
    fn test_rejected_ack_carries_kind_and_reason() {
        let value = encode(Outbound::ack(
            &Token::new("cb-4"),
            &Ack::Rejected(PlayerError::InvalidState("seek while idle".into())),
        ));
        assert_eq!(
            value,
            json!({
                "type": "ack",
                "token": "cb-4",
                "status": "error",
                "kind": "InvalidStateError",
                "reason": "seek while idle"
            })
        );
    }

    #[test]
    fn test_status_ack_reports_legacy_state() {
        let snapshot = StatusSnapshot {
            state: PlaybackState::Paused,
            position: Duration::from_millis(1500),
            duration: None,
            metadata: None,
            source: Some("https://ex.com/a.mp3".into()),
            saved: true,
        };
        let value = encode(Outbound::ack(&Token::new("cb-2"), &Ack::Status(snapshot)));
        assert_eq!(value["status"], "ok");
        assert_eq!(value["audio"]["state"], 3);
        assert_eq!(value["audio"]["description"], "Paused");
        assert_eq!(value["audio"]["position"], 1500);
        assert_eq!(value["audio"]["duration"], -1);
        assert_eq!(value["audio"]["saved"], true);
    }

    #[test]
    fn test_state_and_progress_messages() {
        let value = encode(Outbound::notification(&Notification::StateChanged {
            token: Some(Token::new("cb-1")),
            state: PlaybackState::Loading,
            position: Duration::ZERO,
            duration: Some(Duration::from_secs(60)),
        }));
        assert_eq!(
            value,
            json!({"type": "state", "token": "cb-1", "state": 5, "description": "Loading", "position": 0, "duration": 60000})
        );

        let value = encode(Outbound::notification(&Notification::Progress {
            position: Duration::from_millis(2500),
            duration: None,
        }));
        assert_eq!(
            value,
            json!({"type": "progress", "progress": 2500, "duration": -1, "available": -1})
        );
    }

    #[test]
    fn test_error_and_completion_messages() {
        let value = encode(Outbound::notification(&Notification::Error {
            token: None,
            error: PlayerError::Engine(EngineFailure::NetworkFailure),
        }));
        assert_eq!(
            value,
            json!({"type": "error", "kind": "EngineError", "reason": "network-failure"})
        );

        assert_eq!(
            encode(Outbound::notification(&Notification::MediaCompleted)),
            json!({"type": "complete", "state": 6})
        );
        assert_eq!(
            encode(Outbound::notification(&Notification::RemoteControlEvent {
                kind: RemoteButton::TogglePlayPause
            })),
            json!({"type": "remote", "kind": "togglePlayPause"})
        );
    }

    #[test]
    fn test_device_events() {
        assert_eq!(
            device_event(r#"{"event":"button","button":"nextTrack"}"#).unwrap(),
            RemoteEvent::Button(RemoteButton::NextTrack)
        );
        assert_eq!(
            device_event(r#"{"event":"interruption","kind":"phone","phase":"began","track":true}"#)
                .unwrap(),
            RemoteEvent::Interruption {
                kind: InterruptKind::Phone,
                phase: InterruptPhase::Began { track: true },
            }
        );
        assert_eq!(
            device_event(r#"{"event":"connectivity","online":false}"#).unwrap(),
            RemoteEvent::Connectivity { online: false }
        );
        assert!(device_event(r#"{"event":"shake"}"#).is_err());
    }

    #[test]
    fn test_platform_now_playing_message() {
        let metadata = Metadata {
            title: Some("Ep".into()),
            ..Default::default()
        };
        let json = PlatformMessage::now_playing(
            Some(&metadata),
            PlaybackState::Playing,
            Duration::from_secs(3),
            None,
        )
        .to_json();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            json!({"type": "nowPlaying", "metadata": {"title": "Ep"}, "state": "Playing", "position": 3000, "duration": -1})
        );
        assert_eq!(PlatformMessage::ClearNowPlaying.to_json(), r#"{"type":"clearNowPlaying"}"#);
    }
}
