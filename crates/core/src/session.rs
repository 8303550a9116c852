// The single live playback session and the values it carries

use crate::error::{PlayerError, Result};
use crate::state::PlaybackState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Identifies one session; engine events carry it so that events of a
/// torn-down session can be told apart from current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the audio comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Live stream, usually without a known duration
    Stream(String),
    /// Remote file served over HTTP
    RemoteFile(String),
    /// Local file
    File(PathBuf),
}

impl Source {
    /// Validate a stream URL.
    pub fn stream(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PlayerError::InvalidSource("stream URL is empty".into()));
        }
        validate_url(url)?;
        Ok(Source::Stream(url.to_string()))
    }

    /// Validate a file reference. Accepts plain paths, `file://` URIs, and
    /// `http(s)` URLs which are played as remote files.
    pub fn file(path: &str) -> Result<Self> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PlayerError::InvalidSource("file path is empty".into()));
        }

        if has_http_scheme(path) {
            validate_url(path)?;
            return Ok(Source::RemoteFile(path.to_string()));
        }

        let local = path.strip_prefix("file://").unwrap_or(path);
        let local = strip_arguments(local);
        if local.is_empty() {
            return Err(PlayerError::InvalidSource(format!(
                "file path has no name: {}",
                path
            )));
        }
        if local.contains('\0') {
            return Err(PlayerError::InvalidSource("file path contains NUL".into()));
        }
        Ok(Source::File(PathBuf::from(local)))
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, Source::File(_))
    }

    /// Source rendered back as a URI for status reports
    pub fn uri(&self) -> String {
        match self {
            Source::Stream(url) | Source::RemoteFile(url) => url.clone(),
            Source::File(path) => format!("file://{}", path.display()),
        }
    }
}

fn has_http_scheme(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn validate_url(url: &str) -> Result<()> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| PlayerError::InvalidSource(format!("missing scheme: {}", url)))?;

    let scheme_ok = scheme
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        return Err(PlayerError::InvalidSource(format!("bad scheme: {}", url)));
    }
    if rest.is_empty() || (rest.starts_with('/') && scheme != "file") {
        return Err(PlayerError::InvalidSource(format!("missing host: {}", url)));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(PlayerError::InvalidSource(format!("whitespace in URL: {}", url)));
    }
    Ok(())
}

/// Drop a trailing `?query` from a file name
fn strip_arguments(path: &str) -> &str {
    match path.rfind('?') {
        Some(q) => &path[..q],
        None => path,
    }
}

/// Now-playing metadata of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.artwork.is_none()
    }
}

/// Live playback context owned by the controller
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) source: Source,
    pub(crate) state: PlaybackState,
    pub(crate) position: Duration,
    pub(crate) duration: Option<Duration>,
    pub(crate) pending_seek: Option<Duration>,
    /// State to return to once a seek completes
    pub(crate) resume_state: PlaybackState,
    pub(crate) metadata: Option<Metadata>,
    pub(crate) saved: bool,
    /// Enter `Paused` instead of `Playing` once the engine is ready
    pub(crate) start_paused: bool,
}

impl Session {
    pub(crate) fn new(id: SessionId, source: Source, metadata: Option<Metadata>) -> Self {
        Self {
            id,
            source,
            state: PlaybackState::Loading,
            position: Duration::ZERO,
            duration: None,
            pending_seek: None,
            resume_state: PlaybackState::Playing,
            metadata: metadata.filter(|m| !m.is_empty()),
            saved: false,
            start_paused: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn pending_seek(&self) -> Option<Duration> {
        self.pending_seek
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn saved(&self) -> bool {
        self.saved
    }

    pub(crate) fn set_state(&mut self, new_state: PlaybackState) {
        if !self.state.can_transition(new_state) {
            log::warn!(
                "Session {} unexpected transition {:?} -> {:?}",
                self.id,
                self.state,
                new_state
            );
        }
        log::debug!("Session {} state {:?} -> {:?}", self.id, self.state, new_state);
        self.state = new_state;
    }

    /// Clamp a requested position into `[0, duration]`. Without a known
    /// duration only the lower bound applies and the engine clamps the rest.
    pub fn clamp_target(&self, target_secs: f64) -> Duration {
        clamp_position(target_secs, self.duration)
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            position: self.position,
            duration: self.duration,
            metadata: self.metadata.clone(),
            source: Some(self.source.uri()),
            saved: self.saved,
        }
    }
}

/// Clamp `target_secs` into `[0, duration]`
pub fn clamp_position(target_secs: f64, duration: Option<Duration>) -> Duration {
    if target_secs.is_nan() || target_secs <= 0.0 {
        return Duration::ZERO;
    }
    let target = Duration::try_from_secs_f64(target_secs).unwrap_or(Duration::MAX);
    match duration {
        Some(total) => target.min(total),
        None => target,
    }
}

/// Read-only view of the controller for `queryStatus`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: PlaybackState,
    #[serde(serialize_with = "as_millis")]
    pub position: Duration,
    #[serde(serialize_with = "as_optional_millis")]
    pub duration: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub saved: bool,
}

impl StatusSnapshot {
    pub(crate) fn without_session(state: PlaybackState) -> Self {
        Self {
            state,
            position: Duration::ZERO,
            duration: None,
            metadata: None,
            source: None,
            saved: false,
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
fn saturating_millis(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}

fn as_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(saturating_millis(*value))
}

fn as_optional_millis<S: serde::Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&saturating_millis(*d)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_source_validation() {
        assert_eq!(
            Source::stream("https://ex.com/a.mp3").unwrap(),
            Source::Stream("https://ex.com/a.mp3".into())
        );
        assert!(matches!(Source::stream(""), Err(PlayerError::InvalidSource(_))));
        assert!(matches!(Source::stream("   "), Err(PlayerError::InvalidSource(_))));
        assert!(matches!(Source::stream("ex.com/a.mp3"), Err(PlayerError::InvalidSource(_))));
        assert!(matches!(Source::stream("https://"), Err(PlayerError::InvalidSource(_))));
        assert!(matches!(Source::stream("1http://x"), Err(PlayerError::InvalidSource(_))));
        assert!(matches!(
            Source::stream("https://ex.com/a b.mp3"),
            Err(PlayerError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_file_source_normalization() {
        assert_eq!(
            Source::file("/local/a.mp3").unwrap(),
            Source::File(PathBuf::from("/local/a.mp3"))
        );
        assert_eq!(
            Source::file("file:///local/a.mp3?token=1").unwrap(),
            Source::File(PathBuf::from("/local/a.mp3"))
        );
        assert_eq!(
            Source::file("https://ex.com/ep1.mp3").unwrap(),
            Source::RemoteFile("https://ex.com/ep1.mp3".into())
        );
        assert!(matches!(Source::file(""), Err(PlayerError::InvalidSource(_))));
        assert!(matches!(Source::file("?x=1"), Err(PlayerError::InvalidSource(_))));
    }

    #[test]
    fn test_clamp_with_known_duration() {
        let total = Some(Duration::from_secs(100));
        assert_eq!(clamp_position(150.0, total), Duration::from_secs(100));
        assert_eq!(clamp_position(-10.0, total), Duration::ZERO);
        assert_eq!(clamp_position(42.5, total), Duration::from_millis(42_500));
        assert_eq!(clamp_position(f64::NAN, total), Duration::ZERO);
        assert_eq!(clamp_position(f64::INFINITY, total), Duration::from_secs(100));
    }

    #[test]
    fn test_clamp_without_duration() {
        assert_eq!(clamp_position(150.0, None), Duration::from_secs(150));
        assert_eq!(clamp_position(-1.0, None), Duration::ZERO);
    }

    #[test]
    fn test_unbounded_seek_target_serializes_saturated() {
        let mut snapshot = StatusSnapshot::without_session(PlaybackState::Paused);
        snapshot.position = clamp_position(f64::INFINITY, None);
        snapshot.duration = Some(Duration::MAX);
        assert_eq!(snapshot.position, Duration::MAX);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["position"], u64::MAX);
        assert_eq!(value["duration"], u64::MAX);
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
    }

    #[test]
    fn test_empty_metadata_is_dropped() {
        let session = Session::new(
            SessionId(1),
            Source::File(PathBuf::from("/a.mp3")),
            Some(Metadata::default()),
        );
        assert!(session.metadata().is_none());
        assert_eq!(session.state(), PlaybackState::Loading);
    }
}
