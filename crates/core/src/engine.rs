// Media engine boundary

use crate::error::Result;
use crate::session::{SessionId, Source};
use std::sync::Arc;
use std::time::Duration;

/// Failure classes reported by an engine. The display string is the detail
/// the host sees in its `error` notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineFailure {
    #[error("network-failure")]
    NetworkFailure,
    #[error("decode-failure")]
    DecodeFailure,
    #[error("unsupported-format")]
    UnsupportedFormat,
    #[error("{0}")]
    Other(String),
}

/// Events emitted by an engine for one session
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Source opened and buffered enough to start
    Ready { duration: Option<Duration> },
    /// Buffering progress (0.0 - 1.0)
    Buffering { fraction: f32 },
    /// Current playback position
    PositionTick { position: Duration },
    /// Position change finished at `position`
    SeekComplete { position: Duration },
    /// Source played to its end
    EndOfMedia,
    /// Fatal failure; the engine session is unusable
    Error(EngineFailure),
}

/// Receives engine events. Implementations must not block; events may come
/// from any thread.
pub trait EngineEventSink: Send + Sync {
    fn on_engine_event(&self, session: SessionId, event: EngineEvent);
}

/// Media engine driven by the controller.
/// Every operation is expected to return quickly; buffering, network and
/// disk I/O happen on the engine's own threads and report back through the
/// attached sink.
pub trait MediaEngine: Send {
    /// Install the sink that receives this engine's events
    fn attach(&mut self, sink: Arc<dyn EngineEventSink>);

    /// Open `source` for `session` and start buffering from `start_at`.
    /// Playback does not begin until `play`.
    fn open(&mut self, session: SessionId, source: &Source, start_at: Duration) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Request a position change; completion is reported with `SeekComplete`
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Latest known position, used by the sampling timer
    fn position(&self) -> Option<Duration>;

    /// Tear down the current engine session and release its resources
    fn close(&mut self);
}
