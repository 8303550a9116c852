// Core types for the Nowplay playback session controller

pub mod callback;
pub mod command;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod remote;
pub mod runtime;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use callback::{HostCallback, HostDispatcher, Notification};
pub use command::{Ack, Command, Token};
pub use config::{AudioSessionCategory, PlayerConfig};
pub use controller::Controller;
pub use engine::{EngineEvent, EngineEventSink, EngineFailure, MediaEngine};
pub use error::{ErrorKind, PlayerError, Result};
pub use remote::{
    InterruptKind, InterruptPhase, RemoteButton, RemoteControlEventSink, RemoteControlSurface,
    RemoteEvent,
};
pub use runtime::{EventRelay, PlayerHandle};
pub use session::{Metadata, Session, SessionId, Source, StatusSnapshot};
pub use state::PlaybackState;
