// Playback session controller
// Owns the single live session and is its only writer. Every entry point
// takes `&mut self`; the runtime serializes commands and callbacks onto one
// thread before they reach it.

use crate::callback::{HostDispatcher, Notification};
use crate::command::{Ack, Command, Token};
use crate::config::PlayerConfig;
use crate::engine::{EngineEvent, MediaEngine};
use crate::error::{PlayerError, Result};
use crate::remote::{
    InterruptKind, InterruptPhase, RemoteButton, RemoteControlSurface, RemoteEvent,
};
use crate::session::{Metadata, Session, SessionId, Source, StatusSnapshot};
use crate::state::PlaybackState;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub struct Controller {
    engine: Box<dyn MediaEngine>,
    remote: Box<dyn RemoteControlSurface>,
    host: Arc<HostDispatcher>,
    config: PlayerConfig,
    initialized: bool,
    remote_enabled: bool,
    session: Option<Session>,
    /// Reported state while no session is live
    idle_state: PlaybackState,
    last_session_id: u64,
    pending_interrupts: HashSet<InterruptKind>,
    online: bool,
    paused_by_network: bool,
    /// Notifications of the current turn, flushed after the acknowledgment
    outbox: Vec<Notification>,
}

impl Controller {
    pub fn new(
        engine: Box<dyn MediaEngine>,
        remote: Box<dyn RemoteControlSurface>,
        host: Arc<HostDispatcher>,
    ) -> Self {
        log::info!("Controller::new");
        Self {
            engine,
            remote,
            host,
            config: PlayerConfig::default(),
            initialized: false,
            remote_enabled: false,
            session: None,
            idle_state: PlaybackState::Idle,
            last_session_id: 0,
            pending_interrupts: HashSet::new(),
            online: true,
            paused_by_network: false,
            outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.session
            .as_ref()
            .map_or(self.idle_state, |session| session.state)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        match &self.session {
            Some(session) => session.snapshot(),
            None => StatusSnapshot::without_session(self.idle_state),
        }
    }

    /// Session the position sampling timer should run for
    pub fn sampling_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.id)
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Execute one host command and acknowledge it exactly once.
    pub fn handle_command(&mut self, token: Token, command: Command) {
        log::info!("Command {} [{}] in {:?}", command.name(), token, self.state());

        let ack = match self.execute(&token, command) {
            Ok(ack) => ack,
            Err(err) => {
                log::warn!("Command [{}] rejected: {}", token, err);
                Ack::Rejected(err)
            }
        };
        self.host.acknowledge(&token, ack);
        self.flush();
    }

    fn execute(&mut self, token: &Token, command: Command) -> Result<Ack> {
        match command {
            Command::Init(config) => self.init(config),
            Command::PlayStream {
                url,
                metadata,
                estimated_duration,
            } => {
                let source = Source::stream(&url)?;
                self.start_session(token, source, metadata, Duration::ZERO, estimated_duration)?;
                Ok(Ack::Accepted)
            }
            Command::PlayFile {
                path,
                metadata,
                start_position,
                estimated_duration,
            } => {
                let source = Source::file(&path)?;
                self.start_session(token, source, metadata, start_position, estimated_duration)?;
                Ok(Ack::Accepted)
            }
            Command::Play => {
                self.resume(Some(token.clone()), true);
                Ok(Ack::Accepted)
            }
            Command::Pause => {
                self.pause(Some(token.clone()));
                Ok(Ack::Accepted)
            }
            Command::Stop => {
                self.stop_session(Some(token.clone()));
                Ok(Ack::Accepted)
            }
            Command::Seek(delta_secs) => {
                let base = self
                    .session
                    .as_ref()
                    .map_or(0.0, |session| session.position.as_secs_f64());
                self.seek_to(token, base + delta_secs)
            }
            Command::SeekTo(position_secs) => self.seek_to(token, position_secs),
            Command::SetAudioInfo(metadata) => {
                self.set_audio_info(metadata);
                Ok(Ack::Accepted)
            }
            Command::AudioSavedStatus(saved) => {
                if let Some(session) = self.session.as_mut() {
                    session.saved = saved;
                    self.remote.set_saved(saved);
                }
                Ok(Ack::Accepted)
            }
            Command::QueryStatus => Ok(Ack::Status(self.snapshot())),
            Command::QueueCompleted => {
                log::info!("Host queue completed");
                if self.session.is_none() {
                    self.remote.clear_now_playing();
                }
                self.notify(Notification::QueueCompleted {
                    token: Some(token.clone()),
                });
                Ok(Ack::Accepted)
            }
        }
    }

    fn init(&mut self, config: PlayerConfig) -> Result<Ack> {
        if let Some(session) = &self.session {
            log::info!("init with live session {}; configuration unchanged", session.id);
            return Ok(Ack::Initialized {
                current: Some(session.snapshot()),
            });
        }

        config.validate()?;
        self.remote
            .configure_audio_session(config.audio_session_category)?;
        if !self.initialized || config.remote_control_enabled != self.remote_enabled {
            self.remote
                .set_remote_control_enabled(config.remote_control_enabled)?;
            self.remote_enabled = config.remote_control_enabled;
        }

        log::info!("Initialized with {:?}", config);
        self.config = config;
        self.initialized = true;
        Ok(Ack::Initialized { current: None })
    }

    fn start_session(
        &mut self,
        token: &Token,
        source: Source,
        metadata: Option<Metadata>,
        start_at: Duration,
        estimated_duration: Option<Duration>,
    ) -> Result<()> {
        if source.is_remote() && !self.online {
            return Err(PlayerError::ResourceUnavailable(
                "no network connection".to_string(),
            ));
        }

        // Exactly one teardown of the previous session before the next one exists
        if self.session.is_some() {
            log::info!("Replacing live session");
            self.stop_session(Some(token.clone()));
        }

        self.last_session_id += 1;
        let id = SessionId(self.last_session_id);
        let mut session = Session::new(id, source.clone(), metadata);
        session.position = start_at;
        session.duration = estimated_duration;
        if !self.pending_interrupts.is_empty() {
            session.start_paused = true;
        }

        log::info!("Session {} loading {}", id, source.uri());
        self.session = Some(session);
        self.emit_state(Some(token.clone()));
        self.refresh_now_playing();

        if let Err(err) = self.engine.open(id, &source, start_at) {
            log::error!("Engine failed to open {}: {}", source.uri(), err);
            self.fail_session(err, Some(token.clone()));
        }
        Ok(())
    }

    fn resume(&mut self, token: Option<Token>, user_initiated: bool) {
        if user_initiated {
            self.pending_interrupts.clear();
            self.paused_by_network = false;
        }

        match self.state() {
            PlaybackState::Paused => {
                if let Err(err) = self.engine.play() {
                    return self.fail_session(err, token);
                }
                self.transition(PlaybackState::Playing, token);
            }
            PlaybackState::Seeking => {
                let was_paused = self
                    .session
                    .as_ref()
                    .map_or(false, |s| s.resume_state == PlaybackState::Paused);
                if was_paused {
                    if let Some(session) = self.session.as_mut() {
                        session.resume_state = PlaybackState::Playing;
                    }
                    if let Err(err) = self.engine.play() {
                        self.fail_session(err, token);
                    }
                }
            }
            PlaybackState::Loading => {
                if let Some(session) = self.session.as_mut() {
                    session.start_paused = false;
                }
            }
            state => log::debug!("play ignored in {:?}", state),
        }
    }

    fn pause(&mut self, token: Option<Token>) {
        match self.state() {
            PlaybackState::Playing => {
                if let Err(err) = self.engine.pause() {
                    return self.fail_session(err, token);
                }
                self.transition(PlaybackState::Paused, token);
            }
            PlaybackState::Seeking => {
                if let Some(session) = self.session.as_mut() {
                    session.resume_state = PlaybackState::Paused;
                }
                if let Err(err) = self.engine.pause() {
                    self.fail_session(err, token);
                }
            }
            PlaybackState::Loading => {
                if let Some(session) = self.session.as_mut() {
                    session.start_paused = true;
                }
            }
            state => log::debug!("pause ignored in {:?}", state),
        }
    }

    fn seek_to(&mut self, token: &Token, target_secs: f64) -> Result<Ack> {
        let state = self.state();
        if !matches!(state, PlaybackState::Playing | PlaybackState::Paused) {
            return Err(PlayerError::InvalidState(format!(
                "cannot seek while {}",
                state
            )));
        }
        let Some(session) = self.session.as_mut() else {
            return Err(PlayerError::InvalidState("no session".to_string()));
        };

        let target = session.clamp_target(target_secs);
        log::info!("Session {} seek to {:?} (requested {:.3}s)", session.id, target, target_secs);
        session.resume_state = state;
        session.pending_seek = Some(target);
        session.set_state(PlaybackState::Seeking);

        if let Err(err) = self.engine.seek(target) {
            self.fail_session(err, Some(token.clone()));
        }
        Ok(Ack::Accepted)
    }

    fn set_audio_info(&mut self, metadata: Metadata) {
        let Some(session) = self.session.as_mut() else {
            log::debug!("setAudioInfo without a session");
            return;
        };
        session.metadata = Some(metadata).filter(|m| !m.is_empty());
        self.refresh_now_playing();
    }

    // -------------------------------------------------------------------------
    // Engine events
    // -------------------------------------------------------------------------

    pub fn handle_engine_event(&mut self, id: SessionId, event: EngineEvent) {
        let current = self.session.as_ref().map(|session| session.id);
        if current != Some(id) {
            log::debug!("Dropping {:?} for stale session {}", event, id);
            return;
        }

        match event {
            EngineEvent::Ready { duration } => self.on_ready(duration),
            EngineEvent::Buffering { fraction } => {
                self.notify(Notification::BufferingProgress {
                    fraction: fraction.clamp(0.0, 1.0),
                });
            }
            EngineEvent::PositionTick { position } => {
                if let Some(session) = self.session.as_mut() {
                    // Ticks racing a seek still carry the old position
                    if session.state != PlaybackState::Seeking {
                        session.position = position;
                    }
                }
            }
            EngineEvent::SeekComplete { position } => self.on_seek_complete(position),
            EngineEvent::EndOfMedia => {
                log::info!("Session {} reached end of media", id);
                self.stop_session(None);
                self.notify(Notification::MediaCompleted);
            }
            EngineEvent::Error(failure) => self.fail_session(failure.into(), None),
        }
        self.flush();
    }

    fn on_ready(&mut self, duration: Option<Duration>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if duration.is_some() {
            session.duration = duration;
        }
        if session.state != PlaybackState::Loading {
            return;
        }

        if session.start_paused || !self.pending_interrupts.is_empty() {
            log::info!("Session {} ready, holding paused", session.id);
            self.transition(PlaybackState::Paused, None);
            return;
        }
        if let Err(err) = self.engine.play() {
            return self.fail_session(err, None);
        }
        self.transition(PlaybackState::Playing, None);
    }

    fn on_seek_complete(&mut self, position: Duration) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state != PlaybackState::Seeking {
            log::debug!("Seek completion outside of Seeking ignored");
            return;
        }
        session.position = position;
        session.pending_seek = None;
        let back = session.resume_state;
        self.transition(back, None);
    }

    // -------------------------------------------------------------------------
    // Remote control and device events
    // -------------------------------------------------------------------------

    pub fn handle_remote_event(&mut self, event: RemoteEvent) {
        log::debug!("Remote event {:?} in {:?}", event, self.state());
        match event {
            RemoteEvent::Button(button) => {
                self.notify(Notification::RemoteControlEvent { kind: button });
                match button {
                    RemoteButton::Play => self.resume(None, true),
                    RemoteButton::Pause => self.pause(None),
                    RemoteButton::TogglePlayPause => {
                        if self.state() == PlaybackState::Playing {
                            self.pause(None);
                        } else {
                            self.resume(None, true);
                        }
                    }
                    RemoteButton::Stop => self.stop_session(None),
                    // Queue navigation belongs to the host
                    _ => {}
                }
            }
            RemoteEvent::Interruption {
                kind,
                phase: InterruptPhase::Began { track },
            } => self.interruption_began(kind, track),
            RemoteEvent::Interruption {
                kind,
                phase: InterruptPhase::Ended { restart },
            } => self.interruption_ended(kind, restart),
            RemoteEvent::Connectivity { online } => self.connectivity_changed(online),
        }
        self.flush();
    }

    fn interruption_began(&mut self, kind: InterruptKind, track: bool) {
        if self.pending_interrupts.contains(&kind) {
            return;
        }
        match self.state() {
            PlaybackState::Playing | PlaybackState::Seeking | PlaybackState::Loading => {
                log::info!("Audio interrupted by {:?} (tracked: {})", kind, track);
                if track {
                    self.pending_interrupts.insert(kind);
                    self.pause(None);
                } else {
                    self.stop_session(None);
                }
            }
            _ => {}
        }
    }

    fn interruption_ended(&mut self, kind: InterruptKind, restart: bool) {
        if !self.pending_interrupts.remove(&kind) {
            return;
        }
        if !self.pending_interrupts.is_empty() {
            log::info!("Interruption {:?} over, others still pending", kind);
            return;
        }
        if restart && self.config.resume_after_interruption {
            log::info!("Interruption {:?} over, resuming", kind);
            self.resume(None, false);
        }
    }

    fn connectivity_changed(&mut self, online: bool) {
        self.online = online;
        let remote_source = self
            .session
            .as_ref()
            .map_or(false, |session| session.source.is_remote());

        if !online {
            if remote_source && self.state() == PlaybackState::Playing {
                log::info!("Connection lost, pausing remote source");
                self.pause(None);
                self.paused_by_network = true;
            }
        } else if self.paused_by_network {
            self.paused_by_network = false;
            if self.config.resume_on_reconnect {
                log::info!("Connection back, resuming");
                self.resume(None, false);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Position sampling
    // -------------------------------------------------------------------------

    /// Timer tick: refresh the position from the engine and publish it
    pub fn sample_position(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state != PlaybackState::Playing {
            return;
        }
        if let Some(position) = self.engine.position() {
            session.position = position;
        }
        let notification = Notification::Progress {
            position: session.position,
            duration: session.duration,
        };
        self.notify(notification);
        self.flush();
    }

    /// Release the engine without notifying the host
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("Shutting down with live session {}", session.id);
            self.engine.close();
            self.remote.clear_now_playing();
        }
    }

    // -------------------------------------------------------------------------
    // Session lifecycle helpers
    // -------------------------------------------------------------------------

    fn stop_session(&mut self, token: Option<Token>) {
        let Some(mut session) = self.session.take() else {
            log::debug!("stop without a live session");
            return;
        };
        self.engine.close();
        session.set_state(PlaybackState::Stopped);
        self.idle_state = PlaybackState::Stopped;
        self.pending_interrupts.clear();
        self.paused_by_network = false;

        log::info!("Session {} stopped", session.id);
        self.remote.update_now_playing(
            session.metadata.as_ref(),
            PlaybackState::Stopped,
            session.position,
            session.duration,
        );
        self.notify(Notification::StateChanged {
            token,
            state: PlaybackState::Stopped,
            position: session.position,
            duration: session.duration,
        });
    }

    fn fail_session(&mut self, error: PlayerError, token: Option<Token>) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.engine.close();
        session.set_state(PlaybackState::Failed);
        self.idle_state = PlaybackState::Failed;
        self.paused_by_network = false;

        log::error!("Session {} failed: {}", session.id, error);
        self.remote.clear_now_playing();
        self.notify(Notification::Error { token, error });
    }

    fn transition(&mut self, to: PlaybackState, token: Option<Token>) {
        if let Some(session) = self.session.as_mut() {
            session.set_state(to);
        }
        self.emit_state(token);
        self.refresh_now_playing();
    }

    fn emit_state(&mut self, token: Option<Token>) {
        let Some(session) = &self.session else {
            return;
        };
        let notification = Notification::StateChanged {
            token,
            state: session.state,
            position: session.position,
            duration: session.duration,
        };
        self.notify(notification);
    }

    fn refresh_now_playing(&mut self) {
        if let Some(session) = &self.session {
            self.remote.update_now_playing(
                session.metadata.as_ref(),
                session.state,
                session.position,
                session.duration,
            );
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    fn flush(&mut self) {
        for notification in self.outbox.drain(..) {
            self.host.notify(notification);
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
