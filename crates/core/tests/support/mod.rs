// Recording collaborators shared by the integration tests

#![allow(dead_code)]

use nowplay_core::{
    Ack, AudioSessionCategory, Controller, EngineEvent, EngineEventSink, HostCallback,
    HostDispatcher, MediaEngine, Metadata, Notification, PlaybackState, PlayerError,
    RemoteControlEventSink, RemoteControlSurface, SessionId, Source, Token,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Open(SessionId, Source, Duration),
    Play,
    Pause,
    Seek(Duration),
    Close,
}

#[derive(Default)]
pub struct EngineSpy {
    pub calls: Mutex<Vec<EngineCall>>,
    pub position: Mutex<Option<Duration>>,
    pub fail_open: Mutex<Option<PlayerError>>,
    /// Reply to `open` with `Ready` through the attached sink
    pub auto_ready: Mutex<Option<Option<Duration>>>,
}

impl EngineSpy {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

pub struct MockEngine {
    spy: Arc<EngineSpy>,
    sink: Option<Arc<dyn EngineEventSink>>,
}

impl MockEngine {
    pub fn new(spy: Arc<EngineSpy>) -> Self {
        Self { spy, sink: None }
    }
}

impl MediaEngine for MockEngine {
    fn attach(&mut self, sink: Arc<dyn EngineEventSink>) {
        self.sink = Some(sink);
    }

    fn open(&mut self, session: SessionId, source: &Source, start_at: Duration) -> nowplay_core::Result<()> {
        self.spy
            .calls
            .lock()
            .push(EngineCall::Open(session, source.clone(), start_at));
        if let Some(err) = self.spy.fail_open.lock().clone() {
            return Err(err);
        }
        if let (Some(duration), Some(sink)) = (*self.spy.auto_ready.lock(), &self.sink) {
            sink.on_engine_event(session, EngineEvent::Ready { duration });
        }
        Ok(())
    }

    fn play(&mut self) -> nowplay_core::Result<()> {
        self.spy.calls.lock().push(EngineCall::Play);
        Ok(())
    }

    fn pause(&mut self) -> nowplay_core::Result<()> {
        self.spy.calls.lock().push(EngineCall::Pause);
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> nowplay_core::Result<()> {
        self.spy.calls.lock().push(EngineCall::Seek(position));
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        *self.spy.position.lock()
    }

    fn close(&mut self) {
        self.spy.calls.lock().push(EngineCall::Close);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    AudioSession(AudioSessionCategory),
    RemoteControl(bool),
    NowPlaying(Option<Metadata>, PlaybackState),
    Saved(bool),
    Clear,
}

#[derive(Default)]
pub struct RemoteSpy {
    pub calls: Mutex<Vec<RemoteCall>>,
    pub deny_remote_control: Mutex<bool>,
}

impl RemoteSpy {
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }
}

pub struct MockRemote {
    spy: Arc<RemoteSpy>,
}

impl MockRemote {
    pub fn new(spy: Arc<RemoteSpy>) -> Self {
        Self { spy }
    }
}

impl RemoteControlSurface for MockRemote {
    fn attach(&mut self, _sink: Arc<dyn RemoteControlEventSink>) {}

    fn configure_audio_session(&mut self, category: AudioSessionCategory) -> nowplay_core::Result<()> {
        self.spy.calls.lock().push(RemoteCall::AudioSession(category));
        Ok(())
    }

    fn set_remote_control_enabled(&mut self, enabled: bool) -> nowplay_core::Result<()> {
        if enabled && *self.spy.deny_remote_control.lock() {
            return Err(PlayerError::ResourceUnavailable(
                "remote control denied".to_string(),
            ));
        }
        self.spy.calls.lock().push(RemoteCall::RemoteControl(enabled));
        Ok(())
    }

    fn update_now_playing(
        &mut self,
        metadata: Option<&Metadata>,
        state: PlaybackState,
        _position: Duration,
        _duration: Option<Duration>,
    ) {
        self.spy
            .calls
            .lock()
            .push(RemoteCall::NowPlaying(metadata.cloned(), state));
    }

    fn set_saved(&mut self, saved: bool) {
        self.spy.calls.lock().push(RemoteCall::Saved(saved));
    }

    fn clear_now_playing(&mut self) {
        self.spy.calls.lock().push(RemoteCall::Clear);
    }
}

#[derive(Default)]
pub struct Recorder {
    pub acks: Mutex<Vec<(Token, Ack)>>,
    pub notifications: Mutex<Vec<Notification>>,
}

impl Recorder {
    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }

    pub fn last_ack(&self) -> Option<(Token, Ack)> {
        self.acks.lock().last().cloned()
    }

    /// States carried by the recorded `StateChanged` notifications
    pub fn states(&self) -> Vec<PlaybackState> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }
}

impl HostCallback for Recorder {
    fn on_ack(&self, token: &Token, ack: Ack) {
        self.acks.lock().push((token.clone(), ack));
    }

    fn on_notification(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

pub struct Harness {
    pub controller: Controller,
    pub engine: Arc<EngineSpy>,
    pub remote: Arc<RemoteSpy>,
    pub host: Arc<Recorder>,
    next_token: u32,
}

impl Harness {
    pub fn new() -> Self {
        let engine = Arc::new(EngineSpy::default());
        let remote = Arc::new(RemoteSpy::default());
        let host = Arc::new(Recorder::default());
        let dispatcher = Arc::new(HostDispatcher::new());
        dispatcher.add_callback(host.clone(), Duration::ZERO);

        let controller = Controller::new(
            Box::new(MockEngine::new(engine.clone())),
            Box::new(MockRemote::new(remote.clone())),
            dispatcher,
        );
        Self {
            controller,
            engine,
            remote,
            host,
            next_token: 0,
        }
    }

    /// Issue a command under a fresh token and return its acknowledgment
    pub fn send(&mut self, command: nowplay_core::Command) -> Ack {
        self.next_token += 1;
        let token = Token::new(format!("cb-{}", self.next_token));
        self.controller.handle_command(token.clone(), command);
        let (acked, ack) = self.host.last_ack().expect("command was not acknowledged");
        assert_eq!(acked, token);
        ack
    }

    pub fn engine_event(&mut self, event: EngineEvent) {
        let id = self
            .controller
            .session()
            .map(|s| s.id())
            .expect("no live session");
        self.controller.handle_engine_event(id, event);
    }

    pub fn play_stream(&mut self, url: &str) -> Ack {
        self.send(nowplay_core::Command::PlayStream {
            url: url.to_string(),
            metadata: None,
            estimated_duration: None,
        })
    }

    pub fn play_file(&mut self, path: &str) -> Ack {
        self.send(nowplay_core::Command::PlayFile {
            path: path.to_string(),
            metadata: None,
            start_position: Duration::ZERO,
            estimated_duration: None,
        })
    }

    /// Start a stream and bring it to `Playing` with the given duration
    pub fn playing(&mut self, duration: Option<Duration>) {
        self.play_stream("https://ex.com/a.mp3");
        self.engine_event(EngineEvent::Ready { duration });
        assert_eq!(self.controller.state(), PlaybackState::Playing);
        self.host.take_notifications();
        self.engine.clear();
    }
}
