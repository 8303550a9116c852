// Serialized processing context for the controller
// Commands, engine events and remote events are marshalled as messages onto
// one worker thread; the position sampler ticks on the same thread.

use crate::callback::{HostCallback, HostDispatcher};
use crate::command::{Command, Token};
use crate::controller::Controller;
use crate::engine::{EngineEvent, EngineEventSink, MediaEngine};
use crate::error::{PlayerError, Result};
use crate::remote::{RemoteControlEventSink, RemoteControlSurface, RemoteEvent};
use crate::session::{SessionId, StatusSnapshot};
use crossbeam_channel::{never, select, tick, unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

enum Message {
    Command(Token, Command),
    Engine(SessionId, EngineEvent),
    Remote(RemoteEvent),
    Snapshot(Sender<StatusSnapshot>),
    Shutdown,
}

/// Marshals collaborator callbacks into the processing context.
/// Engines and remote-control surfaces receive it through `attach`.
#[derive(Clone)]
pub struct EventRelay {
    tx: Sender<Message>,
}

impl EngineEventSink for EventRelay {
    fn on_engine_event(&self, session: SessionId, event: EngineEvent) {
        if self.tx.send(Message::Engine(session, event)).is_err() {
            log::debug!("Engine event for session {} after shutdown", session);
        }
    }
}

impl RemoteControlEventSink for EventRelay {
    fn on_remote_event(&self, event: RemoteEvent) {
        if self.tx.send(Message::Remote(event)).is_err() {
            log::debug!("Remote event {:?} after shutdown", event);
        }
    }
}

/// Owner of the controller's worker thread
pub struct PlayerHandle {
    tx: Sender<Message>,
    relay: Arc<EventRelay>,
    host: Arc<HostDispatcher>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PlayerHandle {
    /// Attach the collaborators to a new controller and start its worker.
    pub fn spawn(
        mut engine: Box<dyn MediaEngine>,
        mut remote: Box<dyn RemoteControlSurface>,
    ) -> Result<Self> {
        let (tx, rx) = unbounded();
        let relay = Arc::new(EventRelay { tx: tx.clone() });
        engine.attach(relay.clone());
        remote.attach(relay.clone());

        let host = Arc::new(HostDispatcher::new());
        let controller = Controller::new(engine, remote, host.clone());

        let worker = thread::Builder::new()
            .name("nowplay-session".to_string())
            .spawn(move || run(controller, rx))
            .map_err(|e| {
                PlayerError::ResourceUnavailable(format!("failed to spawn session worker: {}", e))
            })?;

        log::info!("Session worker started");
        Ok(Self {
            tx,
            relay,
            host,
            worker: Some(worker),
        })
    }

    /// Register a host callback; `progress_throttle` bounds how often it
    /// receives progress notifications.
    pub fn add_callback(&self, callback: Arc<dyn HostCallback>, progress_throttle: Duration) {
        self.host.add_callback(callback, progress_throttle);
    }

    /// Queue a command; its acknowledgment arrives through the callbacks.
    pub fn submit(&self, token: Token, command: Command) -> Result<()> {
        self.tx
            .send(Message::Command(token, command))
            .map_err(|_| PlayerError::ResourceUnavailable("session worker stopped".to_string()))
    }

    /// Sink for device-side events (lock screen, interruptions, connectivity)
    pub fn relay(&self) -> Arc<EventRelay> {
        self.relay.clone()
    }

    /// Snapshot taken on the processing context, waiting at most `timeout`.
    pub fn status(&self, timeout: Duration) -> Option<StatusSnapshot> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx.send(Message::Snapshot(reply_tx)).ok()?;
        reply_rx.recv_timeout(timeout).ok()
    }

    /// Stop the worker and release the engine
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.tx.send(Message::Shutdown);
            if worker.join().is_err() {
                log::error!("Session worker panicked");
            }
            self.host.clear_callbacks();
            log::info!("Session worker stopped");
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(mut controller: Controller, messages: Receiver<Message>) {
    let idle: Receiver<Instant> = never();
    let mut sampler: Option<(SessionId, Receiver<Instant>)> = None;

    loop {
        let ticks = sampler.as_ref().map_or(&idle, |(_, rx)| rx);
        select! {
            recv(messages) -> message => match message {
                Ok(Message::Command(token, command)) => controller.handle_command(token, command),
                Ok(Message::Engine(session, event)) => controller.handle_engine_event(session, event),
                Ok(Message::Remote(event)) => controller.handle_remote_event(event),
                Ok(Message::Snapshot(reply)) => {
                    let _ = reply.send(controller.snapshot());
                }
                Ok(Message::Shutdown) | Err(_) => break,
            },
            recv(ticks) -> _ => controller.sample_position(),
        }

        // The sampler lives exactly as long as one session
        sampler = match (controller.sampling_session(), sampler.take()) {
            (Some(id), Some((current, rx))) if current == id => Some((current, rx)),
            (Some(id), _) => {
                log::debug!("Position sampler armed for session {}", id);
                Some((id, tick(controller.config().progress_interval())))
            }
            (None, _) => None,
        };
    }

    controller.shutdown();
}
