// Outbound notifications and the host callback fan-out
// Progress notifications are throttled per callback so a chatty engine cannot flood the web view

use crate::command::{Ack, Token};
use crate::error::PlayerError;
use crate::remote::RemoteButton;
use crate::state::PlaybackState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Events published to the host
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Session state changed
    StateChanged {
        token: Option<Token>,
        state: PlaybackState,
        position: Duration,
        duration: Option<Duration>,
    },

    /// Sampled playback position
    Progress {
        position: Duration,
        duration: Option<Duration>,
    },

    /// Engine buffering progress (0.0 - 1.0)
    BufferingProgress { fraction: f32 },

    /// Hardware or lock-screen control pressed
    RemoteControlEvent { kind: RemoteButton },

    /// Rejected command or engine failure
    Error {
        token: Option<Token>,
        error: PlayerError,
    },

    /// Current item played to its end
    MediaCompleted,

    /// Host-managed queue ran out of items
    QueueCompleted { token: Option<Token> },
}

/// Host callback trait
/// Implementations should be lightweight and non-blocking; they run on the
/// controller's processing context.
pub trait HostCallback: Send + Sync {
    /// Called exactly once per command
    fn on_ack(&self, token: &Token, ack: Ack);

    /// Called for every notification
    fn on_notification(&self, notification: Notification);
}

/// Throttled callback wrapper
/// Only `Progress` notifications are rate limited
pub struct ThrottledCallback {
    inner: Arc<dyn HostCallback>,
    last_progress: Mutex<Option<Instant>>,
    progress_interval: Duration,
}

impl ThrottledCallback {
    pub fn new(callback: Arc<dyn HostCallback>, progress_interval: Duration) -> Self {
        Self {
            inner: callback,
            last_progress: Mutex::new(None),
            progress_interval,
        }
    }

    pub fn dispatch(&self, notification: Notification) {
        if let Notification::Progress { .. } = notification {
            let mut last = self.last_progress.lock();
            if let Some(at) = *last {
                if at.elapsed() < self.progress_interval {
                    return;
                }
            }
            *last = Some(Instant::now());
        }
        self.inner.on_notification(notification);
    }

    pub fn acknowledge(&self, token: &Token, ack: Ack) {
        self.inner.on_ack(token, ack);
    }
}

/// Fan-out to every registered host callback
pub struct HostDispatcher {
    callbacks: Mutex<Vec<Arc<ThrottledCallback>>>,
}

impl HostDispatcher {
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback; `throttle` bounds how often it sees progress.
    pub fn add_callback(&self, callback: Arc<dyn HostCallback>, throttle: Duration) {
        self.callbacks
            .lock()
            .push(Arc::new(ThrottledCallback::new(callback, throttle)));
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.lock().clear();
    }

    pub fn notify(&self, notification: Notification) {
        log::trace!("notify {:?}", notification);
        let callbacks = self.callbacks.lock().clone();
        for callback in callbacks {
            callback.dispatch(notification.clone());
        }
    }

    pub fn acknowledge(&self, token: &Token, ack: Ack) {
        let callbacks = self.callbacks.lock().clone();
        for callback in callbacks {
            callback.acknowledge(token, ack.clone());
        }
    }
}

impl Default for HostDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback that records everything, for tests
#[cfg(test)]
pub(crate) struct RecordingCallback {
    pub acks: Mutex<Vec<(Token, Ack)>>,
    pub notifications: Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingCallback {
    pub fn new() -> Self {
        Self {
            acks: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl HostCallback for RecordingCallback {
    fn on_ack(&self, token: &Token, ack: Ack) {
        self.acks.lock().push((token.clone(), ack));
    }

    fn on_notification(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_progress_is_throttled() {
        let recorder = Arc::new(RecordingCallback::new());
        let throttled = ThrottledCallback::new(recorder.clone(), Duration::from_millis(100));

        for i in 0..10 {
            throttled.dispatch(Notification::Progress {
                position: Duration::from_millis(i * 100),
                duration: Some(Duration::from_secs(1)),
            });
            thread::sleep(Duration::from_millis(10));
        }

        let count = recorder.notifications.lock().len();
        assert!(count >= 1);
        assert!(count < 10);
    }

    #[test]
    fn test_state_changes_are_not_throttled() {
        let recorder = Arc::new(RecordingCallback::new());
        let throttled = ThrottledCallback::new(recorder.clone(), Duration::from_secs(10));

        for state in [PlaybackState::Playing, PlaybackState::Paused] {
            throttled.dispatch(Notification::StateChanged {
                token: None,
                state,
                position: Duration::ZERO,
                duration: None,
            });
        }

        assert_eq!(recorder.notifications.lock().len(), 2);
    }

    #[test]
    fn test_dispatcher_fans_out_acks() {
        let first = Arc::new(RecordingCallback::new());
        let second = Arc::new(RecordingCallback::new());
        let dispatcher = HostDispatcher::new();
        dispatcher.add_callback(first.clone(), Duration::ZERO);
        dispatcher.add_callback(second.clone(), Duration::ZERO);

        dispatcher.acknowledge(&Token::new("cb-1"), Ack::Accepted);

        assert_eq!(first.acks.lock().len(), 1);
        assert_eq!(second.acks.lock()[0].0, Token::new("cb-1"));
    }
}
