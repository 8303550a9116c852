// MediaEngine implementation on top of symphonia

use crate::config::EngineConfig;
use crate::output::{AudioOutput, OutputSpec};
use crate::worker::{Control, Shared, Worker};
use crossbeam_channel::{unbounded, Sender};
use nowplay_core::{EngineEventSink, MediaEngine, PlayerError, Result, SessionId, Source};
use nowplay_transport_http::HttpClient;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Builds the output for a decoded stream, on the worker thread
pub type OutputFactory = Arc<dyn Fn(OutputSpec) -> Result<Box<dyn AudioOutput>> + Send + Sync>;

/// Whether `SymphoniaEngine::new` renders to the output device
pub const DEVICE_OUTPUT: bool = cfg!(feature = "cpal");

struct ActiveSession {
    id: SessionId,
    control: Sender<Control>,
    shared: Arc<Shared>,
}

/// Media engine running one decode worker per session
pub struct SymphoniaEngine {
    config: EngineConfig,
    client: HttpClient,
    output: OutputFactory,
    sink: Option<Arc<dyn EngineEventSink>>,
    active: Option<ActiveSession>,
}

impl SymphoniaEngine {
    /// Engine with the platform default output: the device when built with
    /// the `cpal` feature, the paced clock otherwise.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let output = default_output_factory(&config);
        log::info!(
            "Engine output: {}",
            if DEVICE_OUTPUT { "device" } else { "paced clock" }
        );
        Self::with_output(config, output)
    }

    pub fn with_output(config: EngineConfig, output: OutputFactory) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: HttpClient::new(config.http.clone()),
            config,
            output,
            sink: None,
            active: None,
        })
    }

    fn active(&self, operation: &str) -> Result<&ActiveSession> {
        self.active.as_ref().ok_or_else(|| {
            PlayerError::InvalidState(format!("engine {} without an open session", operation))
        })
    }

    fn send(&self, operation: &str, control: Control) -> Result<()> {
        let active = self.active(operation)?;
        // A worker that already finished has reported why through the sink
        if active.control.send(control).is_err() {
            log::debug!("Engine {} for finished session {}", operation, active.id);
        }
        Ok(())
    }
}

#[cfg(not(feature = "cpal"))]
fn default_output_factory(_config: &EngineConfig) -> OutputFactory {
    Arc::new(|spec| Ok(Box::new(crate::output::ClockOutput::paced(spec)) as Box<dyn AudioOutput>))
}

#[cfg(feature = "cpal")]
fn default_output_factory(config: &EngineConfig) -> OutputFactory {
    let buffer = Duration::from_millis(config.output_buffer_ms);
    Arc::new(move |spec| {
        crate::output::cpal::CpalOutput::open(spec, buffer)
            .map(|output| Box::new(output) as Box<dyn AudioOutput>)
    })
}

impl MediaEngine for SymphoniaEngine {
    fn attach(&mut self, sink: Arc<dyn EngineEventSink>) {
        self.sink = Some(sink);
    }

    fn open(&mut self, session: SessionId, source: &Source, start_at: Duration) -> Result<()> {
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| PlayerError::InvalidState("engine has no event sink".to_string()))?;
        self.close();

        let (control_tx, control_rx) = unbounded();
        let shared = Arc::new(Shared::default());
        shared.set_position(start_at);

        let worker = Worker {
            session,
            source: source.clone(),
            start_at,
            config: self.config.clone(),
            client: self.client.clone(),
            output: self.output.clone(),
            sink,
            control: control_rx,
            shared: shared.clone(),
        };
        thread::Builder::new()
            .name(format!("nowplay-engine-{}", session.0))
            .spawn(move || worker.run())
            .map_err(|e| {
                PlayerError::ResourceUnavailable(format!("failed to spawn engine worker: {}", e))
            })?;

        log::info!("Engine opened {} for session {}", source.uri(), session);
        self.active = Some(ActiveSession {
            id: session,
            control: control_tx,
            shared,
        });
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.send("play", Control::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.send("pause", Control::Pause)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.send("seek", Control::Seek(position))
    }

    fn position(&self) -> Option<Duration> {
        self.active.as_ref().map(|active| active.shared.position())
    }

    /// Returns immediately; the worker notices the stop flag or the closed
    /// control channel and releases its source and output on its own thread.
    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.shared.stop.store(true, Ordering::Relaxed);
            log::info!("Engine closed session {}", active.id);
        }
    }
}

impl Drop for SymphoniaEngine {
    fn drop(&mut self) {
        self.close();
    }
}
