// Decode loop of one engine session

use crate::config::EngineConfig;
use crate::decoder::TrackDecoder;
use crate::engine::OutputFactory;
use crate::output::AudioOutput;
use crate::source;
use crossbeam_channel::{Receiver, TryRecvError};
use nowplay_core::{EngineEvent, EngineEventSink, EngineFailure, SessionId, Source};
use nowplay_transport_http::HttpClient;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) enum Control {
    Play,
    Pause,
    Seek(Duration),
}

/// State read by the engine facade while the worker runs
#[derive(Default)]
pub(crate) struct Shared {
    pub position_ms: AtomicU64,
    pub stop: AtomicBool,
}

impl Shared {
    pub fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms.load(Ordering::Relaxed))
    }

    pub fn set_position(&self, position: Duration) {
        let millis = u64::try_from(position.as_millis()).unwrap_or(u64::MAX);
        self.position_ms.store(millis, Ordering::Relaxed);
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

enum Finish {
    EndOfMedia,
    Closed,
}

pub(crate) struct Worker {
    pub session: SessionId,
    pub source: Source,
    pub start_at: Duration,
    pub config: EngineConfig,
    pub client: HttpClient,
    pub output: OutputFactory,
    pub sink: Arc<dyn EngineEventSink>,
    pub control: Receiver<Control>,
    pub shared: Arc<Shared>,
}

impl Worker {
    pub fn run(self) {
        log::debug!("Engine worker for session {} started", self.session);
        let finished = panic::catch_unwind(AssertUnwindSafe(|| self.play_through()))
            .unwrap_or_else(|_| {
                log::error!("Engine worker for session {} panicked", self.session);
                Err(EngineFailure::DecodeFailure)
            });
        match finished {
            Ok(Finish::EndOfMedia) => {
                log::info!("Session {} played to the end", self.session);
                self.emit(EngineEvent::EndOfMedia);
            }
            Ok(Finish::Closed) => log::debug!("Engine worker for session {} closed", self.session),
            Err(failure) if !self.shared.stopped() => {
                log::error!("Session {} failed: {}", self.session, failure);
                self.emit(EngineEvent::Error(failure));
            }
            Err(failure) => log::debug!("Failure after close ignored: {}", failure),
        }
    }

    fn emit(&self, event: EngineEvent) {
        self.sink.on_engine_event(self.session, event);
    }

    fn play_through(&self) -> Result<Finish, EngineFailure> {
        self.emit(EngineEvent::Buffering { fraction: 0.0 });
        let (media, hint) = source::open_media(&self.source, &self.client)?;
        if self.shared.stopped() {
            return Ok(Finish::Closed);
        }

        let mut decoder = TrackDecoder::open(media, hint, self.config.max_decode_errors)?;
        if !self.start_at.is_zero() {
            match decoder.seek(self.start_at) {
                Ok(reached) => self.shared.set_position(reached),
                Err(failure) => log::warn!("Cannot start at {:?}: {}", self.start_at, failure),
            }
        }

        let mut output = (self.output)(decoder.output_spec()).map_err(|e| {
            log::error!("Output unavailable: {}", e);
            EngineFailure::Other(e.detail())
        })?;

        self.emit(EngineEvent::Buffering { fraction: 1.0 });
        self.emit(EngineEvent::Ready {
            duration: decoder.duration(),
        });

        let mut playing = false;
        let mut last_tick = Instant::now();
        loop {
            // Paused: park until told otherwise
            let control = if playing {
                match self.control.try_recv() {
                    Ok(control) => Some(control),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => return Ok(Finish::Closed),
                }
            } else {
                match self.control.recv() {
                    Ok(control) => Some(control),
                    Err(_) => return Ok(Finish::Closed),
                }
            };
            if self.shared.stopped() {
                return Ok(Finish::Closed);
            }

            match control {
                Some(Control::Play) => {
                    if let Err(e) = output.resume() {
                        return Err(EngineFailure::Other(e.detail()));
                    }
                    playing = true;
                    continue;
                }
                Some(Control::Pause) => {
                    if let Err(e) = output.pause() {
                        log::warn!("Output pause failed: {}", e);
                    }
                    playing = false;
                    continue;
                }
                Some(Control::Seek(target)) => {
                    self.seek(&mut decoder, output.as_mut(), target);
                    continue;
                }
                None => {}
            }

            match decoder.next_frames()? {
                Some(frames) => {
                    output.write(&frames.samples, &self.shared.stop);
                    self.shared.set_position(frames.position);
                    if last_tick.elapsed() >= self.config.tick_interval() {
                        last_tick = Instant::now();
                        self.emit(EngineEvent::PositionTick {
                            position: frames.position,
                        });
                    }
                }
                None => {
                    output.drain(&self.shared.stop);
                    if self.shared.stopped() {
                        return Ok(Finish::Closed);
                    }
                    if let Some(duration) = decoder.duration() {
                        self.shared.set_position(duration);
                    }
                    return Ok(Finish::EndOfMedia);
                }
            }
        }
    }

    /// A failed seek leaves playback where it was; completion is reported either way
    fn seek(&self, decoder: &mut TrackDecoder, output: &mut dyn AudioOutput, target: Duration) {
        let position = match decoder.seek(target) {
            Ok(reached) => {
                output.flush();
                reached
            }
            Err(failure) => {
                log::warn!("Seek to {:?} failed: {}", target, failure);
                self.shared.position()
            }
        };
        self.shared.set_position(position);
        self.emit(EngineEvent::SeekComplete { position });
    }
}
