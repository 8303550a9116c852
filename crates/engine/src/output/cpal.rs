// cpal-based output on the default device

use super::ring::SharedRing;
use super::{AudioOutput, OutputSpec};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use nowplay_core::{EngineFailure, PlayerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn output_error(what: &str, err: impl std::fmt::Display) -> PlayerError {
    log::error!("{}: {}", what, err);
    PlayerError::Engine(EngineFailure::Other(format!("{}: {}", what, err)))
}

/// cpal device output fed through a sample ring
pub struct CpalOutput {
    stream: Stream,
    ring: SharedRing,
    is_playing: Arc<AtomicBool>,
}

impl CpalOutput {
    pub fn open(spec: OutputSpec, buffer: Duration) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| output_error("No output device available", "none"))?;

        let config = StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let samples = (spec.sample_rate as f64 * spec.channels as f64 * buffer.as_secs_f64()) as usize;
        let ring = SharedRing::new(samples.max(4096));
        let is_playing = Arc::new(AtomicBool::new(false));

        let ring_clone = ring.clone();
        let is_playing_clone = is_playing.clone();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !is_playing_clone.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    let written = ring_clone.read(data);
                    // Zero-fill so an underrun never replays stale samples
                    data[written..].fill(0.0);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| output_error("Failed to build output stream", e))?;

        log::info!("cpal output: {}Hz, {} channels", spec.sample_rate, spec.channels);
        Ok(Self {
            stream,
            ring,
            is_playing,
        })
    }
}

impl AudioOutput for CpalOutput {
    fn write(&mut self, mut samples: &[f32], stop: &AtomicBool) {
        while !samples.is_empty() {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let n = self.ring.write(samples);
            samples = &samples[n..];
            if n == 0 {
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    fn pause(&mut self) -> Result<()> {
        self.is_playing.store(false, Ordering::Relaxed);
        self.stream
            .pause()
            .map_err(|e| output_error("Failed to pause stream", e))
    }

    fn resume(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| output_error("Failed to start stream", e))?;
        self.is_playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&mut self) {
        self.ring.clear();
    }

    fn drain(&mut self, stop: &AtomicBool) {
        // Bounded so a stalled device cannot hold the worker forever
        for _ in 0..200 {
            if stop.load(Ordering::Relaxed) || self.ring.available_read() == 0 {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.is_playing.store(false, Ordering::Relaxed);
        if let Err(e) = self.stream.pause() {
            log::debug!("Pausing stream on drop failed: {}", e);
        }
    }
}
