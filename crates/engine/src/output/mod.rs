// Audio output abstraction

#[cfg(feature = "cpal")]
pub mod cpal;
#[cfg(feature = "cpal")]
mod ring;

use nowplay_core::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Every output receives interleaved stereo
pub const OUTPUT_CHANNELS: u16 = 2;

/// Format of the samples handed to an output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl OutputSpec {
    /// Playback time covered by `samples` interleaved samples
    pub fn duration_of(&self, samples: usize) -> Duration {
        let frames = samples as f64 / self.channels.max(1) as f64;
        Duration::from_secs_f64(frames / self.sample_rate.max(1) as f64)
    }
}

/// Sink for decoded audio. Created on the engine's worker thread and used
/// only there, so implementations need not be `Send`.
pub trait AudioOutput {
    /// Queue samples, blocking while the output is full. Returns early once
    /// `stop` is raised.
    fn write(&mut self, samples: &[f32], stop: &AtomicBool);

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Discard queued audio, after a seek
    fn flush(&mut self);

    /// Wait until queued audio has been played
    fn drain(&mut self, stop: &AtomicBool);
}

/// Output without a device: consumes samples at the rate a device would.
/// The unpaced variant consumes them immediately.
pub struct ClockOutput {
    spec: OutputSpec,
    paced: bool,
    /// When the audio written so far will have finished playing
    deadline: Option<Instant>,
}

impl ClockOutput {
    pub fn paced(spec: OutputSpec) -> Self {
        Self {
            spec,
            paced: true,
            deadline: None,
        }
    }

    pub fn unpaced(spec: OutputSpec) -> Self {
        Self {
            spec,
            paced: false,
            deadline: None,
        }
    }

    fn wait_until(deadline: Instant, stop: &AtomicBool) {
        const SLICE: Duration = Duration::from_millis(20);
        loop {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(SLICE));
        }
    }
}

impl AudioOutput for ClockOutput {
    fn write(&mut self, samples: &[f32], stop: &AtomicBool) {
        if !self.paced {
            return;
        }
        let now = Instant::now();
        let start = self.deadline.filter(|d| *d > now).unwrap_or(now);
        let deadline = start + self.spec.duration_of(samples.len());
        self.deadline = Some(deadline);

        // Stay one buffer ahead, like a device queue would
        let ahead = Duration::from_millis(100);
        if let Some(wake) = deadline.checked_sub(ahead) {
            Self::wait_until(wake, stop);
        }
    }

    fn pause(&mut self) -> Result<()> {
        self.deadline = None;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) {
        self.deadline = None;
    }

    fn drain(&mut self, stop: &AtomicBool) {
        if let Some(deadline) = self.deadline.take() {
            Self::wait_until(deadline, stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: OutputSpec = OutputSpec {
        sample_rate: 1000,
        channels: 2,
    };

    #[test]
    fn test_duration_of_samples() {
        assert_eq!(SPEC.duration_of(2000), Duration::from_secs(1));
        assert_eq!(SPEC.duration_of(0), Duration::ZERO);
    }

    #[test]
    fn test_paced_output_takes_real_time() {
        let mut output = ClockOutput::paced(SPEC);
        let stop = AtomicBool::new(false);
        let started = Instant::now();

        // 300ms of audio in three writes, then drain
        for _ in 0..3 {
            output.write(&[0.0; 200], &stop);
        }
        output.drain(&stop);

        assert!(started.elapsed() >= Duration::from_millis(280));
    }

    #[test]
    fn test_stop_interrupts_pacing() {
        let mut output = ClockOutput::paced(SPEC);
        let stop = AtomicBool::new(true);
        let started = Instant::now();

        output.write(&[0.0; 20_000], &stop);
        output.drain(&stop);

        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
