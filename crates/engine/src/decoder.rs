// Audio decoding using Symphonia
// Probes the container, decodes the default track and hands out interleaved
// stereo f32 frames.

use nowplay_core::EngineFailure;
use nowplay_transport_http::failure_of;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crate::output::{OutputSpec, OUTPUT_CHANNELS};

type Result<T> = std::result::Result<T, EngineFailure>;

/// Decoded audio and the stream position of its first frame
pub struct Frames {
    pub position: Duration,
    /// Interleaved stereo samples
    pub samples: Vec<f32>,
}

/// Decoder for the default track of a media source
pub struct TrackDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    time_base: Option<TimeBase>,
    duration: Option<Duration>,
    max_decode_errors: u32,
    decode_errors: u32,
}

impl TrackDecoder {
    pub fn open(media_source: Box<dyn MediaSource>, hint: Hint, max_decode_errors: u32) -> Result<Self> {
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        // Some readers assert on header fields instead of returning an error
        let probed = panic::catch_unwind(AssertUnwindSafe(|| {
            symphonia::default::get_probe().format(
                &hint,
                media_source_stream,
                &FormatOptions {
                    enable_gapless: true,
                    ..Default::default()
                },
                &MetadataOptions::default(),
            )
        }))
        .map_err(|_| {
            log::warn!("Format reader panicked on a malformed header");
            EngineFailure::UnsupportedFormat
        })?;
        let probe_result = probed.map_err(|e| classify("probe", e))?;

        let format_reader = probe_result.format;
        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(EngineFailure::UnsupportedFormat)?;
        let track_id = track.id;

        let codec_params = &track.codec_params;
        let sample_rate = codec_params
            .sample_rate
            .filter(|rate| *rate > 0)
            .ok_or_else(|| {
                log::warn!("Track {} has no usable sample rate", track_id);
                EngineFailure::UnsupportedFormat
            })?;
        let time_base = codec_params.time_base;
        if time_base.is_some_and(|tb| tb.numer == 0 || tb.denom == 0) {
            log::warn!("Track {} has a zero time base", track_id);
            return Err(EngineFailure::UnsupportedFormat);
        }
        let channels = codec_params.channels.map_or(2, |c| c.count()).max(1);
        let duration = codec_params.n_frames.and_then(|frames| match time_base {
            Some(tb) => Some(time_to_duration(tb.calc_time(frames))),
            None => Duration::try_from_secs_f64(frames as f64 / sample_rate as f64).ok(),
        });

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| classify("codec", e))?;

        log::info!(
            "Loaded audio: {}Hz, {} channels, duration {:?}",
            sample_rate,
            channels,
            duration
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            time_base,
            duration,
            max_decode_errors,
            decode_errors: 0,
        })
    }

    /// Length of the track, when the container declares it
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn output_spec(&self) -> OutputSpec {
        OutputSpec {
            sample_rate: self.sample_rate,
            channels: OUTPUT_CHANNELS,
        }
    }

    /// Decode the next packet of the track; `None` at end of stream
    pub fn next_frames(&mut self) -> Result<Option<Frames>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(classify("read", e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    self.decode_errors += 1;
                    log::warn!("Skipping undecodable packet ({}): {}", self.decode_errors, msg);
                    if self.decode_errors > self.max_decode_errors {
                        return Err(EngineFailure::DecodeFailure);
                    }
                    continue;
                }
                Err(e) => return Err(classify("decode", e)),
            };
            self.decode_errors = 0;

            if decoded.frames() == 0 {
                continue;
            }
            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(Frames {
                position: self.ts_to_duration(packet.ts()),
                samples: to_stereo(sample_buf.samples(), spec.channels.count()),
            }));
        }
    }

    /// Accurate seek; returns the position actually reached
    pub fn seek(&mut self, target: Duration) -> Result<Duration> {
        let ts = match self.time_base {
            Some(tb) => tb.calc_timestamp(Time::new(target.as_secs(), f64::from(target.subsec_nanos()) / 1e9)),
            None => (target.as_secs_f64() * self.sample_rate as f64) as u64,
        };

        let seeked = self
            .format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| classify("seek", e))?;

        self.decoder.reset();
        Ok(self.ts_to_duration(seeked.actual_ts))
    }

    fn ts_to_duration(&self, ts: u64) -> Duration {
        match self.time_base {
            Some(tb) => time_to_duration(tb.calc_time(ts)),
            None => Duration::try_from_secs_f64(ts as f64 / self.sample_rate as f64)
                .unwrap_or(Duration::MAX),
        }
    }
}

fn time_to_duration(time: Time) -> Duration {
    Duration::from_secs(time.seconds)
        .saturating_add(Duration::from_secs_f64(time.frac.clamp(0.0, 1.0)))
}

/// Fold any channel layout into interleaved stereo. Mono is duplicated,
/// extra channels beyond the first two are dropped.
pub(crate) fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Map a symphonia error to the failure class reported to the controller
fn classify(stage: &str, err: SymphoniaError) -> EngineFailure {
    log::warn!("Symphonia {} error: {}", stage, err);
    match err {
        SymphoniaError::IoError(e) => failure_of(&e).unwrap_or(EngineFailure::DecodeFailure),
        SymphoniaError::Unsupported(_) => EngineFailure::UnsupportedFormat,
        SymphoniaError::SeekError(_) => EngineFailure::Other("seek-failure".to_string()),
        _ => EngineFailure::DecodeFailure,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// 16-bit PCM WAV of a quiet ramp
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
        let data_len = frames * channels as u32 * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames * channels as u32 {
            out.extend_from_slice(&((i % 200) as i16 * 10).to_le_bytes());
        }
        out
    }

    fn wav_decoder(channels: u16) -> TrackDecoder {
        let mut hint = Hint::new();
        hint.with_extension("wav");
        TrackDecoder::open(Box::new(Cursor::new(wav_bytes(8000, channels, 4000))), hint, 4).unwrap()
    }

    #[test]
    fn test_wav_duration_and_frames() {
        let mut decoder = wav_decoder(1);
        assert_eq!(decoder.duration(), Some(Duration::from_millis(500)));
        assert_eq!(decoder.output_spec().sample_rate, 8000);

        let mut frames = 0;
        while let Some(chunk) = decoder.next_frames().unwrap() {
            frames += chunk.samples.len() / 2;
        }
        assert_eq!(frames, 4000);
    }

    #[test]
    fn test_seek_reports_reached_position() {
        let mut decoder = wav_decoder(2);
        let reached = decoder.seek(Duration::from_millis(250)).unwrap();
        assert!(reached <= Duration::from_millis(250));
        assert!(reached >= Duration::from_millis(200));

        let next = decoder.next_frames().unwrap().unwrap();
        assert!(next.position >= Duration::from_millis(200));
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let result = TrackDecoder::open(Box::new(Cursor::new(vec![0u8; 4096])), Hint::new(), 4);
        assert!(matches!(result, Err(EngineFailure::UnsupportedFormat)));
    }

    #[test]
    fn test_zero_sample_rate_is_unsupported() {
        let mut bytes = wav_bytes(8000, 1, 4000);
        // Sample rate and byte rate
        bytes[24..32].fill(0);
        let mut hint = Hint::new();
        hint.with_extension("wav");
        let result = TrackDecoder::open(Box::new(Cursor::new(bytes)), hint, 4);
        assert!(matches!(result, Err(EngineFailure::UnsupportedFormat)));
    }

    #[test]
    fn test_channel_folding() {
        assert_eq!(to_stereo(&[0.1, 0.2], 1), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(to_stereo(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3), vec![0.1, 0.2, 0.4, 0.5]);
    }
}
