//! Decoded PCM input handed over by the decoding collaborator.

pub mod synth;

use xxhash_rust::xxh3::Xxh3;

use crate::{BeatscapeError, Result};

const FINGERPRINT_SEED: u64 = 0x5eed_b3a7_0f7a_c0de;

/// Mono sample buffer at a fixed sample rate.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wraps mono samples. Non-finite samples are rejected since they would
    /// poison every spectrum they touch.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(BeatscapeError::InvalidInput("sample rate must be non-zero"));
        }
        if samples.is_empty() {
            return Err(BeatscapeError::InvalidInput(
                "audio buffer requires at least one sample",
            ));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(BeatscapeError::InvalidInput(
                "audio buffer contains non-finite samples",
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Downmixes interleaved multi-channel samples by averaging the channels.
    pub fn from_interleaved(data: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(BeatscapeError::InvalidInput("channel count must be non-zero"));
        }
        let channels = channels as usize;
        let mono = data
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        Self::new(mono, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f32 {
        (self.samples.len() as f64 / self.sample_rate as f64) as f32
    }

    /// Resolves a `[start, end)` request against the buffer. `end` is clamped
    /// to the end of the track.
    pub fn window(&self, start: f32, end: Option<f32>) -> Result<AudioWindow> {
        let duration = self.duration();
        if !(start.is_finite() && start >= 0.0) {
            return Err(BeatscapeError::InvalidInput("window start must be non-negative"));
        }
        if start >= duration {
            return Err(BeatscapeError::InvalidInput(
                "window starts after the end of the audio",
            ));
        }
        let end = end.map(|e| e.min(duration)).unwrap_or(duration);
        if end <= start {
            return Err(BeatscapeError::InvalidInput("window end must follow its start"));
        }
        let rate = self.sample_rate as f64;
        let first = (start as f64 * rate).floor() as usize;
        let last = ((end as f64 * rate).ceil() as usize).min(self.samples.len());
        Ok(AudioWindow {
            start,
            end,
            first_sample: first,
            end_sample: last.max(first + 1),
        })
    }

    /// Stable content hash, used as the track seed when none is configured.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::with_seed(FINGERPRINT_SEED);
        hasher.update(&self.sample_rate.to_le_bytes());
        for chunk in self.samples.chunks(4096) {
            let bytes: Vec<u8> = chunk.iter().flat_map(|s| s.to_le_bytes()).collect();
            hasher.update(&bytes);
        }
        hasher.digest()
    }
}

/// Resolved analysis window, in seconds and in samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioWindow {
    pub start: f32,
    pub end: f32,
    pub first_sample: usize,
    pub end_sample: usize,
}

impl AudioWindow {
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unusable_buffers() {
        assert!(AudioBuffer::new(Vec::new(), 44_100).is_err());
        assert!(AudioBuffer::new(vec![0.0; 8], 0).is_err());
        assert!(AudioBuffer::new(vec![0.0, f32::NAN], 44_100).is_err());
    }

    #[test]
    fn downmixes_interleaved_channels() {
        let buffer = AudioBuffer::from_interleaved(&[1.0, 0.0, 0.5, 0.5], 2, 10).unwrap();
        assert_eq!(buffer.samples(), &[0.5, 0.5]);
    }

    #[test]
    fn window_clamps_to_track_end() {
        let buffer = AudioBuffer::new(vec![0.0; 1_000], 100).unwrap();
        let window = buffer.window(2.0, Some(50.0)).unwrap();
        assert_eq!(window.first_sample, 200);
        assert_eq!(window.end_sample, 1_000);
        assert!((window.duration() - 8.0).abs() < 1e-6);
        assert!(buffer.window(11.0, None).is_err());
        assert!(buffer.window(3.0, Some(2.0)).is_err());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = AudioBuffer::new(vec![0.1; 64], 100).unwrap();
        let b = AudioBuffer::new(vec![0.1; 64], 100).unwrap();
        let c = AudioBuffer::new(vec![0.2; 64], 100).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
