//! Synthetic test signals. The CLI renders [`test_track`] when no audio file
//! is given, and the test suite uses it as a track with a known tempo.

use std::f32::consts::TAU;

use super::AudioBuffer;
use crate::Result;

const KICK_HZ: f32 = 55.0;
const KICK_DECAY_SECONDS: f32 = 0.09;
const MID_HZ: f32 = 500.0;
const HIGH_HZ: f32 = 5_000.0;

/// Bass kicks on every beat, a steady mid tone and pulsing high bursts.
pub fn test_track(duration: f32, sample_rate: u32, bpm: f32) -> Result<AudioBuffer> {
    let beat = 60.0 / bpm.max(1.0);
    let samples = sample_count(duration, sample_rate);
    let rate = sample_rate as f32;

    let data = (0..samples)
        .map(|n| {
            let t = n as f32 / rate;
            let since_beat = t % beat;
            let kick = (TAU * KICK_HZ * since_beat).sin()
                * (-since_beat / KICK_DECAY_SECONDS).exp()
                * 0.8;
            let mid = (TAU * MID_HZ * t).sin() * 0.1;
            let shimmer = 0.5 + 0.5 * (TAU * 2.0 * t / beat).sin();
            let high = (TAU * HIGH_HZ * t).sin() * shimmer * 0.05;
            kick + mid + high
        })
        .collect();

    AudioBuffer::new(data, sample_rate)
}

/// Kicks only, with an explicit peak amplitude.
pub fn kick_track(duration: f32, sample_rate: u32, bpm: f32, amplitude: f32) -> Result<AudioBuffer> {
    let beat = 60.0 / bpm.max(1.0);
    let rate = sample_rate as f32;
    let data = (0..sample_count(duration, sample_rate))
        .map(|n| {
            let since_beat = (n as f32 / rate) % beat;
            (TAU * KICK_HZ * since_beat).sin()
                * (-since_beat / KICK_DECAY_SECONDS).exp()
                * amplitude
        })
        .collect();
    AudioBuffer::new(data, sample_rate)
}

pub fn silence(duration: f32, sample_rate: u32) -> Result<AudioBuffer> {
    AudioBuffer::new(vec![0.0; sample_count(duration, sample_rate)], sample_rate)
}

fn sample_count(duration: f32, sample_rate: u32) -> usize {
    ((duration.max(0.0) as f64 * sample_rate as f64).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_has_expected_length_and_range() {
        let track = test_track(2.0, 8_000, 120.0).unwrap();
        assert_eq!(track.samples().len(), 16_000);
        assert!(track.samples().iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn silence_is_silent() {
        let track = silence(0.5, 1_000).unwrap();
        assert!(track.samples().iter().all(|s| *s == 0.0));
    }
}
