use serde::{Deserialize, Serialize};

use crate::audio::AudioWindow;

/// Beats in one bar, the unit scene swaps are counted in.
pub const BEATS_PER_BAR: u32 = 4;

/// Output frame clock over the analysed window. Frame `i` sits at
/// `start + i / fps`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub start: f32,
    pub end: f32,
    pub fps: u32,
}

impl Timeline {
    pub fn new(window: &AudioWindow, fps: u32) -> Self {
        Self {
            start: window.start,
            end: window.end,
            fps: fps.max(1),
        }
    }

    pub fn duration(&self) -> f32 {
        (self.end - self.start).max(0.0)
    }

    /// Seconds between two frames.
    pub fn hop(&self) -> f32 {
        1.0 / self.fps as f32
    }

    pub fn frame_count(&self) -> u64 {
        let frames = self.duration() as f64 * self.fps as f64;
        ((frames - 1e-6).ceil().max(1.0)) as u64
    }

    pub fn frame_time(&self, index: u64) -> f32 {
        (self.start as f64 + index as f64 / self.fps as f64) as f32
    }
}

/// Tempo grid: beats fall at `offset + k * period` for every integer `k`.
/// The grid is extrapolated before `offset`, so every frame of the window
/// lies in some bar; frames before the first detected beat belong to bar 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    /// Seconds per beat.
    pub period: f32,
    /// Absolute time of the first detected beat.
    pub offset: f32,
}

impl BeatGrid {
    pub fn from_bpm(bpm: f32, offset: f32) -> Option<Self> {
        (bpm.is_finite() && bpm > 0.0).then(|| Self {
            period: 60.0 / bpm,
            offset,
        })
    }

    pub fn bpm(&self) -> f32 {
        60.0 / self.period
    }

    pub fn bar_seconds(&self) -> f32 {
        self.period * BEATS_PER_BAR as f32
    }

    /// Beats elapsed since the first detected beat (negative before it).
    pub fn position(&self, time: f32) -> f64 {
        (time as f64 - self.offset as f64) / self.period as f64
    }

    /// Phase within the current beat, in `[0, 1)`.
    pub fn beat_phase(&self, time: f32) -> f32 {
        let phase = self.position(time).rem_euclid(1.0) as f32;
        if phase >= 1.0 {
            0.0
        } else {
            phase
        }
    }

    pub fn bar_index(&self, time: f32) -> u64 {
        let bar = (self.position(time) / BEATS_PER_BAR as f64).floor();
        if bar <= 0.0 {
            0
        } else {
            bar as u64
        }
    }

    /// Time at which `bar` begins. Bar 0 is open-ended towards the past.
    pub fn bar_start(&self, bar: u64) -> f32 {
        (self.offset as f64 + bar as f64 * self.bar_seconds() as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: f32, end: f32) -> AudioWindow {
        AudioWindow {
            start,
            end,
            first_sample: 0,
            end_sample: 1,
        }
    }

    #[test]
    fn counts_frames_over_window() {
        let timeline = Timeline::new(&window(0.0, 30.0), 24);
        assert_eq!(timeline.frame_count(), 720);
        assert_eq!(timeline.frame_time(192), 8.0);

        let short = Timeline::new(&window(1.0, 1.01), 24);
        assert_eq!(short.frame_count(), 1);
        assert_eq!(short.frame_time(0), 1.0);
    }

    #[test]
    fn grid_maps_time_to_bars_and_phase() {
        let grid = BeatGrid::from_bpm(120.0, 0.25).unwrap();
        assert!((grid.bar_seconds() - 2.0).abs() < 1e-6);
        assert_eq!(grid.bar_index(0.0), 0);
        assert_eq!(grid.bar_index(2.24), 0);
        assert_eq!(grid.bar_index(2.25), 1);
        assert_eq!(grid.bar_index(10.3), 5);
        assert!((grid.beat_phase(0.5) - 0.5).abs() < 1e-5);
        assert!((grid.beat_phase(0.0) - 0.5).abs() < 1e-5);
        assert!((grid.bar_start(3) - 6.25).abs() < 1e-5);
    }

    #[test]
    fn rejects_degenerate_tempo() {
        assert!(BeatGrid::from_bpm(0.0, 0.0).is_none());
        assert!(BeatGrid::from_bpm(f32::NAN, 0.0).is_none());
    }
}
