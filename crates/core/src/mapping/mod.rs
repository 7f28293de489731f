use serde::{Deserialize, Serialize};

use crate::analysis::{Band, FeatureFrame};

/// Audio-derived drive values a module reads for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    /// Energy of the band the instance listens to.
    pub level: f32,
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    /// Bass re-expanded above the kick threshold, zero below it.
    pub kick: f32,
    /// `true` on frames flagged as a kick onset.
    pub kicked: bool,
    /// Onset of the driving band.
    pub onset: bool,
    pub accent: f32,
    /// Envelope that peaks on every beat and decays over it.
    pub pulse: f32,
}

impl Drive {
    pub fn new(frame: &FeatureFrame, band: Band, kick_threshold: f32) -> Self {
        let pulse = 1.0 - frame.beat_phase.clamp(0.0, 1.0);
        Self {
            level: frame.energy(band),
            bass: frame.bass,
            mid: frame.mid,
            high: frame.high,
            kick: kick_drive(frame.bass, kick_threshold),
            kicked: frame.kick,
            onset: frame.onset(band),
            accent: frame.accent,
            pulse: pulse * pulse * pulse,
        }
    }

    /// `false` when any drive value is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        [self.level, self.bass, self.mid, self.high, self.kick, self.accent, self.pulse]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// `(bass - threshold) / (1 - threshold)`, clamped to `[0, 1]`.
pub fn kick_drive(bass: f32, threshold: f32) -> f32 {
    if bass <= threshold {
        return 0.0;
    }
    let headroom = 1.0 - threshold;
    if headroom <= f32::EPSILON {
        return 1.0;
    }
    ((bass - threshold) / headroom).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kick_drive_gates_below_threshold() {
        assert_eq!(kick_drive(0.5, 0.6), 0.0);
        assert_eq!(kick_drive(0.6, 0.6), 0.0);
        assert!((kick_drive(0.8, 0.6) - 0.5).abs() < 1e-6);
        assert_eq!(kick_drive(1.0, 1.0), 0.0);
        assert_eq!(kick_drive(1.0, 0.0), 1.0);
    }

    #[test]
    fn drive_follows_the_selected_band() {
        let frame = FeatureFrame {
            bass: 0.9,
            mid: 0.2,
            high: 0.4,
            kick: true,
            beat_phase: 0.0,
            ..Default::default()
        };
        let drive = Drive::new(&frame, Band::High, 0.6);
        assert_eq!(drive.level, 0.4);
        assert!(drive.kicked);
        assert!((drive.kick - 0.75).abs() < 1e-5);
        assert_eq!(drive.pulse, 1.0);
        assert!(drive.is_finite());

        let broken = FeatureFrame {
            mid: f32::NAN,
            ..frame
        };
        assert!(!Drive::new(&broken, Band::Bass, 0.6).is_finite());
    }
}
