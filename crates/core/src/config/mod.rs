use serde::{Deserialize, Serialize};

use crate::{module::Palette, BeatscapeError, Result};

/// Contour styles that at least one module knows how to draw.
pub const KNOWN_CONTOUR_MODES: &[&str] = &["shatter"];

/// Top-level configuration for a render. Values are validated by
/// [`RenderConfig::validate`] before any analysis starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Bass level in [0, 1] a kick has to exceed.
    pub kick_threshold: f32,
    /// Global motion multiplier.
    pub speed: f32,
    /// Global density multiplier. Below [`crate::scene::MIN_HERO_COMPLEXITY`]
    /// compositions fall back to a single background layer.
    pub complexity: f32,
    /// Number of bars between scene swaps.
    pub bars: i64,
    /// Start of the analysed window in seconds.
    pub start: f32,
    /// End of the analysed window in seconds, `None` renders to the end of the track.
    pub end: Option<f32>,
    /// Track seed. `None` derives one from the audio content.
    pub seed: Option<u64>,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Opaque style switch handed to the modules that support it.
    pub contour_mode: Option<String>,
    /// Forces one palette for every composition.
    pub palette: Option<Palette>,
    /// Seconds a freshly spawned module needs to reach full opacity.
    pub fade_in: f32,
    pub bands: BandRanges,
    pub effects: EffectsConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            kick_threshold: 0.6,
            speed: 1.0,
            complexity: 1.0,
            bars: 8,
            start: 0.0,
            end: None,
            seed: None,
            fps: 24,
            width: 1080,
            height: 1920,
            contour_mode: None,
            palette: None,
            fade_in: 1.0,
            bands: BandRanges::default(),
            effects: EffectsConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Parses a JSON configuration. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| BeatscapeError::config(format!("malformed config json: {err}")))
    }

    /// Rejects every value the renderer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.kick_threshold) {
            return Err(BeatscapeError::config(format!(
                "kick_threshold must lie in [0, 1], got {}",
                self.kick_threshold
            )));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(BeatscapeError::config(format!(
                "speed must be positive, got {}",
                self.speed
            )));
        }
        if !(self.complexity.is_finite() && self.complexity > 0.0) {
            return Err(BeatscapeError::config(format!(
                "complexity must be positive, got {}",
                self.complexity
            )));
        }
        if self.bars <= 0 {
            return Err(BeatscapeError::config(format!(
                "bars must be a positive integer, got {}",
                self.bars
            )));
        }
        if !(self.start.is_finite() && self.start >= 0.0) {
            return Err(BeatscapeError::config("start must be a non-negative time"));
        }
        if let Some(end) = self.end {
            if !(end.is_finite() && end > self.start) {
                return Err(BeatscapeError::config(format!(
                    "end ({end}) must come after start ({})",
                    self.start
                )));
            }
        }
        if self.fps == 0 {
            return Err(BeatscapeError::config("fps must be non-zero"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(BeatscapeError::config("frame size must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(BeatscapeError::config(
                "frame width and height must be even",
            ));
        }
        if self.width > u16::MAX as u32 || self.height > u16::MAX as u32 {
            return Err(BeatscapeError::config("frame size exceeds 65535 pixels"));
        }
        if !(self.fade_in.is_finite() && self.fade_in >= 0.0) {
            return Err(BeatscapeError::config("fade_in must be non-negative"));
        }
        self.bands.validate()?;
        self.effects.validate()
    }

    /// Number of bars between swaps once validation has passed.
    pub fn bars_per_scene(&self) -> u64 {
        self.bars.max(1) as u64
    }

    pub fn contour(&self) -> ContourMode {
        ContourMode::new(self.contour_mode.as_deref())
    }
}

/// Frequency ranges in Hz of the three analysed bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandRanges {
    pub bass: (f32, f32),
    pub mid: (f32, f32),
    pub high: (f32, f32),
}

impl Default for BandRanges {
    fn default() -> Self {
        Self {
            bass: (20.0, 250.0),
            mid: (250.0, 2_000.0),
            high: (2_000.0, 16_000.0),
        }
    }
}

impl BandRanges {
    fn validate(&self) -> Result<()> {
        for (name, (lo, hi)) in [("bass", self.bass), ("mid", self.mid), ("high", self.high)] {
            if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && hi > lo) {
                return Err(BeatscapeError::config(format!(
                    "{name} band range must be ascending and non-empty, got {lo}..{hi}"
                )));
            }
        }
        if self.bass.1 > self.mid.0 + f32::EPSILON || self.mid.1 > self.high.0 + f32::EPSILON {
            return Err(BeatscapeError::config("band ranges must not overlap"));
        }
        Ok(())
    }
}

/// How the kaleidoscope stage is switched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KaleidoscopeMode {
    Off,
    On,
    /// Each composition decides from its seed, flipping now and then at swaps.
    Evolve,
}

/// Toggles and tuning for the post-processing chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub glitch: bool,
    pub kaleidoscope: KaleidoscopeMode,
    /// Fold count of the kaleidoscope symmetry.
    pub folds: u32,
    pub feedback: bool,
    /// Overrides the trail decay derived from speed and complexity.
    pub trail_decay: Option<f32>,
    /// Screen shake on strong accents.
    pub shake: bool,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            glitch: true,
            kaleidoscope: KaleidoscopeMode::Evolve,
            folds: 6,
            feedback: true,
            trail_decay: None,
            shake: true,
        }
    }
}

impl EffectsConfig {
    fn validate(&self) -> Result<()> {
        if self.folds < 2 {
            return Err(BeatscapeError::config(format!(
                "kaleidoscope folds must be at least 2, got {}",
                self.folds
            )));
        }
        if let Some(decay) = self.trail_decay {
            if !(0.0..1.0).contains(&decay) {
                return Err(BeatscapeError::config(format!(
                    "trail_decay must lie in [0, 1), got {decay}"
                )));
            }
        }
        Ok(())
    }
}

/// Opaque contour style. Only modules that understand a mode react to it,
/// every other module ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContourMode(Option<String>);

impl ContourMode {
    pub fn new(raw: Option<&str>) -> Self {
        Self(
            raw.map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_shatter(&self) -> bool {
        self.as_str() == Some("shatter")
    }

    /// `false` when a mode is set that no module understands.
    pub fn is_known(&self) -> bool {
        self.as_str()
            .map(|mode| KNOWN_CONTOUR_MODES.contains(&mode))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RenderConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cases: Vec<Box<dyn Fn(&mut RenderConfig)>> = vec![
            Box::new(|c| c.kick_threshold = 1.2),
            Box::new(|c| c.kick_threshold = -0.1),
            Box::new(|c| c.bars = 0),
            Box::new(|c| c.bars = -4),
            Box::new(|c| c.speed = 0.0),
            Box::new(|c| c.complexity = -1.0),
            Box::new(|c| c.end = Some(0.0)),
            Box::new(|c| c.fps = 0),
            Box::new(|c| c.width = 1081),
            Box::new(|c| c.effects.folds = 1),
            Box::new(|c| c.effects.trail_decay = Some(1.0)),
            Box::new(|c| c.bands.mid = (300.0, 200.0)),
        ];

        for mutate in cases {
            let mut config = RenderConfig::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(err.is_config(), "unexpected error kind: {err}");
        }
    }

    #[test]
    fn parses_partial_json() {
        let config =
            RenderConfig::from_json(r#"{ "bars": 4, "contour_mode": "Shatter" }"#).unwrap();
        assert_eq!(config.bars, 4);
        assert_eq!(config.fps, 24);
        assert!(config.contour().is_shatter());
        assert!(RenderConfig::from_json("{ nope").unwrap_err().is_config());
    }

    #[test]
    fn contour_mode_is_opaque() {
        assert!(ContourMode::new(None).is_known());
        assert!(ContourMode::new(Some("  ")).as_str().is_none());
        let odd = ContourMode::new(Some("melt"));
        assert_eq!(odd.as_str(), Some("melt"));
        assert!(!odd.is_known());
        assert!(!odd.is_shatter());
    }
}
