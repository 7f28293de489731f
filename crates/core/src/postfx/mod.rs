//! Fixed-order effect chain applied to every composited frame:
//! glitch, then kaleidoscope, then the accent shake, then the feedback trail.
//!
//! Glitch, kaleidoscope and shake are pure functions of the frame and its
//! features.
//! The trail is the only effect that carries state from one emitted frame to
//! the next, so the chain is split into [`PostProcessor::pre_trail`] (safe to
//! run out of order) and [`FeedbackTrail::apply`] (strictly in frame order).

use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::FeatureFrame,
    config::RenderConfig,
    mapping::kick_drive,
    module::util,
    render::{composite::scale, Raster},
    scene::SceneEffects,
    BeatscapeError, Result,
};

/// Effects in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostEffect {
    Glitch,
    Kaleidoscope,
    Shake,
    FeedbackTrail,
}

/// One entry of the effect chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectEntry {
    pub effect: PostEffect,
    pub enabled: bool,
    /// Strength derived from speed and complexity. For the trail this is
    /// the decay factor.
    pub intensity: f32,
}

/// Ordered chain of post effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectChain {
    pub entries: [EffectEntry; 4],
    pub folds: u32,
    pub kick_threshold: f32,
}

impl EffectChain {
    pub fn from_config(config: &RenderConfig) -> Self {
        let effects = &config.effects;
        let decay = effects
            .trail_decay
            .unwrap_or_else(|| trail_decay(config.speed, config.complexity));
        Self {
            entries: [
                EffectEntry {
                    effect: PostEffect::Glitch,
                    enabled: effects.glitch,
                    intensity: (0.5 + 0.5 * config.complexity).clamp(0.25, 1.5),
                },
                EffectEntry {
                    effect: PostEffect::Kaleidoscope,
                    enabled: true,
                    intensity: (0.1 * config.speed).clamp(0.0, 1.0),
                },
                EffectEntry {
                    effect: PostEffect::Shake,
                    enabled: effects.shake,
                    intensity: (0.75 + 0.25 * config.speed).clamp(0.5, 1.5),
                },
                EffectEntry {
                    effect: PostEffect::FeedbackTrail,
                    enabled: effects.feedback,
                    intensity: decay,
                },
            ],
            folds: effects.folds.max(2),
            kick_threshold: config.kick_threshold,
        }
    }

    pub fn entry(&self, effect: PostEffect) -> &EffectEntry {
        match effect {
            PostEffect::Glitch => &self.entries[0],
            PostEffect::Kaleidoscope => &self.entries[1],
            PostEffect::Shake => &self.entries[2],
            PostEffect::FeedbackTrail => &self.entries[3],
        }
    }

    /// `true` when the glitch fires on `frame`.
    pub fn glitch_fires(&self, frame: &FeatureFrame) -> bool {
        self.entry(PostEffect::Glitch).enabled && frame.kick && frame.bass > self.kick_threshold
    }

    /// `true` when the accent shake fires on `frame`.
    pub fn shake_fires(&self, frame: &FeatureFrame) -> bool {
        self.entry(PostEffect::Shake).enabled && frame.accent > SHAKE_ACCENT
    }
}

/// Accent above which the screen shakes.
pub const SHAKE_ACCENT: f32 = 0.8;
/// Accent above which a glitching frame also flashes white.
pub const FLASH_ACCENT: f32 = 0.95;
const FLASH_MIX: f32 = 0.05;
const SHAKE_STREAM: u64 = 0x7368_616b_6500;
/// Shake range in pixels at the 720-pixel reference size.
const SHAKE_BASE_PX: f32 = 8.0;

impl EffectChain {
    fn shake_reach(&self, frame: &FeatureFrame, unit: u32) -> i64 {
        let px = (SHAKE_BASE_PX + SHAKE_BASE_PX * frame.accent)
            * self.entry(PostEffect::Shake).intensity
            * unit as f32
            / 720.0;
        px.round().max(1.0) as i64
    }
}

/// Trail decay for the given motion and density multipliers.
pub fn trail_decay(speed: f32, complexity: f32) -> f32 {
    (0.85 - 0.15 * speed + 0.05 * complexity).clamp(0.0, 0.95)
}

/// Output of the order-independent part of the chain.
#[derive(Debug, Clone)]
pub struct PreTrail {
    pub raster: Raster,
    pub glitched: bool,
    pub shaken: bool,
}

/// Runs the effect chain. Owns the trail buffer.
#[derive(Debug)]
pub struct PostProcessor {
    chain: EffectChain,
    seed: u64,
    trail: FeedbackTrail,
}

impl PostProcessor {
    pub fn new(config: &RenderConfig, seed: u64) -> Self {
        let chain = EffectChain::from_config(config);
        let trail = chain.entry(PostEffect::FeedbackTrail);
        let decay = if trail.enabled { trail.intensity } else { 0.0 };
        Self {
            chain,
            seed,
            trail: FeedbackTrail::new(decay),
        }
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    pub fn trail(&self) -> &FeedbackTrail {
        &self.trail
    }

    /// Glitch and kaleidoscope stages.
    pub fn pre_trail(
        &self,
        mut raster: Raster,
        frame: &FeatureFrame,
        effects: SceneEffects,
    ) -> Result<PreTrail> {
        let glitched = self.chain.glitch_fires(frame);
        if glitched {
            let strength = kick_drive(frame.bass, self.chain.kick_threshold)
                * (0.5 + 0.5 * frame.accent)
                * self.chain.entry(PostEffect::Glitch).intensity;
            glitch(&mut raster, strength.max(0.05), util::mix64(self.seed, frame.index));
            if frame.accent > FLASH_ACCENT {
                flash(&mut raster, FLASH_MIX);
            }
        }
        if effects.kaleidoscope {
            let spin = frame.time * self.chain.entry(PostEffect::Kaleidoscope).intensity;
            raster = kaleidoscope(&raster, self.chain.folds, spin);
        }
        let shaken = self.chain.shake_fires(frame);
        if shaken {
            let reach = self
                .chain
                .shake_reach(frame, raster.width().min(raster.height()));
            let mut rng = util::rng(util::mix64(self.seed ^ SHAKE_STREAM, frame.index));
            let (dx, dy) = (rng.gen_range(-reach..=reach), rng.gen_range(-reach..=reach));
            raster = offset(&raster, dx, dy);
        }
        Ok(PreTrail {
            raster,
            glitched,
            shaken,
        })
    }

    /// Full chain for one frame, in order.
    pub fn process(
        &mut self,
        raster: Raster,
        frame: &FeatureFrame,
        effects: SceneEffects,
    ) -> Result<PreTrail> {
        let pre = self.pre_trail(raster, frame, effects)?;
        Ok(PreTrail {
            raster: self.trail.apply(pre.raster)?,
            ..pre
        })
    }

    pub fn apply_trail(&mut self, raster: Raster) -> Result<Raster> {
        self.trail.apply(raster)
    }
}

/// Blends each frame with a decayed copy of the previously emitted frame.
#[derive(Debug, Clone)]
pub struct FeedbackTrail {
    decay: f32,
    previous: Option<Raster>,
}

impl FeedbackTrail {
    pub fn new(decay: f32) -> Self {
        Self {
            decay: decay.clamp(0.0, 1.0),
            previous: None,
        }
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Per channel `max(current, previous * decay)`. With zero decay the
    /// frame passes through unchanged.
    pub fn apply(&mut self, current: Raster) -> Result<Raster> {
        let out = match self.previous.take() {
            Some(previous) if self.decay > 0.0 => {
                if !previous.same_size(&current) {
                    return Err(BeatscapeError::render("trail buffer size changed mid-render"));
                }
                let mut out = current;
                for (d, p) in out
                    .data_mut()
                    .chunks_exact_mut(4)
                    .zip(previous.data().chunks_exact(4))
                {
                    let faded = scale([p[0], p[1], p[2], p[3]], self.decay);
                    for i in 0..4 {
                        d[i] = d[i].max(faded[i]);
                    }
                }
                out
            }
            _ => current,
        };
        self.previous = Some(out.clone());
        Ok(out)
    }
}

/// Horizontal block displacement plus an RGB channel split.
fn glitch(raster: &mut Raster, strength: f32, seed: u64) {
    let (w, h) = (raster.width() as usize, raster.height() as usize);
    if w == 0 || h == 0 {
        return;
    }
    let mut rng = util::rng(seed);
    let strength = strength.clamp(0.0, 1.0);
    let blocks = 3 + (8.0 * strength) as usize;
    let row_bytes = w * 4;
    let data = raster.data_mut();

    for _ in 0..blocks {
        let y0 = rng.gen_range(0..h);
        let height = rng.gen_range(1..=(h / 8).max(1));
        let max_shift = ((w as f32 * 0.1 * strength) as usize).max(1);
        let shift = rng.gen_range(1..=max_shift);
        let left = rng.gen_bool(0.5);
        for y in y0..(y0 + height).min(h) {
            let row = &mut data[y * row_bytes..(y + 1) * row_bytes];
            if left {
                row.rotate_left(shift * 4);
            } else {
                row.rotate_right(shift * 4);
            }
        }
    }

    let split = ((w as f32 * 0.01 * strength).round() as usize).max(1).min(w - 1);
    if split == 0 {
        return;
    }
    for y in 0..h {
        let row = &mut data[y * row_bytes..(y + 1) * row_bytes];
        let source = row.to_vec();
        for x in 0..w {
            let red_from = (x + split).min(w - 1);
            let blue_from = x.saturating_sub(split);
            row[x * 4] = source[red_from * 4].min(source[x * 4 + 3]);
            row[x * 4 + 2] = source[blue_from * 4 + 2].min(source[x * 4 + 3]);
        }
    }
}

/// Mixes `amount` of white into every pixel, keeping alpha.
fn flash(raster: &mut Raster, amount: f32) {
    for px in raster.data_mut().chunks_exact_mut(4) {
        let a = f32::from(px[3]);
        for c in &mut px[..3] {
            let v = f32::from(*c);
            *c = (v + (a - v) * amount).round().min(a) as u8;
        }
    }
}

/// Toroidal shift of the whole frame by `(dx, dy)` pixels.
fn offset(source: &Raster, dx: i64, dy: i64) -> Raster {
    let (w, h) = (source.width() as i64, source.height() as i64);
    let mut out = Raster::new(source.width(), source.height());
    if w == 0 || h == 0 {
        return out;
    }
    let src = source.data();
    let dst = out.data_mut();
    for y in 0..h {
        let sy = (y - dy).rem_euclid(h);
        for x in 0..w {
            let sx = (x - dx).rem_euclid(w);
            let from = ((sy * w + sx) * 4) as usize;
            let to = ((y * w + x) * 4) as usize;
            dst[to..to + 4].copy_from_slice(&src[from..from + 4]);
        }
    }
    out
}

/// N-fold polar mirror around the frame centre.
fn kaleidoscope(source: &Raster, folds: u32, spin: f32) -> Raster {
    let (w, h) = (source.width(), source.height());
    let mut out = Raster::new(w, h);
    let (cx, cy) = (w as f32 * 0.5, h as f32 * 0.5);
    let wedge = TAU / folds.max(2) as f32;
    let src = source.data();
    let dst = out.data_mut();

    for y in 0..h {
        for x in 0..w {
            let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
            let radius = dx.hypot(dy);
            let angle = (dy.atan2(dx) - spin).rem_euclid(TAU);
            let segment = (angle / wedge).floor();
            let mut local = angle - segment * wedge;
            if segment as i64 % 2 == 1 {
                local = wedge - local;
            }
            let theta = local + spin;
            let sx = (cx + radius * theta.cos()).clamp(0.0, w as f32 - 1.0) as usize;
            let sy = (cy + radius * theta.sin()).clamp(0.0, h as f32 - 1.0) as usize;
            let from = (sy * w as usize + sx) * 4;
            let to = (y as usize * w as usize + x as usize) * 4;
            dst[to..to + 4].copy_from_slice(&src[from..from + 4]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32, shift: u8) -> Raster {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[
                    (x * 7) as u8 ^ shift,
                    (y * 5) as u8,
                    (x + y) as u8,
                    255,
                ]);
            }
        }
        Raster::from_parts(w, h, data).unwrap()
    }

    #[test]
    fn zero_decay_trail_is_the_identity() {
        let mut trail = FeedbackTrail::new(0.0);
        for shift in [0u8, 90, 3, 200] {
            let frame = gradient(16, 8, shift);
            assert_eq!(trail.apply(frame.clone()).unwrap(), frame);
        }
    }

    #[test]
    fn trail_keeps_bright_history() {
        let mut trail = FeedbackTrail::new(0.5);
        trail.apply(Raster::filled(2, 2, [200, 200, 200, 255])).unwrap();
        let out = trail.apply(Raster::filled(2, 2, [0, 0, 0, 255])).unwrap();
        assert_eq!(out.pixel(0, 0), [100, 100, 100, 255]);
    }

    #[test]
    fn decay_follows_speed_and_complexity() {
        assert!((trail_decay(1.0, 1.0) - 0.75).abs() < 1e-6);
        assert!(trail_decay(0.3, 1.0) > trail_decay(2.0, 1.0));
        assert_eq!(trail_decay(10.0, 0.1), 0.0);
        let config = RenderConfig {
            effects: crate::config::EffectsConfig {
                trail_decay: Some(0.2),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(PostProcessor::new(&config, 1).trail().decay(), 0.2);
    }

    #[test]
    fn glitch_is_gated_by_the_kick_threshold() {
        let config = RenderConfig {
            kick_threshold: 0.8,
            ..Default::default()
        };
        let post = PostProcessor::new(&config, 7);
        let below = FeatureFrame {
            bass: 0.75,
            kick: true,
            ..Default::default()
        };
        let above = FeatureFrame {
            bass: 0.9,
            kick: true,
            accent: 1.0,
            ..Default::default()
        };
        let frame = gradient(32, 16, 0);

        let out = post.pre_trail(frame.clone(), &below, SceneEffects::default()).unwrap();
        assert!(!out.glitched);
        assert_eq!(out.raster, frame);

        let out = post.pre_trail(frame.clone(), &above, SceneEffects::default()).unwrap();
        assert!(out.glitched);
        assert_ne!(out.raster, frame);
    }

    #[test]
    fn glitch_is_reproducible_per_frame() {
        let post = PostProcessor::new(&RenderConfig::default(), 7);
        let kick = FeatureFrame {
            index: 12,
            bass: 1.0,
            kick: true,
            ..Default::default()
        };
        let a = post.pre_trail(gradient(32, 16, 1), &kick, SceneEffects::default()).unwrap();
        let b = post.pre_trail(gradient(32, 16, 1), &kick, SceneEffects::default()).unwrap();
        assert_eq!(a.raster, b.raster);
    }

    #[test]
    fn strong_accents_shake_the_frame() {
        let post = PostProcessor::new(&RenderConfig::default(), 5);
        let source = gradient(24, 24, 0);
        let calm = FeatureFrame {
            index: 3,
            accent: 0.7,
            ..Default::default()
        };
        let hit = FeatureFrame {
            index: 3,
            accent: 0.9,
            ..Default::default()
        };

        let out = post.pre_trail(source.clone(), &calm, SceneEffects::default()).unwrap();
        assert!(!out.shaken);
        assert_eq!(out.raster, source);

        let a = post.pre_trail(source.clone(), &hit, SceneEffects::default()).unwrap();
        let b = post.pre_trail(source.clone(), &hit, SceneEffects::default()).unwrap();
        assert!(a.shaken);
        assert_eq!(a.raster, b.raster);
        // A toroidal shift keeps every pixel, just moved.
        let mut before: Vec<&[u8]> = source.data().chunks(4).collect();
        let mut after: Vec<&[u8]> = a.raster.data().chunks(4).collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn shake_can_be_disabled() {
        let mut config = RenderConfig::default();
        config.effects.shake = false;
        let post = PostProcessor::new(&config, 5);
        let hit = FeatureFrame {
            accent: 1.0,
            ..Default::default()
        };
        let out = post.pre_trail(gradient(8, 8, 0), &hit, SceneEffects::default()).unwrap();
        assert!(!out.shaken);
        assert_eq!(out.raster, gradient(8, 8, 0));
    }

    #[test]
    fn offset_wraps_around_the_edges() {
        let source = gradient(5, 3, 0);
        let out = offset(&source, 2, -1);
        assert_eq!(out.pixel(2, 0), source.pixel(0, 1));
        assert_eq!(out.pixel(0, 2), source.pixel(3, 0));
    }

    #[test]
    fn flash_whitens_towards_alpha() {
        let mut raster = Raster::filled(1, 1, [0, 100, 255, 255]);
        flash(&mut raster, 0.05);
        assert_eq!(raster.pixel(0, 0), [13, 108, 255, 255]);

        let mut clear = Raster::new(1, 1);
        flash(&mut clear, 0.05);
        assert_eq!(clear.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn kaleidoscope_mirrors_across_the_centre() {
        let source = gradient(33, 33, 0);
        let out = kaleidoscope(&source, 2, 0.0);
        // Two folds mirror the lower half onto the upper half.
        for x in 0..33 {
            assert_eq!(out.pixel(x, 10), out.pixel(x, 22));
        }
    }
}
