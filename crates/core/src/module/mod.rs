//! Generative visual modules.
//!
//! Every variant is a deterministic algorithm behind the [`Module`] trait.
//! The closed [`ModuleKind`] registry is what the scene controller draws
//! from; instances are built with [`ModuleKind::initialize`].
//!
//! A module's frame is a pure function of its seeded parameters, the time
//! elapsed since it spawned and the current feature frame. Anything that
//! "accumulates" (drifting phases, particle paths, grown outlines) is
//! re-derived from elapsed time, so frames can be rendered in any order.

mod background;
mod hero;
pub mod palette;
mod texture;
pub mod util;

use rand::Rng;
use serde::{Deserialize, Serialize};
use vello_cpu::kurbo::{Point, Vec2};

pub use palette::Palette;

use crate::{
    analysis::{Band, FeatureFrame},
    config::ContourMode,
    mapping::Drive,
    render::{BlendMode, Canvas},
    scene::Slot,
    Result,
};

/// Seeded construction parameters of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleParams {
    pub seed: u64,
    pub complexity: f32,
    pub speed: f32,
    pub palette: Palette,
    /// Band the instance reacts to.
    pub band: Band,
    pub contour: ContourMode,
    pub placement: Placement,
}

/// Where an instance sits on the canvas. Anchors are in normalised
/// coordinates; drift is in units per second of module clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub anchor: Vec2,
    pub drift: Vec2,
}

const OFF_CENTRE_CHANCE: f64 = 0.5;
const DRIFT_CHANCE: f64 = 0.3;
const MAX_DRIFT: f64 = 0.05;

impl Placement {
    pub const CENTRED: Placement = Placement {
        anchor: Vec2::new(0.5, 0.5),
        drift: Vec2::ZERO,
    };

    /// Half of all instances sit off-centre and about a third of them drift.
    pub fn seeded(seed: u64) -> Self {
        let mut rng = util::rng(util::mix64(seed, 0x706c_6163));
        let anchor = if rng.gen_bool(OFF_CENTRE_CHANCE) {
            Vec2::new(rng.gen_range(0.1..0.9), rng.gen_range(0.1..0.9))
        } else {
            Vec2::new(0.5, 0.5)
        };
        let drift = if rng.gen_bool(DRIFT_CHANCE) {
            Vec2::new(
                rng.gen_range(-MAX_DRIFT..MAX_DRIFT),
                rng.gen_range(-MAX_DRIFT..MAX_DRIFT),
            )
        } else {
            Vec2::ZERO
        };
        Self { anchor, drift }
    }

    /// Normalised position after `clock`, wrapped onto the unit torus.
    pub fn position(&self, clock: f64) -> Vec2 {
        let p = self.anchor + self.drift * clock;
        Vec2::new(p.x.rem_euclid(1.0), p.y.rem_euclid(1.0))
    }

    /// Pixel position on `canvas` after `clock`.
    pub fn point(&self, canvas: &Canvas, clock: f64) -> Point {
        let p = self.position(clock);
        Point::new(p.x * canvas.width(), p.y * canvas.height())
    }
}

/// Per-frame inputs of [`Module::render`].
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Seconds since the instance spawned.
    pub time: f32,
    pub frame: &'a FeatureFrame,
    pub drive: Drive,
    pub complexity: f32,
    pub speed: f32,
}

impl FrameContext<'_> {
    /// Elapsed time scaled by the speed multiplier.
    pub fn clock(&self) -> f64 {
        f64::from(self.time) * f64::from(self.speed)
    }
}

/// Capability shared by every generative variant.
pub trait Module: Send + Sync {
    fn kind(&self) -> ModuleKind;

    /// Draws the instance for one frame.
    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()>;
}

macro_rules! module_kinds {
    ($($kind:ident => $slot:ident, $blend:ident, $name:literal;)+) => {
        /// Closed catalog of module variants.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum ModuleKind {
            $($kind,)+
        }

        impl ModuleKind {
            pub const ALL: &'static [ModuleKind] = &[$(ModuleKind::$kind,)+];

            pub fn slot(&self) -> Slot {
                match self {
                    $(ModuleKind::$kind => Slot::$slot,)+
                }
            }

            pub fn blend(&self) -> BlendMode {
                match self {
                    $(ModuleKind::$kind => BlendMode::$blend,)+
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(ModuleKind::$kind => $name,)+
                }
            }
        }
    };
}

module_kinds! {
    Terrain => Background, Over, "terrain";
    LightRays => Background, Add, "light_rays";
    Tunnel => Background, Over, "tunnel";
    HexGrid => Background, Over, "hex_grid";
    Moire => Background, Over, "moire";
    Truchet => Background, Over, "truchet";
    Supershape => Hero, Over, "supershape";
    Lissajous => Hero, Over, "lissajous";
    PlatonicSolid => Hero, Over, "platonic_solid";
    Helix => Hero, Over, "helix";
    Polyrhythm => Hero, Over, "polyrhythm";
    Attractor => Hero, Add, "attractor";
    CoralGrowth => Hero, Over, "coral_growth";
    CirclePulse => Hero, Over, "circle_pulse";
    WaveformSpiral => Hero, Over, "waveform_spiral";
    FlowField => Texture, Add, "flow_field";
    Dust => Texture, Add, "dust";
    ScanLines => Texture, Add, "scan_lines";
    Meteors => Texture, Add, "meteors";
    CrossHatch => Texture, Over, "cross_hatch";
    Ripples => Texture, Over, "ripples";
    Network => Texture, Add, "network";
    SparkBurst => Texture, Add, "spark_burst";
    EdgeFlash => Texture, Add, "edge_flash";
}

impl ModuleKind {
    /// Catalog entries that may fill `slot`.
    pub fn for_slot(slot: Slot) -> impl Iterator<Item = ModuleKind> {
        Self::ALL.iter().copied().filter(move |kind| kind.slot() == slot)
    }

    /// Position in the catalog; used as a stable tie-breaker.
    pub fn ordinal(&self) -> usize {
        Self::ALL.iter().position(|kind| kind == self).unwrap_or(usize::MAX)
    }

    /// `true` for variants that draw differently in the "shatter" contour mode.
    pub fn supports_contour(&self) -> bool {
        matches!(
            self,
            ModuleKind::Supershape
                | ModuleKind::PlatonicSolid
                | ModuleKind::Polyrhythm
                | ModuleKind::CirclePulse
        )
    }

    pub fn initialize(&self, params: &ModuleParams) -> Box<dyn Module> {
        match self {
            ModuleKind::Terrain => Box::new(background::Terrain::new(params)),
            ModuleKind::LightRays => Box::new(background::LightRays::new(params)),
            ModuleKind::Tunnel => Box::new(background::Tunnel::new(params)),
            ModuleKind::HexGrid => Box::new(background::HexGrid::new(params)),
            ModuleKind::Moire => Box::new(background::Moire::new(params)),
            ModuleKind::Truchet => Box::new(background::Truchet::new(params)),
            ModuleKind::Supershape => Box::new(hero::Supershape::new(params)),
            ModuleKind::Lissajous => Box::new(hero::Lissajous::new(params)),
            ModuleKind::PlatonicSolid => Box::new(hero::PlatonicSolid::new(params)),
            ModuleKind::Helix => Box::new(hero::Helix::new(params)),
            ModuleKind::Polyrhythm => Box::new(hero::Polyrhythm::new(params)),
            ModuleKind::Attractor => Box::new(hero::Attractor::new(params)),
            ModuleKind::CoralGrowth => Box::new(hero::CoralGrowth::new(params)),
            ModuleKind::CirclePulse => Box::new(hero::CirclePulse::new(params)),
            ModuleKind::WaveformSpiral => Box::new(hero::WaveformSpiral::new(params)),
            ModuleKind::FlowField => Box::new(texture::FlowField::new(params)),
            ModuleKind::Dust => Box::new(texture::Dust::new(params)),
            ModuleKind::ScanLines => Box::new(texture::ScanLines::new(params)),
            ModuleKind::Meteors => Box::new(texture::Meteors::new(params)),
            ModuleKind::CrossHatch => Box::new(texture::CrossHatch::new(params)),
            ModuleKind::Ripples => Box::new(texture::Ripples::new(params)),
            ModuleKind::Network => Box::new(texture::Network::new(params)),
            ModuleKind::SparkBurst => Box::new(texture::SparkBurst::new(params)),
            ModuleKind::EdgeFlash => Box::new(texture::EdgeFlash::new(params)),
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Density helper: `base + extra * complexity`, at least one.
pub(crate) fn scaled_count(base: f32, extra: f32, complexity: f32) -> usize {
    (base + extra * complexity.max(0.0)).round().max(1.0) as usize
}
