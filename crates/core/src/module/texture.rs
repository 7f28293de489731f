//! Texture-slot variants. Their feature density scales with `complexity`.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use rand::Rng;
use vello_cpu::kurbo::{Point, Vec2};

use super::{
    scaled_count,
    util::{self, hash01, hash_signed, value_noise},
    FrameContext, Module, ModuleKind, ModuleParams, Palette, Placement,
};
use crate::{render::Canvas, Result};

/// Particles advected through a noise field, drawn as short trails.
pub struct FlowField {
    seed: u64,
    palette: Palette,
    particles: usize,
    field_scale: f64,
    hue: f32,
}

const FLOW_STEPS: usize = 24;
const FLOW_TRAIL: usize = 6;

impl FlowField {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            particles: scaled_count(120.0, 360.0, params.complexity),
            field_scale: rng.gen_range(1.5..3.0),
            hue: rng.gen(),
        }
    }
}

impl Module for FlowField {
    fn kind(&self) -> ModuleKind {
        ModuleKind::FlowField
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let (w, h) = (canvas.width(), canvas.height());
        let step = 0.01 * (1.0 + f64::from(ctx.drive.level));
        let aspect = h / w;
        let alpha = 0.25 + 0.5 * ctx.drive.level;

        for p in 0..self.particles as u64 {
            let phase = clock * 0.2 + hash01(self.seed, p, 0);
            let cycle = phase.floor().max(0.0) as u64;
            let life = phase.rem_euclid(1.0);
            let mut pos = Vec2::new(hash01(self.seed, p, 1 + cycle * 2), hash01(self.seed, p, 2 + cycle * 2) * aspect);
            let mut trail = Vec::with_capacity(FLOW_TRAIL + 1);
            let steps = (life * FLOW_STEPS as f64) as usize + 1;
            for s in 0..steps {
                let angle = value_noise(self.seed, pos.x * self.field_scale, pos.y * self.field_scale + clock * 0.05) * TAU * 2.0;
                pos += Vec2::from_angle(angle) * step;
                if s + FLOW_TRAIL + 1 >= steps {
                    trail.push(Point::new(pos.x * w, pos.y * w));
                }
            }
            let color = self.palette.color(self.hue + (p % 7) as f32 * 0.05, 0.9, alpha);
            canvas.stroke_polyline(&trail, false, 1.2, color)?;
        }
        Ok(())
    }
}

/// Slow ambient motes that twinkle with the high band.
pub struct Dust {
    seed: u64,
    palette: Palette,
    motes: usize,
    hue: f32,
}

impl Dust {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            motes: scaled_count(80.0, 220.0, params.complexity),
            hue: rng.gen(),
        }
    }
}

impl Module for Dust {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Dust
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let (w, h, unit) = (canvas.width(), canvas.height(), canvas.unit());
        let high = f64::from(ctx.drive.high);

        for i in 0..self.motes as u64 {
            let drift = hash01(self.seed, i, 1) - 0.5;
            let rise = 0.5 + hash01(self.seed, i, 3);
            let x = (hash01(self.seed, i, 0) + clock * 0.02 * drift).rem_euclid(1.0) * w;
            let y = (hash01(self.seed, i, 2) - clock * 0.03 * rise).rem_euclid(1.0) * h;
            let twinkle = 0.5 + 0.5 * (clock * 3.0 + i as f64).sin();
            let size = unit * 0.004 * (1.0 + 2.0 * hash01(self.seed, i, 4)) * (1.0 + high * twinkle);
            let color = self.palette.color(self.hue + drift as f32 * 0.2, 1.0, 0.3 + 0.5 * twinkle as f32);
            canvas.fill_circle(Point::new(x, y), size, color)?;
        }
        Ok(())
    }
}

/// Rolling CRT-style scan lines with a sweeping bright bar.
pub struct ScanLines {
    palette: Palette,
    density: f64,
    hue: f32,
}

impl ScanLines {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            density: 40.0 + 60.0 * f64::from(params.complexity.max(0.0)),
            hue: rng.gen(),
        }
    }
}

impl Module for ScanLines {
    fn kind(&self) -> ModuleKind {
        ModuleKind::ScanLines
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let (w, h) = (canvas.width(), canvas.height());
        let spacing = (canvas.unit() / self.density).max(2.0);
        let line = self.palette.color(self.hue, 0.9, 0.06 + 0.12 * ctx.drive.high);

        let mut y = (clock * 0.5).rem_euclid(1.0) * spacing;
        while y < h {
            canvas.fill_rect(0.0, y, w, 1.0, line)?;
            y += spacing;
        }

        let bar = canvas.unit() * 0.03;
        let sweep = (clock * 0.15).rem_euclid(1.0) * (h + bar) - bar;
        canvas.fill_rect(0.0, sweep, w, bar, self.palette.color(self.hue + 0.1, 1.0, 0.15 + 0.3 * ctx.drive.level))
    }
}

/// Streaks roaming diagonally across the frame.
pub struct Meteors {
    seed: u64,
    palette: Palette,
    count: usize,
    heading: f64,
    hue: f32,
}

impl Meteors {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            count: scaled_count(4.0, 8.0, params.complexity),
            heading: rng.gen_range(0.35..1.2),
            hue: rng.gen(),
        }
    }
}

impl Module for Meteors {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Meteors
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let (w, h, unit) = (canvas.width(), canvas.height(), canvas.unit());
        let dir = Vec2::from_angle(self.heading);
        let travel = w.hypot(h) * 1.3;
        let tail = unit * (0.1 + 0.2 * f64::from(ctx.drive.kick) + 0.1 * f64::from(ctx.drive.level));

        for i in 0..self.count as u64 {
            let rate = 0.25 + 0.35 * hash01(self.seed, i, 0);
            let phase = clock * rate + hash01(self.seed, i, 1);
            let cycle = phase.floor().max(0.0) as u64;
            let start = Point::new(
                (hash01(self.seed, i, 10 + cycle) * 1.4 - 0.6) * w,
                -0.2 * h * hash01(self.seed, i, 11 + cycle),
            );
            let head = start + dir * (phase.rem_euclid(1.0) * travel);
            let color = self.palette.color(self.hue + hash01(self.seed, i, 2) as f32 * 0.3, 1.0, 0.85);
            canvas.stroke_line(head - dir * tail, head, 2.0, color)?;
            canvas.fill_circle(head, 3.0, color)?;
        }
        Ok(())
    }
}

/// Two families of parallel lines whose count multiplies with energy.
pub struct CrossHatch {
    palette: Palette,
    base_lines: usize,
    hue: f32,
}

impl CrossHatch {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            base_lines: scaled_count(6.0, 10.0, params.complexity),
            hue: rng.gen(),
        }
    }
}

impl Module for CrossHatch {
    fn kind(&self) -> ModuleKind {
        ModuleKind::CrossHatch
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let center = canvas.center();
        let reach = canvas.width().hypot(canvas.height());
        let lines = self.base_lines * (1 + (ctx.drive.level * 3.0).floor() as usize);
        let spacing = reach / lines as f64;
        let scroll = (clock * 0.1).rem_euclid(1.0) * spacing;

        for family in 0..2 {
            let angle = clock * 0.05 + FRAC_PI_4 + family as f64 * FRAC_PI_2;
            let along = Vec2::from_angle(angle);
            let normal = Vec2::new(-along.y, along.x);
            let color = self.palette.color(self.hue + family as f32 * 0.3, 0.9, 0.35);
            for k in 0..lines {
                let offset = (k as f64 - lines as f64 * 0.5) * spacing + scroll;
                let mid = center + normal * offset;
                canvas.stroke_line(mid - along * reach, mid + along * reach, 1.0, color)?;
            }
        }
        Ok(())
    }
}

/// Expanding circular wavefronts from a few seeded sources.
pub struct Ripples {
    seed: u64,
    palette: Palette,
    sources: usize,
    rings: usize,
    hue: f32,
}

impl Ripples {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            sources: rng.gen_range(2..=4),
            rings: scaled_count(3.0, 5.0, params.complexity),
            hue: rng.gen(),
        }
    }
}

impl Module for Ripples {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Ripples
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let (w, h) = (canvas.width(), canvas.height());
        let max_radius = canvas.unit() * 0.6;
        let boost = if ctx.drive.onset { 0.2 } else { 0.0 };

        for s in 0..self.sources as u64 {
            let source = Point::new(hash01(self.seed, s, 0) * w, hash01(self.seed, s, 1) * h);
            let offset = hash01(self.seed, s, 2);
            for k in 0..self.rings {
                let phase = (clock * 0.3 + k as f64 / self.rings as f64 + offset).rem_euclid(1.0);
                let fade = (1.0 - phase) as f32;
                let color = self.palette.color(
                    self.hue + s as f32 * 0.2,
                    0.9,
                    fade * (0.4 + 0.5 * ctx.drive.level) + boost,
                );
                canvas.stroke_circle(source, phase * max_radius, 1.5 + 2.0 * (1.0 - phase), color)?;
            }
        }
        Ok(())
    }
}

/// Wandering nodes linked to every neighbour within reach.
pub struct Network {
    seed: u64,
    palette: Palette,
    nodes: usize,
    reach: f64,
    hue: f32,
}

impl Network {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            nodes: scaled_count(8.0, 7.0, params.complexity).min(40),
            reach: rng.gen_range(0.2..0.3),
            hue: rng.gen(),
        }
    }
}

/// Reflects `x` back and forth across `[0, 1]`.
fn bounce(x: f64) -> f64 {
    let t = x.rem_euclid(2.0);
    if t > 1.0 {
        2.0 - t
    } else {
        t
    }
}

impl Module for Network {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Network
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let (w, h, unit) = (canvas.width(), canvas.height(), canvas.unit());
        let level = f64::from(ctx.drive.level);
        let surge = f64::from(ctx.drive.bass).powi(2);

        let nodes: Vec<Point> = (0..self.nodes as u64)
            .map(|i| {
                let start = Vec2::new(hash01(self.seed, i, 0), hash01(self.seed, i, 1));
                let velocity = Vec2::new(hash_signed(self.seed, i, 2), hash_signed(self.seed, i, 3)) * 0.08;
                let p = start + velocity * clock + velocity * (0.5 * surge);
                Point::new(bounce(p.x) * w, bounce(p.y) * h)
            })
            .collect();

        let reach = unit * self.reach;
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                let closeness = 1.0 - a.distance(*b) / reach;
                if closeness <= 0.0 {
                    continue;
                }
                let alpha = (closeness * (0.5 + level)).min(1.0) as f32;
                let color = self.palette.color(self.hue, 0.9, alpha);
                canvas.stroke_line(*a, *b, 0.5 + closeness * 4.0 * level, color)?;
            }
        }
        let radius = unit * (0.006 + 0.015 * level);
        let color = self.palette.color(self.hue + 0.1, 1.0, 0.9);
        for node in &nodes {
            canvas.fill_circle(*node, radius, color)?;
        }
        Ok(())
    }
}

/// Repeating spark bursts from the instance's anchor. Each burst is keyed
/// to its cycle number, so sparks are re-derived rather than simulated.
pub struct SparkBurst {
    seed: u64,
    palette: Palette,
    placement: Placement,
    sparks: usize,
    period: f64,
    hue: f32,
}

impl SparkBurst {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            placement: params.placement,
            sparks: scaled_count(6.0, 8.0, params.complexity),
            period: rng.gen_range(0.4..0.9),
            hue: rng.gen(),
        }
    }
}

impl Module for SparkBurst {
    fn kind(&self) -> ModuleKind {
        ModuleKind::SparkBurst
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let unit = canvas.unit();
        let cycle_pos = clock / self.period;
        let burst = cycle_pos.floor().max(0.0) as u64;
        let age = cycle_pos.rem_euclid(1.0);
        let life = 1.0 - 0.85 * age;
        let spark_seed = util::mix64(self.seed, burst);
        let origin = self.placement.point(canvas, clock)
            + Vec2::new(hash_signed(self.seed, burst, 0), hash_signed(self.seed, burst, 1)) * (unit * 0.05);
        let glow = (life as f32) * (0.3 + 0.7 * ctx.drive.level);
        let size = (unit * 0.008 * (1.0 + f64::from(ctx.drive.accent)) * life).max(1.0);

        for i in 0..self.sparks as u64 {
            let angle = hash01(spark_seed, i, 0) * TAU;
            let reach = unit * (0.15 + 0.3 * hash01(spark_seed, i, 1));
            let p = origin + Vec2::from_angle(angle) * (reach * age);
            let color = self.palette.color(self.hue + (i % 5) as f32 * 0.04, 1.0, glow);
            canvas.fill_circle(p, size, color)?;
        }
        Ok(())
    }
}

/// Glowing frame border that only lights up on very loud frames.
pub struct EdgeFlash {
    palette: Palette,
    hue: f32,
}

/// Driving level above which the border appears.
const FLASH_LEVEL: f32 = 0.9;
const FLASH_RINGS: usize = 10;

impl EdgeFlash {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            hue: rng.gen(),
        }
    }
}

impl Module for EdgeFlash {
    fn kind(&self) -> ModuleKind {
        ModuleKind::EdgeFlash
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let level = ctx.drive.level;
        if level <= FLASH_LEVEL {
            return Ok(());
        }
        let (w, h) = (canvas.width(), canvas.height());
        let shimmer = 0.85 + 0.15 * (ctx.clock() * 12.0).sin();
        let border = canvas.unit() * 0.06 * f64::from(level) * shimmer;
        let step = border / FLASH_RINGS as f64;

        for i in 0..FLASH_RINGS {
            let inset = i as f64 * step + step * 0.5;
            let corners = [
                Point::new(inset, inset),
                Point::new(w - inset, inset),
                Point::new(w - inset, h - inset),
                Point::new(inset, h - inset),
            ];
            let alpha = 0.6 - i as f32 / 20.0;
            let color = self.palette.color(self.hue, 0.3 + 0.7 * level, alpha);
            canvas.stroke_polyline(&corners, true, step, color)?;
        }
        Ok(())
    }
}
