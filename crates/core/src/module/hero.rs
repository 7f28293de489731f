//! Hero-slot variants: the focal shape of a composition. Each one scales or
//! deforms with the kick drive.

use std::f64::consts::{PI, TAU};

use rand::Rng;
use vello_cpu::kurbo::{Point, Vec2};

use super::{
    scaled_count,
    util::{self, hash_signed, ring, shatter},
    FrameContext, Module, ModuleKind, ModuleParams, Palette, Placement,
};
use crate::{render::{Canvas, Rgba}, Result};

/// Extra scale on frames flagged as a kick onset.
const KICK_PUNCH: f64 = 0.12;

/// Draws a closed outline, optionally broken into shattered segments.
fn outline(
    canvas: &mut Canvas,
    points: &[Point],
    closed: bool,
    shattered: Option<(u64, f64)>,
    width: f64,
    color: Rgba,
) -> Result<()> {
    match shattered {
        Some((seed, amount)) => {
            for (a, b) in shatter(points, closed, seed, amount) {
                canvas.stroke_line(a, b, width, color)?;
            }
            Ok(())
        }
        None => canvas.stroke_polyline(points, closed, width, color),
    }
}

/// Gielis superformula curves morphing between symmetries.
pub struct Supershape {
    seed: u64,
    palette: Palette,
    placement: Placement,
    m: f64,
    n1: f64,
    n2: f64,
    n3: f64,
    layers: usize,
    hue: f32,
    shatter: bool,
}

impl Supershape {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            placement: params.placement,
            m: rng.gen_range(3..=9) as f64,
            n1: rng.gen_range(0.4..2.5),
            n2: rng.gen_range(0.5..3.0),
            n3: rng.gen_range(0.5..3.0),
            layers: scaled_count(1.0, 2.0, params.complexity).min(5),
            hue: rng.gen(),
            shatter: params.contour.is_shatter(),
        }
    }

    fn radius(&self, phi: f64, m: f64, n1: f64) -> f64 {
        let t = m * phi / 4.0;
        let sum = t.cos().abs().powf(self.n2) + t.sin().abs().powf(self.n3);
        let r = sum.powf(-1.0 / n1);
        if r.is_finite() {
            r
        } else {
            1.0
        }
    }
}

impl Module for Supershape {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Supershape
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        const SAMPLES: usize = 180;
        let clock = ctx.clock();
        let kick = f64::from(ctx.drive.kick);
        let m = self.m + (clock * 0.5).sin() * 2.0;
        let n1 = (self.n1 * (1.0 + 0.5 * (clock * 0.37).sin())).max(0.2);
        let punch = if ctx.drive.kicked { KICK_PUNCH } else { 0.0 };
        let scale = canvas.unit() * 0.3 * (1.0 + 0.35 * kick + 0.2 * f64::from(ctx.drive.level) + punch);
        let center = self.placement.point(canvas, clock);

        let radii: Vec<f64> = (0..SAMPLES)
            .map(|i| self.radius(TAU * i as f64 / SAMPLES as f64, m, n1))
            .collect();
        let peak = radii.iter().copied().fold(f64::EPSILON, f64::max);

        for layer in 0..self.layers {
            let shrink = 1.0 - layer as f64 * 0.18;
            let spin = clock * 0.15 * if layer % 2 == 0 { 1.0 } else { -1.0 };
            let points: Vec<Point> = radii
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let phi = TAU * i as f64 / SAMPLES as f64 + spin;
                    center + Vec2::from_angle(phi) * (r / peak * scale * shrink)
                })
                .collect();
            let color = self.palette.color(self.hue + layer as f32 * 0.2, 1.0, 0.9);
            let broken = self
                .shatter
                .then(|| (self.seed ^ layer as u64, canvas.unit() * 0.02 * (1.0 + 3.0 * kick)));
            outline(canvas, &points, true, broken, 2.0 + 2.0 * kick, color)?;
        }
        Ok(())
    }
}

/// Lissajous figure with a drifting phase.
pub struct Lissajous {
    palette: Palette,
    placement: Placement,
    a: f64,
    b: f64,
    copies: usize,
    hue: f32,
}

impl Lissajous {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        let a = rng.gen_range(1..=5);
        let b = (a + rng.gen_range(1..=3)) as f64;
        Self {
            palette: params.palette,
            placement: params.placement,
            a: a as f64,
            b,
            copies: scaled_count(1.0, 1.0, params.complexity).min(3),
            hue: rng.gen(),
        }
    }
}

impl Module for Lissajous {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Lissajous
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        const SAMPLES: usize = 360;
        let clock = ctx.clock();
        let kick = f64::from(ctx.drive.kick);
        let amp = canvas.unit() * 0.35 * (0.8 + 0.2 * f64::from(ctx.drive.level) + 0.2 * kick);
        let wobble = canvas.unit() * 0.02 * kick;
        let center = self.placement.point(canvas, clock);

        for copy in 0..self.copies {
            let delta = clock * 0.5 + copy as f64 * 0.4;
            let points: Vec<Point> = (0..=SAMPLES)
                .map(|i| {
                    let s = TAU * i as f64 / SAMPLES as f64;
                    let jitter = (s * 7.0 + clock * 10.0).sin() * wobble;
                    Point::new(
                        center.x + (self.a * s + delta).sin() * (amp + jitter),
                        center.y + (self.b * s).sin() * (amp + jitter),
                    )
                })
                .collect();
            let color = self.palette.color(self.hue + copy as f32 * 0.25, 1.0, 0.85);
            canvas.stroke_polyline(&points, false, 1.5 + 1.5 * kick, color)?;
        }
        Ok(())
    }
}

const TETRAHEDRON: (&[[f64; 3]], &[(usize, usize)]) = (
    &[[1.0, 1.0, 1.0], [1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, 1.0]],
    &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)],
);

const CUBE: (&[[f64; 3]], &[(usize, usize)]) = (
    &[
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ],
    &[
        (0, 1), (1, 2), (2, 3), (3, 0),
        (4, 5), (5, 6), (6, 7), (7, 4),
        (0, 4), (1, 5), (2, 6), (3, 7),
    ],
);

const OCTAHEDRON: (&[[f64; 3]], &[(usize, usize)]) = (
    &[
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ],
    &[
        (0, 2), (0, 3), (0, 4), (0, 5),
        (1, 2), (1, 3), (1, 4), (1, 5),
        (2, 4), (2, 5), (3, 4), (3, 5),
    ],
);

/// Rotating wireframe platonic solid with perspective projection.
pub struct PlatonicSolid {
    seed: u64,
    palette: Palette,
    placement: Placement,
    solid: usize,
    spin: (f64, f64),
    shells: usize,
    hue: f32,
    shatter: bool,
}

impl PlatonicSolid {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            placement: params.placement,
            solid: rng.gen_range(0..3),
            spin: (rng.gen_range(0.3..0.9), rng.gen_range(0.4..1.1)),
            shells: scaled_count(1.0, 1.0, params.complexity).min(3),
            hue: rng.gen(),
            shatter: params.contour.is_shatter(),
        }
    }
}

impl Module for PlatonicSolid {
    fn kind(&self) -> ModuleKind {
        ModuleKind::PlatonicSolid
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let (vertices, edges) = match self.solid {
            0 => TETRAHEDRON,
            1 => CUBE,
            _ => OCTAHEDRON,
        };
        let clock = ctx.clock();
        let kick = f64::from(ctx.drive.kick);
        let (ax, ay) = (clock * self.spin.0, clock * self.spin.1);
        let (sx, cx, sy, cy) = (ax.sin(), ax.cos(), ay.sin(), ay.cos());
        let punch = if ctx.drive.kicked { KICK_PUNCH } else { 0.0 };
        let center = self.placement.point(canvas, clock);

        for shell in 0..self.shells {
            let scale = canvas.unit()
                * 0.22
                * (1.0 + 0.4 * kick + 0.15 * f64::from(ctx.drive.level) + punch)
                * (1.0 + shell as f64 * 0.45);
            let projected: Vec<Point> = vertices
                .iter()
                .map(|[x, y, z]| {
                    let (y1, z1) = (y * cx - z * sx, y * sx + z * cx);
                    let (x2, z2) = (x * cy + z1 * sy, -x * sy + z1 * cy);
                    let perspective = 3.0 / (z2 + 4.0);
                    center + Vec2::new(x2, y1) * (scale * perspective)
                })
                .collect();
            let color = self.palette.color(self.hue + shell as f32 * 0.3, 1.0, 0.9 - shell as f32 * 0.2);
            for (e, &(a, b)) in edges.iter().enumerate() {
                let segment = [projected[a], projected[b]];
                let broken = self.shatter.then(|| {
                    (self.seed ^ ((shell * 64 + e) as u64), canvas.unit() * 0.015 * (1.0 + 2.0 * kick))
                });
                let points = if broken.is_some() { subdivide(&segment, 4) } else { segment.to_vec() };
                outline(canvas, &points, false, broken, 2.0 + kick, color)?;
            }
        }
        Ok(())
    }
}

fn subdivide(segment: &[Point; 2], parts: usize) -> Vec<Point> {
    (0..=parts)
        .map(|i| segment[0].lerp(segment[1], i as f64 / parts as f64))
        .collect()
}

/// Double helix strands with rungs.
pub struct Helix {
    palette: Palette,
    placement: Placement,
    turns: f64,
    tilt: f64,
    samples: usize,
    hue: f32,
}

impl Helix {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            placement: params.placement,
            turns: rng.gen_range(1.5..3.5),
            tilt: rng.gen_range(-0.5..0.5),
            samples: scaled_count(60.0, 60.0, params.complexity),
            hue: rng.gen(),
        }
    }
}

impl Module for Helix {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Helix
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let amp = canvas.unit()
            * 0.2
            * (0.6 + 0.4 * f64::from(ctx.drive.level) + 0.3 * f64::from(ctx.drive.kick));
        let center = self.placement.point(canvas, clock);
        let axis = Vec2::from_angle(PI / 2.0 + self.tilt);
        let across = Vec2::new(-axis.y, axis.x);
        let length = canvas.height().max(canvas.width()) * 0.9;

        let strand = |phase: f64| -> Vec<Point> {
            (0..=self.samples)
                .map(|i| {
                    let u = i as f64 / self.samples as f64;
                    let angle = u * TAU * self.turns + clock * 2.0 + phase;
                    center + axis * ((u - 0.5) * length) + across * (angle.sin() * amp)
                })
                .collect()
        };
        let first = strand(0.0);
        let second = strand(PI);

        let rung = self.palette.color(self.hue + 0.5, 0.7, 0.5);
        for (a, b) in first.iter().zip(&second).step_by(6) {
            canvas.stroke_line(*a, *b, 1.0, rung)?;
        }
        canvas.stroke_polyline(&first, false, 2.5, self.palette.color(self.hue, 1.0, 0.95))?;
        canvas.stroke_polyline(&second, false, 2.5, self.palette.color(self.hue + 0.3, 1.0, 0.95))?;
        Ok(())
    }
}

/// Nested orbits whose satellites run at integer speed ratios.
pub struct Polyrhythm {
    seed: u64,
    palette: Palette,
    placement: Placement,
    orbits: usize,
    base_speed: f64,
    hue: f32,
    shatter: bool,
}

impl Polyrhythm {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            placement: params.placement,
            orbits: scaled_count(2.0, 2.0, params.complexity).min(6),
            base_speed: rng.gen_range(0.3..0.7),
            hue: rng.gen(),
            shatter: params.contour.is_shatter(),
        }
    }
}

impl Module for Polyrhythm {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Polyrhythm
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let kick = f64::from(ctx.drive.kick);
        let unit = canvas.unit();
        let center = self.placement.point(canvas, clock);

        for orbit in 0..self.orbits {
            let radius = unit * 0.4 * (orbit + 1) as f64 / self.orbits as f64;
            let color = self.palette.color(self.hue + orbit as f32 * 0.15, 1.0, 0.8);
            let track = ring(center, radius, 64, 0.0);
            let broken = self
                .shatter
                .then(|| (self.seed ^ orbit as u64, unit * 0.01 * (1.0 + 2.0 * kick)));
            outline(canvas, &track, true, broken, 1.0, color)?;

            let satellites = orbit + 2;
            let angle = clock * self.base_speed * (orbit + 1) as f64;
            let size = unit
                * 0.02
                * (1.0 + kick + 0.3 * f64::from(ctx.drive.level) + 0.5 * f64::from(ctx.drive.pulse));
            for p in ring(center, radius, satellites, angle) {
                canvas.fill_circle(p, size, color)?;
            }
        }
        Ok(())
    }
}

/// Clifford attractor point cloud.
pub struct Attractor {
    palette: Palette,
    placement: Placement,
    coefficients: [f64; 4],
    points: usize,
    hue: f32,
}

impl Attractor {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            placement: params.placement,
            coefficients: [
                rng.gen_range(-2.0..-1.2),
                rng.gen_range(1.2..2.0),
                rng.gen_range(-1.2..1.2),
                rng.gen_range(-1.2..1.2),
            ],
            points: scaled_count(1_500.0, 3_000.0, params.complexity),
            hue: rng.gen(),
        }
    }
}

impl Module for Attractor {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Attractor
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        const WARMUP: usize = 20;
        let clock = ctx.clock();
        let [a, b, c, d] = self.coefficients;
        let a = a + 0.1 * (clock * 0.2).sin();
        let b = b + 0.1 * (clock * 0.17).cos();
        let scale = canvas.unit() * 0.15 * (1.0 + 0.2 * f64::from(ctx.drive.kick));
        let center = self.placement.point(canvas, clock);
        let color = self.palette.color(
            self.hue + (clock * 0.02) as f32,
            1.0,
            0.35 + 0.3 * ctx.drive.level,
        );

        let (mut x, mut y) = (0.1f64, 0.1f64);
        for i in 0..self.points + WARMUP {
            let nx = (a * y).sin() + c * (a * x).cos();
            let ny = (b * x).sin() + d * (b * y).cos();
            x = nx;
            y = ny;
            if i >= WARMUP {
                canvas.fill_rect(center.x + x * scale, center.y + y * scale, 1.5, 1.5, color)?;
            }
        }
        Ok(())
    }
}

/// Differential growth: a closed line that buckles as it grows.
///
/// The outline is re-grown from its seed every frame for a step count
/// derived from elapsed time, capped so late frames stay cheap.
pub struct CoralGrowth {
    seed: u64,
    palette: Palette,
    placement: Placement,
    max_nodes: usize,
    hue: f32,
}

const CORAL_MAX_STEPS: usize = 90;
const CORAL_REPEL_RADIUS: f64 = 0.05;
const CORAL_MAX_EDGE: f64 = 0.04;
const CORAL_BOUND: f64 = 0.45;

impl CoralGrowth {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            placement: params.placement,
            max_nodes: scaled_count(80.0, 80.0, params.complexity).min(240),
            hue: rng.gen(),
        }
    }

    fn grow(&self, steps: usize) -> Vec<Vec2> {
        let mut nodes: Vec<Vec2> = (0..20)
            .map(|i| {
                let r = 0.1 * (1.0 + 0.1 * hash_signed(self.seed, i, 0));
                Vec2::from_angle(TAU * i as f64 / 20.0) * r
            })
            .collect();

        for step in 0..steps {
            let n = nodes.len();
            let mut next = nodes.clone();
            for i in 0..n {
                let p = nodes[i];
                let midpoint = (nodes[(i + n - 1) % n] + nodes[(i + 1) % n]) * 0.5;
                let mut force = (midpoint - p) * 0.35;
                for (j, q) in nodes.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    let away = p - *q;
                    let dist = away.hypot();
                    if dist > 1e-9 && dist < CORAL_REPEL_RADIUS {
                        force += away / dist * (CORAL_REPEL_RADIUS - dist) * 0.5;
                    }
                }
                let len = p.hypot().max(1e-9);
                let push = 0.002 * (1.0 + hash_signed(self.seed, step as u64, i as u64));
                let mut moved = p + force + p / len * push;
                if moved.hypot() > CORAL_BOUND {
                    moved = moved / moved.hypot() * CORAL_BOUND;
                }
                next[i] = moved;
            }

            let mut grown = Vec::with_capacity(next.len() * 2);
            for i in 0..next.len() {
                let (a, b) = (next[i], next[(i + 1) % next.len()]);
                grown.push(a);
                if grown.len() + (next.len() - i) < self.max_nodes && (b - a).hypot() > CORAL_MAX_EDGE {
                    grown.push((a + b) * 0.5);
                }
            }
            nodes = grown;
        }
        nodes
    }
}

impl Module for CoralGrowth {
    fn kind(&self) -> ModuleKind {
        ModuleKind::CoralGrowth
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let steps = ((clock * 12.0).max(0.0) as usize + 1).min(CORAL_MAX_STEPS);
        let kick = f64::from(ctx.drive.kick);
        let scale = canvas.unit() * (1.0 + 0.15 * kick);
        let center = self.placement.point(canvas, clock);
        let points: Vec<Point> = self
            .grow(steps)
            .into_iter()
            .map(|v| center + v * scale)
            .collect();
        let color = self.palette.color(
            self.hue + steps as f32 * 0.002,
            0.7 + 0.3 * ctx.drive.level,
            0.95,
        );
        canvas.stroke_polyline(&points, true, 1.5 + 2.0 * kick, color)
    }
}

/// Concentric circles that breathe and jump on kicks.
pub struct CirclePulse {
    seed: u64,
    palette: Palette,
    placement: Placement,
    circles: usize,
    hue: f32,
    shatter: bool,
}

impl CirclePulse {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            placement: params.placement,
            circles: scaled_count(3.0, 5.0, params.complexity),
            hue: rng.gen(),
            shatter: params.contour.is_shatter(),
        }
    }
}

impl Module for CirclePulse {
    fn kind(&self) -> ModuleKind {
        ModuleKind::CirclePulse
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let kick = f64::from(ctx.drive.kick);
        let n = self.circles as f64;
        let unit = canvas.unit();
        let center = self.placement.point(canvas, clock);
        let width = 2.0 + 3.0 * f64::from(ctx.drive.level);

        for i in 0..self.circles {
            let fi = i as f64;
            let radius = unit * 0.4 * (fi + 1.0) / n
                * (1.0
                    + 0.3 * kick * (1.0 - fi / n)
                    + 0.08 * f64::from(ctx.drive.pulse)
                    + 0.05 * (clock * 2.0 + fi).sin());
            let color = self.palette.color(self.hue + fi as f32 / n as f32 * 0.5, 1.0, 0.9);
            if self.shatter {
                let points = ring(center, radius, 72, clock * 0.1);
                outline(canvas, &points, true, Some((self.seed ^ i as u64, unit * 0.015 * (1.0 + 2.0 * kick))), width, color)?;
            } else {
                canvas.stroke_circle(center, radius, width, color)?;
            }
        }
        Ok(())
    }
}

/// Logarithmic spiral carrying a waveform wobble, mirrored through its
/// centre.
pub struct WaveformSpiral {
    palette: Palette,
    placement: Placement,
    growth: f64,
    turn_rate: f64,
    distortion: f64,
    arms: usize,
    hue: f32,
}

const SPIRAL_POINTS: usize = 100;

impl WaveformSpiral {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            placement: params.placement,
            growth: rng.gen_range(0.1..0.2),
            turn_rate: rng.gen_range(0.6..1.4),
            distortion: rng.gen_range(0.5..1.5),
            arms: scaled_count(1.0, 1.0, params.complexity).min(3),
            hue: rng.gen(),
        }
    }
}

impl Module for WaveformSpiral {
    fn kind(&self) -> ModuleKind {
        ModuleKind::WaveformSpiral
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let level = f64::from(ctx.drive.level);
        let kick = f64::from(ctx.drive.kick);
        let punch = if ctx.drive.kicked { KICK_PUNCH } else { 0.0 };
        let center = self.placement.point(canvas, clock);
        // Rotation advances with the clock; energy only nudges it.
        let rotation = clock * self.turn_rate + 0.3 * level;
        let outer = (self.growth * 0.2 * SPIRAL_POINTS as f64).exp();
        let scale = canvas.unit() * 0.45 / outer * (1.0 + 0.3 * kick + punch);
        let wobble = canvas.unit() * 0.015 * level * self.distortion;
        let time = f64::from(ctx.frame.time);

        for arm in 0..self.arms {
            let offset = rotation + TAU * arm as f64 / self.arms as f64;
            let points: Vec<Point> = (0..SPIRAL_POINTS)
                .map(|i| {
                    let s = i as f64 * 0.2;
                    let expansion = 1.0 + level * 0.5 * (i as f64 * 0.1 + time).sin();
                    let r = (self.growth * s).exp() * scale * expansion;
                    let jitter = Vec2::new(
                        (time * 10.0 + i as f64 * 0.5).sin(),
                        (time * 9.0 + i as f64 * 0.5).cos(),
                    ) * wobble;
                    center + Vec2::from_angle(s + offset) * r + jitter
                })
                .collect();
            let mirrored: Vec<Point> = points.iter().map(|p| center - (*p - center)).collect();
            let color = self.palette.color(self.hue + arm as f32 * 0.2, 1.0, 0.9);
            canvas.stroke_polyline(&points, false, 2.0 + kick, color)?;
            canvas.stroke_polyline(&mirrored, false, 2.0 + kick, color)?;
        }
        Ok(())
    }
}
