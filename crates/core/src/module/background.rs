//! Background-slot variants. They fill the frame, drift with `speed` and
//! swell with mid-band energy.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_6, PI, TAU};

use rand::Rng;
use vello_cpu::kurbo::{Point, Vec2};

use super::{
    scaled_count,
    util::{self, hash01, ring, value_noise},
    FrameContext, Module, ModuleKind, ModuleParams, Palette,
};
use crate::{render::Canvas, Result};

/// Scrolling ridge lines receding towards a horizon.
pub struct Terrain {
    seed: u64,
    palette: Palette,
    rows: usize,
    roughness: f64,
    hue: f32,
}

impl Terrain {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            rows: scaled_count(10.0, 14.0, params.complexity),
            roughness: rng.gen_range(1.5..3.5),
            hue: rng.gen(),
        }
    }
}

impl Module for Terrain {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Terrain
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        const SAMPLES: usize = 48;
        let (w, h) = (canvas.width(), canvas.height());
        let scroll = ctx.clock() * 0.6;
        let horizon = h * 0.35;
        let amp = h * (0.04 + 0.1 * f64::from(ctx.drive.mid));

        for row in 0..self.rows {
            let depth = (row as f64 + 1.0) / self.rows as f64;
            let y_base = horizon + (h - horizon) * depth * depth;
            let z = scroll + row as f64 * 0.37;
            let points: Vec<Point> = (0..=SAMPLES)
                .map(|i| {
                    let u = i as f64 / SAMPLES as f64;
                    let n = value_noise(self.seed, u * self.roughness * (1.0 + depth * 2.0), z);
                    Point::new(u * w, y_base - n * amp * (0.3 + depth))
                })
                .collect();
            let color = self.palette.color(
                self.hue + depth as f32 * 0.5,
                0.35 + 0.65 * depth as f32,
                0.5 + 0.5 * ctx.drive.level,
            );
            canvas.stroke_polyline(&points, false, 1.0 + depth * 1.5, color)?;
        }
        Ok(())
    }
}

/// Soft beams fanning down from above the frame.
pub struct LightRays {
    seed: u64,
    palette: Palette,
    rays: usize,
    origin: f64,
    spread: f64,
    spin: f64,
    hue: f32,
}

impl LightRays {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            rays: scaled_count(6.0, 10.0, params.complexity),
            origin: rng.gen_range(0.2..0.8),
            spread: rng.gen_range(0.8..1.6),
            spin: if rng.gen_bool(0.5) { 1.0 } else { -1.0 },
            hue: rng.gen(),
        }
    }
}

impl Module for LightRays {
    fn kind(&self) -> ModuleKind {
        ModuleKind::LightRays
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let (w, h) = (canvas.width(), canvas.height());
        let origin = Point::new(self.origin * w, -0.1 * h);
        let length = w.hypot(h) * 1.2;
        let sway = 0.15 * (1.0 + f64::from(ctx.drive.mid));
        let last = (self.rays.max(2) - 1) as f64;

        for i in 0..self.rays {
            let jitter = hash01(self.seed, i as u64, 0);
            let angle = FRAC_PI_2
                + self.spread * (i as f64 / last - 0.5)
                + (ctx.clock() * 0.3 * self.spin + i as f64 * 1.7).sin() * sway;
            let half = 0.02 + 0.03 * jitter;
            let beam = [
                origin,
                origin + Vec2::from_angle(angle - half) * length,
                origin + Vec2::from_angle(angle + half) * length,
            ];
            let alpha = 0.12 + 0.3 * ctx.drive.level * (0.5 + jitter as f32);
            canvas.fill_polygon(&beam, self.palette.color(self.hue + jitter as f32 * 0.3, 0.8, alpha))?;
        }
        Ok(())
    }
}

/// Perspective wireframe tunnel flying towards the viewer.
pub struct Tunnel {
    palette: Palette,
    sides: usize,
    rings: usize,
    twist: f64,
    hue: f32,
}

impl Tunnel {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            sides: rng.gen_range(4..=8),
            rings: scaled_count(8.0, 10.0, params.complexity),
            twist: rng.gen_range(-1.5..1.5),
            hue: rng.gen(),
        }
    }
}

impl Module for Tunnel {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Tunnel
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let unit = canvas.unit();
        let center = canvas.center()
            + Vec2::new(
                (clock * 0.4).sin() * 0.05 * canvas.width(),
                (clock * 0.3).cos() * 0.05 * canvas.height(),
            );
        let spin = tunnel_spin(clock, ctx.drive.mid);

        for k in 0..self.rings {
            let z = (k as f64 / self.rings as f64 - clock * 0.25).rem_euclid(1.0);
            let radius = unit * 0.12 / (0.08 + z);
            let points = ring(center, radius, self.sides, spin + z * self.twist);
            let color = self.palette.color(self.hue + z as f32 * 0.4, 0.4 + 0.6 * ctx.drive.level, (1.0 - z as f32) * 0.9);
            canvas.stroke_polyline(&points, true, 1.0 + 2.0 * (1.0 - z), color)?;
        }

        let spoke = self.palette.color(self.hue, 0.6, 0.35);
        for s in 0..self.sides {
            let dir = Vec2::from_angle(spin + TAU * s as f64 / self.sides as f64);
            canvas.stroke_line(center + dir * unit * 0.1, center + dir * unit * 2.0, 1.0, spoke)?;
        }
        Ok(())
    }
}

/// Rotation grows linearly with the clock; mid energy adds a bounded lead
/// on top, so a jump in mid never moves the tunnel by more than the lead.
fn tunnel_spin(clock: f64, mid: f32) -> f64 {
    clock * 0.2 + TUNNEL_MID_LEAD * f64::from(mid.clamp(0.0, 1.0))
}

const TUNNEL_MID_LEAD: f64 = 0.6;

/// Hexagon lattice with radial pulse waves.
pub struct HexGrid {
    palette: Palette,
    columns: usize,
    wave: f64,
    hue: f32,
}

impl HexGrid {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            columns: scaled_count(6.0, 6.0, params.complexity),
            wave: rng.gen_range(5.0..11.0),
            hue: rng.gen(),
        }
    }
}

impl Module for HexGrid {
    fn kind(&self) -> ModuleKind {
        ModuleKind::HexGrid
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let sqrt3 = 3f64.sqrt();
        let size = canvas.width() / self.columns as f64 / sqrt3;
        let center = canvas.center();
        let unit = canvas.unit();
        let rows = (canvas.height() / (1.5 * size)).ceil() as usize + 1;
        let level = f64::from(ctx.drive.level);

        for row in 0..=rows {
            for col in 0..=self.columns {
                let offset = if row % 2 == 1 { sqrt3 * 0.5 * size } else { 0.0 };
                let cell = Point::new(col as f64 * sqrt3 * size + offset, row as f64 * 1.5 * size);
                let dist = cell.distance(center) / unit;
                let pulse = 0.5 + 0.5 * (dist * self.wave - ctx.clock() * 2.5).sin();
                let radius = size * (0.55 + 0.35 * pulse * (0.4 + level));
                let color = self.palette.color(
                    self.hue + dist as f32 * 0.5,
                    0.5 + 0.5 * pulse as f32,
                    0.3 + 0.6 * pulse as f32,
                );
                canvas.stroke_polyline(&ring(cell, radius, 6, FRAC_PI_6), true, 1.2, color)?;
            }
        }
        Ok(())
    }
}

/// Two drifting sets of concentric circles interfering.
pub struct Moire {
    palette: Palette,
    rings: usize,
    orbit: f64,
    hue: f32,
}

impl Moire {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            palette: params.palette,
            rings: scaled_count(14.0, 20.0, params.complexity),
            orbit: rng.gen_range(0.1..0.2),
            hue: rng.gen(),
        }
    }
}

impl Module for Moire {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Moire
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let unit = canvas.unit();
        let reach = canvas.width().hypot(canvas.height()) * 0.6;
        let spacing = reach / self.rings as f64;
        let swing = Vec2::new((clock * 0.31).sin(), (clock * 0.23).cos())
            * unit
            * self.orbit
            * (1.0 + f64::from(ctx.drive.mid));
        let drift = (clock * 0.2).rem_euclid(1.0) * spacing;

        for (set, center) in [canvas.center() + swing, canvas.center() - swing]
            .into_iter()
            .enumerate()
        {
            let color = self.palette.color(self.hue + set as f32 * 0.35, 0.85, 0.55 + 0.4 * ctx.drive.level);
            for i in 0..self.rings {
                canvas.stroke_circle(center, spacing * i as f64 + drift + 1.0, 1.2, color)?;
            }
        }
        Ok(())
    }
}

/// Quarter-arc Truchet tiles re-rolled on a slow clock.
pub struct Truchet {
    seed: u64,
    palette: Palette,
    tiles: usize,
    hue: f32,
}

impl Truchet {
    pub fn new(params: &ModuleParams) -> Self {
        let mut rng = util::rng(params.seed);
        Self {
            seed: params.seed,
            palette: params.palette,
            tiles: scaled_count(6.0, 8.0, params.complexity),
            hue: rng.gen(),
        }
    }
}

impl Module for Truchet {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Truchet
    }

    fn render(&self, ctx: &FrameContext<'_>, canvas: &mut Canvas) -> Result<()> {
        let clock = ctx.clock();
        let size = canvas.width() / self.tiles as f64;
        let rows = (canvas.height() / size).ceil() as usize;
        let epoch = (clock * 0.5).floor().max(0.0) as u64;
        let flip_bias = 0.5 + 0.3 * (f64::from(ctx.drive.mid) - 0.5);
        let width = 1.5 + 2.0 * f64::from(ctx.drive.level);
        let shift = (clock * 0.05).rem_euclid(1.0) as f32;

        for j in 0..rows {
            for i in 0..self.tiles {
                let origin = Point::new(i as f64 * size, j as f64 * size);
                let flipped = hash01(self.seed, (j * self.tiles + i) as u64, epoch) < flip_bias;
                let arcs = if flipped {
                    [
                        (origin + Vec2::new(size, 0.0), FRAC_PI_2),
                        (origin + Vec2::new(0.0, size), -FRAC_PI_2),
                    ]
                } else {
                    [(origin, 0.0), (origin + Vec2::new(size, size), PI)]
                };
                let color = self.palette.color(
                    self.hue + (i + j) as f32 / self.tiles as f32 * 0.5 + shift,
                    0.8,
                    0.8,
                );
                for (corner, start) in arcs {
                    let points: Vec<Point> = (0..=8)
                        .map(|k| corner + Vec2::from_angle(start + FRAC_PI_2 * k as f64 / 8.0) * (size * 0.5))
                        .collect();
                    canvas.stroke_polyline(&points, false, width, color)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_jumps_move_the_tunnel_by_a_bounded_amount() {
        let hop = 1.0 / 24.0;
        for t in [1.0, 16.0, 120.0] {
            let steady = tunnel_spin(t + hop, 0.2) - tunnel_spin(t, 0.2);
            let jump = tunnel_spin(t + hop, 0.6) - tunnel_spin(t, 0.2);
            assert!((steady - 0.2 * hop).abs() < 1e-9);
            assert!((jump - steady - 0.24).abs() < 1e-6, "t={t} jump={jump}");
        }
        assert!(tunnel_spin(0.0, 5.0) <= TUNNEL_MID_LEAD);
    }
}
