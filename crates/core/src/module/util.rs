//! Seed mixing, stateless hashes and noise shared by the module variants.

use std::f64::consts::TAU;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use vello_cpu::kurbo::{Point, Vec2};

/// SplitMix64 finaliser over the combination of two values.
pub fn mix64(a: u64, b: u64) -> u64 {
    let mut z = a ^ b.wrapping_add(0x9e37_79b9_7f4a_7c15).rotate_left(17);
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Uniform value in `[0, 1)` addressed by `(seed, a, b)`.
pub fn hash01(seed: u64, a: u64, b: u64) -> f64 {
    (mix64(mix64(seed, a), b) >> 11) as f64 / (1u64 << 53) as f64
}

/// Uniform value in `[-1, 1)`.
pub fn hash_signed(seed: u64, a: u64, b: u64) -> f64 {
    hash01(seed, a, b) * 2.0 - 1.0
}

/// Smooth 2D value noise in `[0, 1]`.
pub fn value_noise(seed: u64, x: f64, y: f64) -> f64 {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (smooth(x - x0), smooth(y - y0));
    let corner = |dx: f64, dy: f64| {
        hash01(seed, (x0 + dx) as i64 as u64, (y0 + dy) as i64 as u64)
    };
    let top = lerp(corner(0.0, 0.0), corner(1.0, 0.0), fx);
    let bottom = lerp(corner(0.0, 1.0), corner(1.0, 1.0), fx);
    lerp(top, bottom, fy)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn smooth(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Points on a regular polygon (or a circle, for large `sides`).
pub fn ring(center: Point, radius: f64, sides: usize, rotation: f64) -> Vec<Point> {
    (0..sides)
        .map(|i| {
            let angle = rotation + TAU * i as f64 / sides as f64;
            center + Vec2::from_angle(angle) * radius
        })
        .collect()
}

/// Breaks an outline into short segments pushed apart along their normals.
/// `amount` is the displacement in pixels.
pub fn shatter(points: &[Point], closed: bool, seed: u64, amount: f64) -> Vec<(Point, Point)> {
    let count = if closed { points.len() } else { points.len().saturating_sub(1) };
    (0..count)
        .filter_map(|i| {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            let along = b - a;
            let len = along.hypot();
            if len <= f64::EPSILON {
                return None;
            }
            let normal = Vec2::new(-along.y, along.x) / len;
            let push = normal * (hash_signed(seed, i as u64, 1) * amount)
                + along * (hash_signed(seed, i as u64, 2) * 0.15);
            let gap = 0.12 + 0.2 * hash01(seed, i as u64, 3);
            Some((a + along * gap * 0.5 + push, b - along * gap * 0.5 + push))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_and_bounded() {
        assert_eq!(hash01(1, 2, 3), hash01(1, 2, 3));
        assert_ne!(hash01(1, 2, 3), hash01(1, 2, 4));
        for i in 0..1000 {
            let v = hash01(42, i, i * 7);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn noise_is_continuous() {
        let a = value_noise(9, 3.5, 1.25);
        let b = value_noise(9, 3.5001, 1.25);
        assert!((a - b).abs() < 1e-3);
        assert!((0.0..=1.0).contains(&a));
    }

    #[test]
    fn shatter_keeps_one_segment_per_edge() {
        let square = ring(Point::new(0.0, 0.0), 10.0, 4, 0.0);
        assert_eq!(shatter(&square, true, 5, 3.0).len(), 4);
        assert_eq!(shatter(&square, false, 5, 3.0).len(), 3);
    }
}
