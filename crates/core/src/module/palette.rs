use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::render::Rgba;

/// HSV colour families a composition paints with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    Cyberpunk,
    Acid,
    Ice,
    Fire,
}

impl Palette {
    pub const ALL: [Palette; 4] = [Palette::Cyberpunk, Palette::Acid, Palette::Ice, Palette::Fire];

    pub fn pick<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Palette::Cyberpunk => "cyberpunk",
            Palette::Acid => "acid",
            Palette::Ice => "ice",
            Palette::Fire => "fire",
        }
    }

    /// Hue span in degrees and saturation.
    fn spec(&self) -> (f32, f32, f32) {
        match self {
            Palette::Cyberpunk => (285.0, 185.0, 0.9),
            Palette::Acid => (55.0, 135.0, 1.0),
            Palette::Ice => (175.0, 235.0, 0.45),
            Palette::Fire => (0.0, 48.0, 0.95),
        }
    }

    /// Colour at position `t` along the palette, with value and alpha in `[0, 1]`.
    pub fn color(&self, t: f32, value: f32, alpha: f32) -> Rgba {
        let (from, to, saturation) = self.spec();
        let t = t.rem_euclid(1.0);
        // Ping-pong so t = 0 and t = 1 meet without a hue seam.
        let sweep = 1.0 - (2.0 * t - 1.0).abs();
        let hue = from + (to - from) * sweep;
        let [r, g, b] = hsv_to_rgb(hue, saturation, value.clamp(0.0, 1.0));
        [r, g, b, unit_to_u8(alpha)]
    }
}

pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = value * saturation;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    [unit_to_u8(r + m), unit_to_u8(g + m), unit_to_u8(b + m)]
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), [0, 255, 0]);
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), [0, 0, 255]);
        assert_eq!(hsv_to_rgb(42.0, 0.0, 0.5), [128, 128, 128]);
    }

    #[test]
    fn colors_carry_alpha_and_wrap() {
        let palette = Palette::Fire;
        assert_eq!(palette.color(0.25, 1.0, 0.5)[3], 128);
        assert_eq!(palette.color(0.0, 1.0, 1.0), palette.color(1.0, 1.0, 1.0));
    }

    #[test]
    fn parses_lowercase_names() {
        let palette: Palette = serde_json::from_str("\"ice\"").unwrap();
        assert_eq!(palette, Palette::Ice);
        assert_eq!(palette.name(), "ice");
    }
}
