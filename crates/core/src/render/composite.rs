use super::{BlendMode, Layer, Raster, Rgba};
use crate::{BeatscapeError, Result};

/// Opaque black, the backdrop every frame is composited on.
pub const BACKDROP: Rgba = [0, 0, 0, 255];

pub type PremulRgba8 = [u8; 4];

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Saturating additive blend of a premultiplied source.
pub fn add(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }
    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = dst[i].saturating_add(mul_div255(u16::from(src[i]), op));
    }
    out
}

/// Scales every channel of a premultiplied pixel.
pub fn scale(px: PremulRgba8, factor: f32) -> PremulRgba8 {
    let f = ((factor.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
    [
        mul_div255(u16::from(px[0]), f),
        mul_div255(u16::from(px[1]), f),
        mul_div255(u16::from(px[2]), f),
        mul_div255(u16::from(px[3]), f),
    ]
}

pub fn blend_in_place(dst: &mut [u8], src: &[u8], mode: BlendMode, opacity: f32) -> Result<()> {
    if dst.len() != src.len() || dst.len() % 4 != 0 {
        return Err(BeatscapeError::render(
            "blend expects equal-length rgba8 buffers",
        ));
    }
    let op: fn(PremulRgba8, PremulRgba8, f32) -> PremulRgba8 = match mode {
        BlendMode::Over => over,
        BlendMode::Add => add,
    };
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = op([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Stacks module layers over an opaque backdrop.
///
/// Layers are ordered by slot z-order (then by module kind for equal
/// slots), so the result never depends on the order the layers were stored
/// in.
#[derive(Debug, Clone)]
pub struct Compositor {
    width: u32,
    height: u32,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn composite(&self, layers: &[Layer]) -> Result<Raster> {
        let mut ordered: Vec<&Layer> = layers.iter().collect();
        ordered.sort_by_key(|layer| (layer.slot.z_order(), layer.module.ordinal()));

        let mut frame = Raster::filled(self.width, self.height, BACKDROP);
        for layer in ordered {
            if !layer.raster.same_size(&frame) {
                return Err(BeatscapeError::render(format!(
                    "{} layer is {}x{}, frame is {}x{}",
                    layer.module.name(),
                    layer.raster.width(),
                    layer.raster.height(),
                    self.width,
                    self.height
                )));
            }
            if !layer.opacity.is_finite() {
                return Err(BeatscapeError::render(format!(
                    "{} layer has non-finite opacity",
                    layer.module.name()
                )));
            }
            blend_in_place(
                frame.data_mut(),
                layer.raster.data(),
                layer.blend,
                layer.opacity,
            )?;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{module::ModuleKind, scene::Slot};

    fn layer(module: ModuleKind, px: PremulRgba8) -> Layer {
        Layer {
            module,
            slot: module.slot(),
            blend: module.blend(),
            opacity: 1.0,
            raster: Raster::filled(2, 2, px),
        }
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        assert_eq!(over([0, 0, 0, 255], [255, 0, 0, 255], 1.0), [255, 0, 0, 255]);
        assert_eq!(over([1, 2, 3, 4], [200, 200, 200, 200], 0.0), [1, 2, 3, 4]);
    }

    #[test]
    fn add_saturates() {
        assert_eq!(add([200, 10, 0, 255], [100, 10, 0, 128], 1.0), [255, 20, 0, 255]);
    }

    #[test]
    fn scale_by_zero_clears() {
        assert_eq!(scale([10, 20, 30, 40], 0.0), [0, 0, 0, 0]);
        assert_eq!(scale([10, 20, 30, 40], 1.0), [10, 20, 30, 40]);
    }

    #[test]
    fn storage_order_does_not_change_the_frame() {
        let background = layer(ModuleKind::HexGrid, [0, 0, 120, 255]);
        let texture = layer(ModuleKind::CrossHatch, [40, 0, 0, 128]);
        let hero = layer(ModuleKind::Supershape, [0, 90, 0, 160]);
        assert_eq!(hero.slot, Slot::Hero);

        let compositor = Compositor::new(2, 2);
        let a = compositor
            .composite(&[background.clone(), texture.clone(), hero.clone()])
            .unwrap();
        let b = compositor.composite(&[hero, background, texture]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hero_lands_on_top() {
        let background = layer(ModuleKind::Terrain, [0, 0, 255, 255]);
        let hero = layer(ModuleKind::CirclePulse, [255, 0, 0, 255]);
        let frame = Compositor::new(2, 2).composite(&[hero, background]).unwrap();
        assert_eq!(frame.pixel(0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn rejects_layer_of_wrong_size() {
        let mut bad = layer(ModuleKind::Terrain, [0, 0, 0, 255]);
        bad.raster = Raster::new(3, 3);
        assert!(Compositor::new(2, 2).composite(&[bad]).is_err());
    }
}
