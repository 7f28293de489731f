//! Raster frames, the vector canvas modules draw on, and the compositor that
//! stacks module layers by slot.

pub mod canvas;
pub mod composite;

use serde::{Deserialize, Serialize};

pub use canvas::Canvas;
pub use composite::Compositor;

use crate::{module::ModuleKind, scene::Slot, BeatscapeError, Result};

/// Straight (non-premultiplied) RGBA8 colour.
pub type Rgba = [u8; 4];

/// Premultiplied RGBA8 image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Fully transparent raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    /// Raster where every pixel holds the given premultiplied value.
    pub fn filled(width: u32, height: u32, premul: Rgba) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&premul);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_parts(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(BeatscapeError::render(format!(
                "raster data holds {} bytes, expected {}x{}x4",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    pub fn same_size(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// How a layer is merged onto what lies below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Porter-Duff source-over.
    Over,
    /// Saturating add, used by light-emitting modules.
    Add,
}

/// Output of one module for one frame.
#[derive(Debug, Clone)]
pub struct Layer {
    pub module: ModuleKind,
    pub slot: Slot,
    pub blend: BlendMode,
    pub opacity: f32,
    pub raster: Raster,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_rejects_mismatched_buffers() {
        assert!(Raster::from_parts(2, 2, vec![0; 15]).is_err());
        let raster = Raster::from_parts(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(raster.pixel(1, 0), [5, 6, 7, 8]);
    }

    #[test]
    fn filled_repeats_the_pixel() {
        let raster = Raster::filled(3, 2, [9, 8, 7, 255]);
        assert_eq!(raster.data().len(), 24);
        assert!(raster.data().chunks_exact(4).all(|px| px == [9, 8, 7, 255]));
    }
}
