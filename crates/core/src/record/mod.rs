use serde::{Deserialize, Serialize};

use crate::{render::Raster, BeatscapeError, Result};

/// Stream parameters handed to a sink before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Receiver of finished frames, typically a video encoder.
///
/// Frames arrive with strictly increasing indices, starting at zero.
pub trait FrameSink {
    fn begin(&mut self, config: SinkConfig) -> Result<()>;

    fn push_frame(&mut self, index: u64, frame: &Raster) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}

/// Collects frames in memory. Mostly useful for tests and previews.
#[derive(Debug, Default)]
pub struct InMemorySink {
    config: Option<SinkConfig>,
    frames: Vec<Raster>,
    finished: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.config
    }

    pub fn frames(&self) -> &[Raster] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Raster> {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, config: SinkConfig) -> Result<()> {
        self.config = Some(config);
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn push_frame(&mut self, index: u64, frame: &Raster) -> Result<()> {
        let Some(config) = self.config else {
            return Err(BeatscapeError::render("frame pushed before begin"));
        };
        check_frame(&config, self.frames.len() as u64, index, frame)?;
        self.frames.push(frame.clone());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Shared ordering and size checks for sink implementations.
pub fn check_frame(config: &SinkConfig, expected: u64, index: u64, frame: &Raster) -> Result<()> {
    if index != expected {
        return Err(BeatscapeError::render(format!(
            "frame {index} emitted out of order, expected {expected}"
        )));
    }
    if frame.width() != config.width || frame.height() != config.height {
        return Err(BeatscapeError::render(format!(
            "frame is {}x{}, sink expects {}x{}",
            frame.width(),
            frame.height(),
            config.width,
            config.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SinkConfig {
        SinkConfig {
            width: 2,
            height: 2,
            fps: 24,
        }
    }

    #[test]
    fn collects_frames_in_order() {
        let mut sink = InMemorySink::new();
        sink.begin(config()).unwrap();
        sink.push_frame(0, &Raster::new(2, 2)).unwrap();
        sink.push_frame(1, &Raster::new(2, 2)).unwrap();
        sink.end().unwrap();
        assert_eq!(sink.frames().len(), 2);
        assert!(sink.is_finished());
    }

    #[test]
    fn rejects_out_of_order_and_missized_frames() {
        let mut sink = InMemorySink::new();
        assert!(sink.push_frame(0, &Raster::new(2, 2)).is_err());
        sink.begin(config()).unwrap();
        assert!(sink.push_frame(1, &Raster::new(2, 2)).is_err());
        assert!(sink.push_frame(0, &Raster::new(4, 2)).is_err());
    }
}
