//! Core library for the beatscape renderer.
//!
//! Audio flows strictly forward through the crate: [`AudioAnalyzer`] turns
//! decoded samples into feature frames, the [`SceneController`] picks the
//! active composition on a bar clock, modules draw their layers, the
//! [`Compositor`] flattens them and the [`PostProcessor`] applies the effect
//! chain. [`RenderLoop`] ties the stages together and hands finished frames
//! to a [`FrameSink`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod mapping;
pub mod module;
pub mod pipeline;
pub mod postfx;
pub mod record;
pub mod render;
pub mod scene;
pub mod timeline;

pub use analysis::{Analysis, AnalysisReport, AnalysisSummary, AudioAnalyzer, Band, FeatureFrame};
pub use audio::AudioBuffer;
pub use config::{EffectsConfig, KaleidoscopeMode, RenderConfig};
pub use error::{BeatscapeError, Result};
pub use module::{Module, ModuleKind, Palette, Placement};
pub use pipeline::{RenderLoop, RenderReport, RenderThreading};
pub use postfx::{FeedbackTrail, PostProcessor};
pub use record::{FrameSink, InMemorySink, SinkConfig};
pub use render::{Compositor, Layer, Raster};
pub use scene::{CompositionSummary, SceneComposition, SceneController, Slot};
pub use timeline::{BeatGrid, Timeline};
