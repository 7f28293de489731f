use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    analysis::{Analysis, AudioAnalyzer, FeatureFrame},
    audio::AudioBuffer,
    config::RenderConfig,
    postfx::{PostProcessor, PreTrail},
    record::{FrameSink, SinkConfig},
    render::Compositor,
    scene::{CompositionSummary, SceneComposition, SceneController, SceneSettings},
    timeline::{BeatGrid, Timeline},
    BeatscapeError, Result,
};

/// Frame-parallel rendering knobs.
#[derive(Clone, Debug)]
pub struct RenderThreading {
    pub parallel: bool,
    /// Frames scheduled and rendered per batch.
    pub chunk_size: usize,
    /// Worker count, `None` lets rayon decide.
    pub threads: Option<usize>,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

/// What a finished render produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderReport {
    pub frames: u64,
    pub seed: u64,
    pub tempo_bpm: Option<f32>,
    pub compositions: Vec<CompositionSummary>,
    /// Frames the glitch stage fired on.
    pub glitches: u64,
    /// Frames the accent shake fired on.
    pub shakes: u64,
}

/// Drives analysis, scheduling, rendering and post-processing over the whole
/// window and hands finished frames to a [`FrameSink`] in timestamp order.
#[derive(Debug, Clone)]
pub struct RenderLoop {
    config: RenderConfig,
    threading: RenderThreading,
}

impl RenderLoop {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            threading: RenderThreading::default(),
        })
    }

    pub fn with_threading(mut self, threading: RenderThreading) -> Self {
        self.threading = threading;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn threading(&self) -> &RenderThreading {
        &self.threading
    }

    /// Seed used for a track: the configured one or a hash of the samples.
    pub fn track_seed(&self, audio: &AudioBuffer) -> u64 {
        self.config.seed.unwrap_or_else(|| audio.fingerprint())
    }

    /// Analyses `audio` and renders every frame of the configured window.
    pub fn run(&self, audio: &AudioBuffer, sink: &mut dyn FrameSink) -> Result<RenderReport> {
        let analysis = AudioAnalyzer::new(&self.config)?.analyze(audio)?;
        self.render(&analysis, self.track_seed(audio), sink)
    }

    /// Renders an existing analysis.
    pub fn render(
        &self,
        analysis: &Analysis,
        seed: u64,
        sink: &mut dyn FrameSink,
    ) -> Result<RenderReport> {
        self.render_frames(analysis.timeline(), analysis.grid(), analysis.frames(), seed, sink)
    }

    /// Renders a feature stream laid out on `timeline`.
    ///
    /// The sink is always closed, also when a frame fails; frames after the
    /// failing one never reach it.
    pub fn render_frames<I>(
        &self,
        timeline: &Timeline,
        grid: Option<BeatGrid>,
        frames: I,
        seed: u64,
        sink: &mut dyn FrameSink,
    ) -> Result<RenderReport>
    where
        I: ExactSizeIterator<Item = FeatureFrame>,
    {
        let expected = frames.len();
        let mut scenes = SceneController::new(&self.config, seed, timeline, grid)?;
        let mut post = PostProcessor::new(&self.config, seed);
        let pool = if self.threading.parallel {
            Some(build_thread_pool(self.threading.threads)?)
        } else {
            None
        };

        info!(
            frames = expected,
            seed,
            width = self.config.width,
            height = self.config.height,
            fps = timeline.fps,
            parallel = self.threading.parallel,
            "render started"
        );

        sink.begin(SinkConfig {
            width: self.config.width,
            height: self.config.height,
            fps: timeline.fps,
        })?;

        let tally = match self.emit(frames, &mut scenes, &mut post, pool.as_ref(), sink) {
            Ok(tally) => tally,
            Err(err) => {
                if let Err(close) = sink.end() {
                    warn!(error = %close, "frame sink failed to close after a render error");
                }
                return Err(err);
            }
        };
        sink.end()?;
        if tally.frames as usize != expected {
            return Err(BeatscapeError::msg(format!(
                "emitted {} frames for an analysis of {expected}",
                tally.frames
            )));
        }

        let compositions = scenes.finish(timeline.end);
        info!(
            frames = tally.frames,
            compositions = compositions.len(),
            glitches = tally.glitches,
            shakes = tally.shakes,
            "render finished"
        );

        Ok(RenderReport {
            frames: tally.frames,
            seed,
            tempo_bpm: grid.map(|g| g.bpm()),
            compositions,
            glitches: tally.glitches,
            shakes: tally.shakes,
        })
    }

    fn emit<I>(
        &self,
        mut features: I,
        scenes: &mut SceneController,
        post: &mut PostProcessor,
        pool: Option<&rayon::ThreadPool>,
        sink: &mut dyn FrameSink,
    ) -> Result<Tally>
    where
        I: Iterator<Item = FeatureFrame>,
    {
        let compositor = Compositor::new(self.config.width, self.config.height);
        let chunk_size = normalized_chunk_size(self.threading.chunk_size);
        let mut tally = Tally::default();
        loop {
            let batch: Vec<(FeatureFrame, Arc<SceneComposition>)> = features
                .by_ref()
                .take(chunk_size)
                .map(|frame| scenes.schedule(&frame).map(|scene| (frame, scene)))
                .collect::<Result<_>>()?;
            if batch.is_empty() {
                return Ok(tally);
            }

            let settings = scenes.settings();
            let post_ref: &PostProcessor = post;
            let rendered: Vec<Result<PreTrail>> = match pool {
                Some(pool) => pool.install(|| {
                    batch
                        .par_iter()
                        .map_init(
                            || Compositor::new(self.config.width, self.config.height),
                            |compositor, (frame, scene)| {
                                render_pre_trail(compositor, post_ref, settings, frame, scene)
                            },
                        )
                        .collect::<Vec<_>>()
                }),
                None => batch
                    .iter()
                    .map(|(frame, scene)| render_pre_trail(&compositor, post_ref, settings, frame, scene))
                    .collect(),
            };

            for item in rendered {
                let pre = item?;
                tally.glitches += u64::from(pre.glitched);
                tally.shakes += u64::from(pre.shaken);
                let frame = post.apply_trail(pre.raster)?;
                sink.push_frame(tally.frames, &frame)?;
                tally.frames += 1;
            }
            debug!(emitted = tally.frames, "chunk emitted");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    frames: u64,
    glitches: u64,
    shakes: u64,
}

fn render_pre_trail(
    compositor: &Compositor,
    post: &PostProcessor,
    settings: &SceneSettings,
    frame: &FeatureFrame,
    scene: &SceneComposition,
) -> Result<PreTrail> {
    let layers = scene.layers(frame, settings)?;
    let raster = compositor.composite(&layers)?;
    post.pre_trail(raster, frame, scene.effects())
}

fn build_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(BeatscapeError::config(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| BeatscapeError::msg(format!("failed to build rayon thread pool: {e}")))
}

fn normalized_chunk_size(chunk_size: usize) -> usize {
    chunk_size.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::synth, record::InMemorySink};

    fn small_config() -> RenderConfig {
        RenderConfig {
            width: 48,
            height: 64,
            fps: 12,
            bars: 2,
            seed: Some(7),
            ..RenderConfig::default()
        }
    }

    #[test]
    fn emits_every_frame_in_order() {
        let audio = synth::kick_track(3.0, 22_050, 120.0, 0.8).unwrap();
        let mut sink = InMemorySink::new();
        let report = RenderLoop::new(small_config())
            .unwrap()
            .run(&audio, &mut sink)
            .unwrap();

        assert_eq!(report.frames, 36);
        assert_eq!(sink.frames().len(), 36);
        assert!(sink.is_finished());
        assert_eq!(sink.config().unwrap().fps, 12);
        assert_eq!(report.seed, 7);
        assert!(!report.compositions.is_empty());
        assert_eq!(report.compositions.last().unwrap().end, Some(3.0));
    }

    #[test]
    fn seed_falls_back_to_audio_fingerprint() {
        let audio = synth::kick_track(1.0, 22_050, 120.0, 0.8).unwrap();
        let config = RenderConfig {
            seed: None,
            ..small_config()
        };
        let render = RenderLoop::new(config).unwrap();
        assert_eq!(render.track_seed(&audio), audio.fingerprint());
    }

    #[test]
    fn zero_threads_is_rejected() {
        let audio = synth::kick_track(1.0, 22_050, 120.0, 0.8).unwrap();
        let mut sink = InMemorySink::new();
        let err = RenderLoop::new(small_config())
            .unwrap()
            .with_threading(RenderThreading {
                parallel: true,
                chunk_size: 8,
                threads: Some(0),
            })
            .run(&audio, &mut sink)
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn invalid_config_fails_before_rendering() {
        let config = RenderConfig {
            bars: 0,
            ..small_config()
        };
        assert!(RenderLoop::new(config).is_err());
    }

    #[test]
    fn zero_chunk_size_is_normalized() {
        assert_eq!(normalized_chunk_size(0), 1);
        assert_eq!(normalized_chunk_size(64), 64);
    }
}
