//! Bar-clocked scene scheduling.
//!
//! The [`SceneController`] installs a new [`SceneComposition`] every `bars`
//! bars. Compositions are drawn from the module catalog with a generator
//! seeded from `(track seed, bar index)`, so a given track, seed and bar
//! count always produce the same sequence of scenes.

use std::{fmt, sync::Arc};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    analysis::{Band, FeatureFrame},
    config::{ContourMode, KaleidoscopeMode, RenderConfig},
    mapping::Drive,
    module::{util, FrameContext, Module, ModuleKind, ModuleParams, Palette, Placement},
    render::{Canvas, Layer},
    timeline::{BeatGrid, Timeline},
    BeatscapeError, Result,
};

/// Below this complexity a composition holds a single background module and
/// no hero.
pub const MIN_HERO_COMPLEXITY: f32 = 0.25;

const KALEIDOSCOPE_START_CHANCE: f64 = 0.3;
const KALEIDOSCOPE_FLIP_CHANCE: f64 = 0.15;

/// Compositing role of a module. Declaration order is bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Background,
    Texture,
    Hero,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Background, Slot::Texture, Slot::Hero];

    pub fn z_order(&self) -> u8 {
        match self {
            Slot::Background => 0,
            Slot::Texture => 1,
            Slot::Hero => 2,
        }
    }
}

/// Canonical (slot-ordered) set of module kinds in a composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleSet(Vec<ModuleKind>);

impl ModuleSet {
    pub fn new(mut kinds: Vec<ModuleKind>) -> Self {
        kinds.sort_by_key(|kind| (kind.slot().z_order(), kind.ordinal()));
        kinds.dedup();
        Self(kinds)
    }

    pub fn kinds(&self) -> &[ModuleKind] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count_slot(&self, slot: Slot) -> usize {
        self.0.iter().filter(|kind| kind.slot() == slot).count()
    }
}

impl fmt::Display for ModuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|kind| kind.name()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Scene-level switches consumed by the post-processing chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneEffects {
    pub kaleidoscope: bool,
}

/// Scheduling and rendering parameters lifted out of [`RenderConfig`].
#[derive(Debug, Clone)]
pub struct SceneSettings {
    pub bars: u64,
    pub complexity: f32,
    pub speed: f32,
    pub kick_threshold: f32,
    pub fade_in: f32,
    pub width: u32,
    pub height: u32,
    pub palette: Option<Palette>,
    pub contour: ContourMode,
    pub kaleidoscope: KaleidoscopeMode,
}

impl SceneSettings {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            bars: config.bars_per_scene(),
            complexity: config.complexity,
            speed: config.speed,
            kick_threshold: config.kick_threshold,
            fade_in: config.fade_in,
            width: config.width,
            height: config.height,
            palette: config.palette,
            contour: config.contour(),
            kaleidoscope: config.effects.kaleidoscope,
        }
    }
}

/// A module bound to a slot inside one composition.
pub struct ModuleInstance {
    kind: ModuleKind,
    seed: u64,
    band: Band,
    /// Time the instance appeared.
    spawn: f32,
    /// Seconds to full opacity; zero disables the fade.
    fade_in: f32,
    module: Box<dyn Module>,
}

impl ModuleInstance {
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn slot(&self) -> Slot {
        self.kind.slot()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn spawn(&self) -> f32 {
        self.spawn
    }

    pub fn opacity(&self, time: f32) -> f32 {
        if self.fade_in <= 0.0 {
            return 1.0;
        }
        ((time - self.spawn) / self.fade_in).clamp(0.0, 1.0)
    }

    /// Renders the instance for `frame` into a fresh layer.
    pub fn render(&self, frame: &FeatureFrame, settings: &SceneSettings) -> Result<Layer> {
        let drive = Drive::new(frame, self.band, settings.kick_threshold);
        if !drive.is_finite() {
            return Err(BeatscapeError::render(format!(
                "{} module at {:.3}s: non-finite audio features",
                self.kind, frame.time
            )));
        }
        let ctx = FrameContext {
            time: (frame.time - self.spawn).max(0.0),
            frame,
            drive,
            complexity: settings.complexity,
            speed: settings.speed,
        };
        let mut canvas = Canvas::new(settings.width, settings.height)?;
        self.module.render(&ctx, &mut canvas).map_err(|err| {
            BeatscapeError::render(format!("{} module at {:.3}s: {err}", self.kind, frame.time))
        })?;
        Ok(Layer {
            module: self.kind,
            slot: self.kind.slot(),
            blend: self.kind.blend(),
            opacity: self.opacity(frame.time),
            raster: canvas.finish()?,
        })
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("kind", &self.kind)
            .field("seed", &self.seed)
            .field("band", &self.band)
            .field("spawn", &self.spawn)
            .finish()
    }
}

/// Active set of module instances, valid from a bar boundary until the next
/// swap.
#[derive(Debug)]
pub struct SceneComposition {
    ordinal: usize,
    start_bar: u64,
    start: f32,
    seed: u64,
    palette: Palette,
    effects: SceneEffects,
    modules: ModuleSet,
    instances: Vec<ModuleInstance>,
}

impl SceneComposition {
    /// Position in the render's composition history.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn start_bar(&self) -> u64 {
        self.start_bar
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn effects(&self) -> SceneEffects {
        self.effects
    }

    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    pub fn instances(&self) -> &[ModuleInstance] {
        &self.instances
    }

    /// One layer per instance, bottom slot first.
    pub fn layers(&self, frame: &FeatureFrame, settings: &SceneSettings) -> Result<Vec<Layer>> {
        self.instances
            .iter()
            .map(|instance| instance.render(frame, settings))
            .collect()
    }
}

/// Record of one composition over its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionSummary {
    pub modules: ModuleSet,
    pub seed: u64,
    pub palette: Palette,
    pub kaleidoscope: bool,
    pub start_bar: u64,
    /// Bar the next composition took over at, `None` for the last one.
    pub end_bar: Option<u64>,
    pub start: f32,
    /// Filled in when the composition is replaced or the render finishes.
    pub end: Option<f32>,
}

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Idle,
    Active,
    Swapping,
}

/// Module catalog split by slot.
#[derive(Debug, Clone)]
struct Pools {
    background: Vec<ModuleKind>,
    texture: Vec<ModuleKind>,
    hero: Vec<ModuleKind>,
}

impl Pools {
    fn new(catalog: &[ModuleKind]) -> Self {
        let pick = |slot: Slot| -> Vec<ModuleKind> {
            let mut kinds: Vec<ModuleKind> =
                catalog.iter().copied().filter(|k| k.slot() == slot).collect();
            kinds.sort();
            kinds.dedup();
            kinds
        };
        Self {
            background: pick(Slot::Background),
            texture: pick(Slot::Texture),
            hero: pick(Slot::Hero),
        }
    }

    /// Every module set the selection rules allow.
    fn eligible(&self, hero_mode: bool) -> Vec<ModuleSet> {
        if !hero_mode {
            return self
                .background
                .iter()
                .map(|kind| ModuleSet::new(vec![*kind]))
                .collect();
        }
        let optional = |pool: &[ModuleKind]| -> Vec<Option<ModuleKind>> {
            std::iter::once(None).chain(pool.iter().copied().map(Some)).collect()
        };
        let mut sets = Vec::new();
        for hero in &self.hero {
            for background in optional(&self.background) {
                for texture in optional(&self.texture) {
                    let kinds = [Some(*hero), background, texture].into_iter().flatten().collect();
                    sets.push(ModuleSet::new(kinds));
                }
            }
        }
        sets
    }
}

/// Schedules compositions on bar boundaries and renders their layers.
#[derive(Debug)]
pub struct SceneController {
    settings: SceneSettings,
    track_seed: u64,
    pools: Pools,
    hero_mode: bool,
    single: bool,
    grid: Option<BeatGrid>,
    timeline_start: f32,
    state: SceneState,
    current: Option<Arc<SceneComposition>>,
    next_swap_bar: u64,
    history: Vec<CompositionSummary>,
}

impl SceneController {
    pub fn new(
        config: &RenderConfig,
        track_seed: u64,
        timeline: &Timeline,
        grid: Option<BeatGrid>,
    ) -> Result<Self> {
        Self::with_catalog(config, track_seed, timeline, grid, ModuleKind::ALL)
    }

    /// Like [`SceneController::new`] but drawing from a restricted catalog.
    pub fn with_catalog(
        config: &RenderConfig,
        track_seed: u64,
        timeline: &Timeline,
        grid: Option<BeatGrid>,
        catalog: &[ModuleKind],
    ) -> Result<Self> {
        config.validate()?;
        let settings = SceneSettings::from_config(config);
        let pools = Pools::new(catalog);

        let mut hero_mode = settings.complexity >= MIN_HERO_COMPLEXITY;
        if hero_mode && pools.hero.is_empty() {
            warn!("module catalog has no hero module, falling back to background-only scenes");
            hero_mode = false;
        }
        if !hero_mode && pools.background.is_empty() {
            return Err(BeatscapeError::config(
                "module catalog cannot fill a composition at this complexity",
            ));
        }
        if !settings.contour.is_known() {
            warn!(
                contour_mode = settings.contour.as_str().unwrap_or_default(),
                "unknown contour mode, modules will draw their default outlines"
            );
        }

        let single = match grid {
            None => true,
            Some(grid) => timeline.duration() < grid.bar_seconds(),
        };
        if single {
            debug!(
                duration = timeline.duration(),
                "running a single composition over the whole window"
            );
        }

        Ok(Self {
            settings,
            track_seed,
            pools,
            hero_mode,
            single,
            grid,
            timeline_start: timeline.start,
            state: SceneState::Idle,
            current: None,
            next_swap_bar: 0,
            history: Vec::new(),
        })
    }

    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn current(&self) -> Option<&Arc<SceneComposition>> {
        self.current.as_ref()
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    pub fn history(&self) -> &[CompositionSummary] {
        &self.history
    }

    /// Returns the composition active for `frame`, swapping first when the
    /// frame reached the next scheduled bar.
    pub fn schedule(&mut self, frame: &FeatureFrame) -> Result<Arc<SceneComposition>> {
        let due = match self.state {
            SceneState::Idle => true,
            _ => !self.single && frame.bar_index >= self.next_swap_bar,
        };
        if due {
            self.advance(frame.bar_index, frame.time);
        }
        self.current
            .clone()
            .ok_or_else(|| BeatscapeError::msg("scene controller has no active composition"))
    }

    /// Renders the layers of the active composition for `frame`.
    pub fn query(&mut self, frame: &FeatureFrame) -> Result<Vec<Layer>> {
        let composition = self.schedule(frame)?;
        composition.layers(frame, &self.settings)
    }

    /// Closes the last composition interval and returns the full history.
    pub fn finish(&mut self, end: f32) -> Vec<CompositionSummary> {
        if let Some(last) = self.history.last_mut() {
            if last.end.is_none() {
                last.end = Some(end);
            }
        }
        self.history.clone()
    }

    fn advance(&mut self, bar: u64, time: f32) {
        let first = self.current.is_none();
        if !first {
            self.state = SceneState::Swapping;
        }

        let start = match (first, self.grid) {
            (false, Some(grid)) => grid.bar_start(bar).max(self.timeline_start),
            _ => self.timeline_start.min(time),
        };
        let composition = self.compose(bar, start, first);

        if let Some(previous) = self.history.last_mut() {
            previous.end = Some(start);
            previous.end_bar = Some(bar);
        }
        debug!(
            bar,
            seed = composition.seed,
            modules = %composition.modules,
            palette = composition.palette.name(),
            kaleidoscope = composition.effects.kaleidoscope,
            "scene swap"
        );
        self.history.push(CompositionSummary {
            modules: composition.modules.clone(),
            seed: composition.seed,
            palette: composition.palette,
            kaleidoscope: composition.effects.kaleidoscope,
            start_bar: bar,
            end_bar: None,
            start,
            end: None,
        });

        let bars = self.settings.bars;
        self.next_swap_bar = if first {
            bar + bars
        } else {
            let mut next = self.next_swap_bar + bars;
            while next <= bar {
                next += bars;
            }
            next
        };
        self.current = Some(Arc::new(composition));
        self.state = SceneState::Active;
    }

    fn compose(&self, bar: u64, start: f32, first: bool) -> SceneComposition {
        let seed = util::mix64(self.track_seed, bar);
        let mut rng = util::rng(seed);
        let previous = self.current.as_ref().map(|c| &c.modules);
        let modules = self.select(&mut rng, previous);

        let palette = self.settings.palette.unwrap_or_else(|| Palette::pick(&mut rng));
        let kaleidoscope = match self.settings.kaleidoscope {
            KaleidoscopeMode::Off => false,
            KaleidoscopeMode::On => true,
            KaleidoscopeMode::Evolve => {
                let before = self.current.as_ref().map(|c| c.effects.kaleidoscope);
                match before {
                    None => rng.gen_bool(KALEIDOSCOPE_START_CHANCE),
                    Some(on) => on ^ rng.gen_bool(KALEIDOSCOPE_FLIP_CHANCE),
                }
            }
        };

        let fade_in = if first { 0.0 } else { self.settings.fade_in };
        let instances = modules
            .kinds()
            .iter()
            .map(|kind| {
                let instance_seed = util::mix64(seed, kind.slot().z_order() as u64 + 1);
                let band = Band::ALL[rng.gen_range(0..Band::ALL.len())];
                let params = ModuleParams {
                    seed: instance_seed,
                    complexity: self.settings.complexity,
                    speed: self.settings.speed,
                    palette,
                    band,
                    contour: self.settings.contour.clone(),
                    placement: Placement::seeded(instance_seed),
                };
                ModuleInstance {
                    kind: *kind,
                    seed: instance_seed,
                    band,
                    spawn: start,
                    fade_in,
                    module: kind.initialize(&params),
                }
            })
            .collect();

        SceneComposition {
            ordinal: self.history.len(),
            start_bar: bar,
            start,
            seed,
            palette,
            effects: SceneEffects { kaleidoscope },
            modules,
            instances,
        }
    }

    fn select(&self, rng: &mut ChaCha8Rng, previous: Option<&ModuleSet>) -> ModuleSet {
        let drawn = self.draw(rng);
        let Some(previous) = previous.filter(|p| **p == drawn) else {
            return drawn;
        };
        let alternatives: Vec<ModuleSet> = self
            .pools
            .eligible(self.hero_mode)
            .into_iter()
            .filter(|set| set != previous)
            .collect();
        if alternatives.is_empty() {
            debug!(modules = %drawn, "module pool exhausted, repeating the previous composition");
            return drawn;
        }
        alternatives[rng.gen_range(0..alternatives.len())].clone()
    }

    fn draw(&self, rng: &mut ChaCha8Rng) -> ModuleSet {
        let pools = &self.pools;
        if !self.hero_mode {
            return ModuleSet::new(vec![pools.background[rng.gen_range(0..pools.background.len())]]);
        }
        let complexity = f64::from(self.settings.complexity);
        let mut kinds = vec![pools.hero[rng.gen_range(0..pools.hero.len())]];
        if !pools.background.is_empty() && rng.gen_bool((0.5 + 0.3 * complexity).clamp(0.0, 1.0)) {
            kinds.push(pools.background[rng.gen_range(0..pools.background.len())]);
        }
        if !pools.texture.is_empty() && rng.gen_bool((0.3 + 0.4 * complexity).clamp(0.0, 1.0)) {
            kinds.push(pools.texture[rng.gen_range(0..pools.texture.len())]);
        }
        ModuleSet::new(kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(duration: f32) -> Timeline {
        Timeline {
            start: 0.0,
            end: duration,
            fps: 24,
        }
    }

    fn frames(timeline: &Timeline, grid: Option<BeatGrid>) -> Vec<FeatureFrame> {
        (0..timeline.frame_count())
            .map(|index| {
                let time = timeline.frame_time(index);
                FeatureFrame {
                    index,
                    time,
                    beat_phase: grid.map(|g| g.beat_phase(time)).unwrap_or(0.0),
                    bar_index: grid.map(|g| g.bar_index(time)).unwrap_or(0),
                    ..Default::default()
                }
            })
            .collect()
    }

    fn config(bars: i64, complexity: f32) -> RenderConfig {
        RenderConfig {
            bars,
            complexity,
            width: 32,
            height: 32,
            ..Default::default()
        }
    }

    fn run(controller: &mut SceneController, tl: &Timeline, grid: Option<BeatGrid>) -> Vec<CompositionSummary> {
        for frame in &frames(tl, grid) {
            controller.schedule(frame).unwrap();
        }
        controller.finish(tl.end)
    }

    #[test]
    fn starts_idle_and_activates_on_first_frame() {
        let tl = timeline(4.0);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let mut controller = SceneController::new(&config(1, 1.0), 1, &tl, grid).unwrap();
        assert_eq!(controller.state(), SceneState::Idle);
        controller.schedule(&frames(&tl, grid)[0]).unwrap();
        assert_eq!(controller.state(), SceneState::Active);
        assert_eq!(controller.history().len(), 1);
    }

    #[test]
    fn swaps_every_bars_bars() {
        let tl = timeline(30.0);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let mut controller = SceneController::new(&config(4, 1.0), 99, &tl, grid).unwrap();
        let history = run(&mut controller, &tl, grid);

        let starts: Vec<u64> = history.iter().map(|c| c.start_bar).collect();
        assert_eq!(starts, vec![0, 4, 8, 12]);
        let times: Vec<f32> = history.iter().map(|c| c.start).collect();
        assert_eq!(times, vec![0.0, 8.0, 16.0, 24.0]);
    }

    #[test]
    fn intervals_are_contiguous() {
        let tl = timeline(20.0);
        let grid = BeatGrid::from_bpm(128.0, 0.3);
        let mut controller = SceneController::new(&config(2, 1.0), 5, &tl, grid).unwrap();
        let history = run(&mut controller, &tl, grid);
        assert!(history.len() > 2);
        for pair in history.windows(2) {
            assert_eq!(pair[0].end, Some(pair[1].start));
            assert_eq!(pair[0].end_bar, Some(pair[1].start_bar));
        }
        assert_eq!(history[0].start, 0.0);
        assert_eq!(history.last().unwrap().end, Some(20.0));
    }

    #[test]
    fn every_composition_has_one_hero() {
        let tl = timeline(120.0);
        let grid = BeatGrid::from_bpm(140.0, 0.1);
        let mut controller = SceneController::new(&config(1, 1.0), 17, &tl, grid).unwrap();
        let history = run(&mut controller, &tl, grid);
        assert!(history.len() > 60);
        for summary in &history {
            assert_eq!(summary.modules.count_slot(Slot::Hero), 1, "{}", summary.modules);
            assert!(summary.modules.count_slot(Slot::Background) <= 1);
            assert!(summary.modules.count_slot(Slot::Texture) <= 1);
        }
    }

    #[test]
    fn low_complexity_falls_back_to_background_only() {
        let tl = timeline(30.0);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let mut controller = SceneController::new(&config(1, 0.2), 3, &tl, grid).unwrap();
        for summary in run(&mut controller, &tl, grid) {
            assert_eq!(summary.modules.len(), 1);
            assert_eq!(summary.modules.count_slot(Slot::Background), 1);
            assert_eq!(summary.modules.count_slot(Slot::Hero), 0);
        }
    }

    #[test]
    fn consecutive_compositions_differ() {
        let tl = timeline(200.0);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let mut controller = SceneController::new(&config(1, 0.1), 8, &tl, grid).unwrap();
        let history = run(&mut controller, &tl, grid);
        assert_eq!(history.len(), 100);
        for pair in history.windows(2) {
            assert_ne!(pair[0].modules, pair[1].modules);
        }
    }

    #[test]
    fn exhausted_pool_repeats_instead_of_failing() {
        let tl = timeline(10.0);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let mut controller =
            SceneController::with_catalog(&config(1, 1.0), 4, &tl, grid, &[ModuleKind::Helix])
                .unwrap();
        let history = run(&mut controller, &tl, grid);
        assert_eq!(history.len(), 5);
        assert!(history
            .iter()
            .all(|c| c.modules == ModuleSet::new(vec![ModuleKind::Helix])));
    }

    #[test]
    fn catalog_without_hero_degrades_to_background() {
        let tl = timeline(4.0);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let mut controller = SceneController::with_catalog(
            &config(1, 1.0),
            4,
            &tl,
            grid,
            &[ModuleKind::Moire, ModuleKind::Dust],
        )
        .unwrap();
        let history = run(&mut controller, &tl, grid);
        assert!(history.iter().all(|c| c.modules.kinds() == [ModuleKind::Moire]));

        let empty = SceneController::with_catalog(&config(1, 1.0), 4, &tl, grid, &[ModuleKind::Dust]);
        assert!(empty.unwrap_err().is_config());
    }

    #[test]
    fn short_or_tempoless_audio_runs_one_composition() {
        let tl = timeline(1.5);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let mut short = SceneController::new(&config(1, 1.0), 2, &tl, grid).unwrap();
        assert!(short.is_single());
        assert_eq!(run(&mut short, &tl, grid).len(), 1);

        let long = timeline(30.0);
        let mut tempoless = SceneController::new(&config(1, 1.0), 2, &long, None).unwrap();
        let history = run(&mut tempoless, &long, None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].end, Some(30.0));
    }

    #[test]
    fn same_seed_same_scenes() {
        let tl = timeline(40.0);
        let grid = BeatGrid::from_bpm(110.0, 0.2);
        let mut a = SceneController::new(&config(2, 1.0), 1234, &tl, grid).unwrap();
        let mut b = SceneController::new(&config(2, 1.0), 1234, &tl, grid).unwrap();
        let mut c = SceneController::new(&config(2, 1.0), 4321, &tl, grid).unwrap();
        let ha = run(&mut a, &tl, grid);
        assert_eq!(ha, run(&mut b, &tl, grid));
        assert_ne!(ha, run(&mut c, &tl, grid));
    }

    #[test]
    fn new_modules_fade_in_after_the_first_scene() {
        let tl = timeline(6.0);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let fs = frames(&tl, grid);
        let mut controller = SceneController::new(&config(1, 1.0), 6, &tl, grid).unwrap();

        let first = controller.query(&fs[0]).unwrap();
        assert!(first.iter().all(|layer| layer.opacity == 1.0));

        let swap = fs.iter().find(|f| f.bar_index == 1).unwrap();
        let layers = controller.query(swap).unwrap();
        assert!(layers.iter().all(|layer| layer.opacity < 1.0));
        let later = fs.iter().find(|f| f.time >= 3.5).unwrap();
        assert!(controller.query(later).unwrap().iter().all(|layer| layer.opacity == 1.0));
    }

    #[test]
    fn forced_palette_and_kaleidoscope_modes() {
        let tl = timeline(20.0);
        let grid = BeatGrid::from_bpm(120.0, 0.0);
        let mut cfg = config(1, 1.0);
        cfg.palette = Some(Palette::Ice);
        cfg.effects.kaleidoscope = KaleidoscopeMode::On;
        let mut controller = SceneController::new(&cfg, 6, &tl, grid).unwrap();
        for summary in run(&mut controller, &tl, grid) {
            assert_eq!(summary.palette, Palette::Ice);
            assert!(summary.kaleidoscope);
        }
    }

    #[test]
    fn rejects_invalid_bars() {
        let tl = timeline(4.0);
        let err = SceneController::new(&config(0, 1.0), 1, &tl, None).unwrap_err();
        assert!(err.is_config());
    }
}
