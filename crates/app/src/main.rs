mod decode;
mod encode;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use beatscape_core::{
    audio::synth, AudioAnalyzer, AudioBuffer, FrameSink, Palette, RenderConfig, RenderLoop,
    RenderThreading,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::encode::{AudioTrack, FfmpegSink, PngSequenceSink};

const DEMO_SECONDS: f32 = 16.0;
const DEMO_SAMPLE_RATE: u32 = 44_100;
const DEMO_BPM: f32 = 120.0;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => run_render(args),
        Commands::Analyze(args) => run_analyze(args),
    }
}

fn run_render(args: RenderArgs) -> Result<()> {
    let config = args.overrides.resolve()?;
    let audio = load_audio(&args.input)?;

    let threading = RenderThreading {
        parallel: args.parallel || args.threads.is_some(),
        chunk_size: args.chunk_size,
        threads: args.threads,
    };
    let render = RenderLoop::new(config.clone())?.with_threading(threading);

    let mut sink: Box<dyn FrameSink> = match (&args.frames_dir, &args.output) {
        (Some(dir), _) => Box::new(PngSequenceSink::new(dir)),
        (None, Some(out)) => {
            let track = args.input.audio.as_ref().map(|path| AudioTrack {
                path: path.clone(),
                start: config.start,
                end: config.end,
            });
            if track.is_none() {
                tracing::info!("demo render, the video will have no audio track");
            }
            Box::new(FfmpegSink::new(out, true, track))
        }
        (None, None) => bail!("either --output or --frames-dir is required"),
    };

    let report = render
        .run(&audio, sink.as_mut())
        .context("render failed")?;

    for (i, scene) in report.compositions.iter().enumerate() {
        tracing::info!(
            scene = i,
            modules = %scene.modules,
            palette = scene.palette.name(),
            kaleidoscope = scene.kaleidoscope,
            start = scene.start,
            end = scene.end,
            "composition"
        );
    }

    if let Some(path) = &args.report {
        write_json(path, &report)?;
    }
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = args.overrides.resolve()?;
    let audio = load_audio(&args.input)?;
    tracing::info!(output = %args.output.display(), "running offline analysis");

    let analysis = AudioAnalyzer::new(&config)?.analyze(&audio)?;
    write_json(&args.output, &analysis.report())
}

fn load_audio(input: &InputArgs) -> Result<AudioBuffer> {
    match (&input.audio, input.demo) {
        (Some(path), _) => decode::read_wav(path),
        (None, true) => {
            tracing::info!(seconds = DEMO_SECONDS, bpm = DEMO_BPM, "using the synthetic demo track");
            Ok(synth::test_track(DEMO_SECONDS, DEMO_SAMPLE_RATE, DEMO_BPM)?)
        }
        (None, false) => bail!("no audio file given, pass a WAV path or --demo"),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write '{}'", path.display()))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

fn parse_palette(raw: &str) -> Result<Palette, String> {
    Palette::ALL
        .into_iter()
        .find(|p| p.name().eq_ignore_ascii_case(raw))
        .ok_or_else(|| format!("unknown palette '{raw}' (cyberpunk, acid, ice, fire)"))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Music-driven generative video renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a video (or PNG sequence) driven by an audio track.
    Render(RenderArgs),
    /// Analyse an audio file ahead of time and export the feature frames as JSON.
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// WAV file to analyse.
    audio: Option<PathBuf>,
    /// Use the built-in synthetic track instead of an audio file.
    #[arg(long, conflicts_with = "audio")]
    demo: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output video path (requires ffmpeg on PATH).
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write PNG frames into this directory instead of encoding a video.
    #[arg(long)]
    frames_dir: Option<PathBuf>,
    /// Write the render report (compositions, glitch count) as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Render frames on a rayon thread pool.
    #[arg(long)]
    parallel: bool,
    /// Worker threads, implies --parallel.
    #[arg(long)]
    threads: Option<usize>,
    /// Frames per parallel batch.
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,
    #[command(flatten)]
    overrides: ConfigArgs,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output path for the analysis JSON.
    #[arg(short, long)]
    output: PathBuf,
    #[command(flatten)]
    overrides: ConfigArgs,
}

/// Render settings. Flags override values loaded from `--config`.
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    kick_threshold: Option<f32>,
    #[arg(long)]
    speed: Option<f32>,
    #[arg(long)]
    complexity: Option<f32>,
    /// Bars between scene swaps.
    #[arg(long)]
    bars: Option<i64>,
    /// Start of the rendered window in seconds.
    #[arg(long)]
    start: Option<f32>,
    /// End of the rendered window in seconds.
    #[arg(long)]
    end: Option<f32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    fps: Option<u32>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Contour style handed to the modules, e.g. "shatter".
    #[arg(long)]
    contour: Option<String>,
    #[arg(long, value_parser = parse_palette)]
    palette: Option<Palette>,
    #[arg(long)]
    no_glitch: bool,
    #[arg(long)]
    no_feedback: bool,
    /// Disable the screen shake on strong accents.
    #[arg(long)]
    no_shake: bool,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config '{}'", path.display()))?;
                RenderConfig::from_json(&text)
                    .with_context(|| format!("invalid config '{}'", path.display()))?
            }
            None => RenderConfig::default(),
        };

        if let Some(v) = self.kick_threshold {
            config.kick_threshold = v;
        }
        if let Some(v) = self.speed {
            config.speed = v;
        }
        if let Some(v) = self.complexity {
            config.complexity = v;
        }
        if let Some(v) = self.bars {
            config.bars = v;
        }
        if let Some(v) = self.start {
            config.start = v;
        }
        if self.end.is_some() {
            config.end = self.end;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(v) = self.fps {
            config.fps = v;
        }
        if let Some(v) = self.width {
            config.width = v;
        }
        if let Some(v) = self.height {
            config.height = v;
        }
        if self.contour.is_some() {
            config.contour_mode = self.contour.clone();
        }
        if self.palette.is_some() {
            config.palette = self.palette;
        }
        if self.no_glitch {
            config.effects.glitch = false;
        }
        if self.no_feedback {
            config.effects.feedback = false;
        }
        if self.no_shake {
            config.effects.shake = false;
        }

        config.validate()?;
        Ok(config)
    }
}
