use std::{collections::VecDeque, f32::consts::PI, fmt, ops::Range, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{
    audio::{AudioBuffer, AudioWindow},
    config::{BandRanges, RenderConfig},
    timeline::{BeatGrid, Timeline},
    Result,
};

/// Range below the running peak, in dB, that maps onto [0, 1].
const DYNAMIC_RANGE_DB: f32 = 30.0;
const RELEASE_DB_PER_SECOND: f32 = 4.0;
const ACCENT_HALF_LIFE_SECONDS: f32 = 2.0;
const SILENCE_RMS: f32 = 1e-4;
const ABSOLUTE_FLOOR_DB: f32 = -90.0;
const FLUX_GAIN: f32 = 10.0;

const ONSET_RISE: f32 = 0.25;
const ONSET_LEVEL: f32 = 0.3;
/// The bass rise over the kick window has to exceed this share of the
/// kick threshold.
const KICK_RISE_RATIO: f32 = 0.5;
const KICK_WINDOW_SECONDS: f32 = 0.125;
const MIN_KICK_INTERVAL: f32 = 0.1;

const TEMPO_MIN_BPM: f32 = 60.0;
const TEMPO_MAX_BPM: f32 = 180.0;
const TEMPO_PRIOR_BPM: f32 = 120.0;
const TEMPO_PRIOR_OCTAVES: f32 = 1.0;
const DETREND_SECONDS: f32 = 0.1;

/// The three analysed frequency bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Bass,
    Mid,
    High,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Bass, Band::Mid, Band::High];
}

/// Per-band onset flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandFlags {
    pub bass: bool,
    pub mid: bool,
    pub high: bool,
}

/// Feature set for one output frame. Energies are normalised to `[0, 1]`
/// against running statistics of the track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    pub index: u64,
    /// Absolute timestamp in seconds.
    pub time: f32,
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    /// Normalised full-spectrum onset strength.
    pub accent: f32,
    pub onsets: BandFlags,
    pub kick: bool,
    /// Phase within the current beat, `[0, 1)`.
    pub beat_phase: f32,
    pub bar_index: u64,
}

impl FeatureFrame {
    pub fn energy(&self, band: Band) -> f32 {
        match band {
            Band::Bass => self.bass,
            Band::Mid => self.mid,
            Band::High => self.high,
        }
    }

    pub fn onset(&self, band: Band) -> bool {
        match band {
            Band::Bass => self.onsets.bass,
            Band::Mid => self.onsets.mid,
            Band::High => self.onsets.high,
        }
    }
}

/// Summary of the analysis metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AnalysisSummary {
    pub sample_rate: u32,
    pub tempo_bpm: Option<f32>,
    pub beat_offset: Option<f32>,
    pub start_seconds: f32,
    pub duration_seconds: f32,
    pub frames: u64,
}

/// Serializable dump of a finished analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: AnalysisSummary,
    pub frames: Vec<FeatureFrame>,
}

/// Single-pass spectral and rhythmic analysis of a decoded track.
///
/// The pass measures band levels and spectral flux once per output frame and
/// estimates the beat grid from a finer onset envelope. Normalisation,
/// onset and kick flags are produced lazily by [`Analysis::frames`].
pub struct AudioAnalyzer {
    fps: u32,
    bands: BandRanges,
    kick_threshold: f32,
    start: f32,
    end: Option<f32>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl AudioAnalyzer {
    /// Creates an analyzer for an already validated configuration.
    pub fn new(config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fps: config.fps,
            bands: config.bands.clone(),
            kick_threshold: config.kick_threshold,
            start: config.start,
            end: config.end,
            fft_planner: RealFftPlanner::new(),
            fft: None,
        })
    }

    /// Analyses the configured `[start, end)` window of `audio`.
    pub fn analyze(&mut self, audio: &AudioBuffer) -> Result<Analysis> {
        let window = audio.window(self.start, self.end)?;
        let timeline = Timeline::new(&window, self.fps);
        let frame_size = frame_fft_size(audio.sample_rate());

        let grid = self.detect_grid(audio, &window, frame_size / 2)?;
        let raw = self.measure_frames(audio, &window, &timeline, frame_size)?;

        let summary = AnalysisSummary {
            sample_rate: audio.sample_rate(),
            tempo_bpm: grid.map(|g| g.bpm()),
            beat_offset: grid.map(|g| g.offset),
            start_seconds: window.start,
            duration_seconds: window.duration(),
            frames: raw.len() as u64,
        };

        match summary.tempo_bpm {
            Some(bpm) => tracing::info!(
                bpm,
                frames = summary.frames,
                duration = summary.duration_seconds,
                "audio analysis complete"
            ),
            None => tracing::warn!(
                frames = summary.frames,
                "no tempo detected, the whole window becomes a single scene"
            ),
        }

        Ok(Analysis {
            timeline,
            grid,
            summary,
            kick_threshold: self.kick_threshold,
            raw,
        })
    }

    fn detect_grid(
        &mut self,
        audio: &AudioBuffer,
        window: &AudioWindow,
        size: usize,
    ) -> Result<Option<BeatGrid>> {
        let hop = size / 2;
        let samples = &audio.samples()[window.first_sample..window.end_sample];
        if samples.len() < size * 2 {
            return Ok(None);
        }

        let mut fft = self.prepare_fft(size);
        let mut envelope = Vec::with_capacity(samples.len() / hop);
        let mut previous: Option<Vec<f32>> = None;
        let mut position = 0;
        while position + size <= samples.len() {
            let magnitudes = fft.magnitudes(&samples[position..position + size])?;
            let logs = log_spectrum(magnitudes);
            envelope.push(
                previous
                    .as_deref()
                    .map(|prev| spectral_flux(prev, &logs))
                    .unwrap_or(0.0),
            );
            previous = Some(logs);
            position += hop;
        }
        self.fft = Some(fft);

        let sample_rate = audio.sample_rate() as f32;
        let rate = sample_rate / hop as f32;
        let latency = size as f32 * 0.5 / sample_rate;
        Ok(estimate_grid(&envelope, rate, window.start, latency))
    }

    fn measure_frames(
        &mut self,
        audio: &AudioBuffer,
        window: &AudioWindow,
        timeline: &Timeline,
        size: usize,
    ) -> Result<Vec<RawFrame>> {
        let sample_rate = audio.sample_rate();
        let bins = band_bins(&self.bands, size, sample_rate);
        let samples = audio.samples();
        let mut fft = self.prepare_fft(size);
        let mut block = vec![0.0f32; size];
        let mut previous: Option<Vec<f32>> = None;
        let frames = timeline.frame_count();
        let mut out = Vec::with_capacity(frames as usize);

        for index in 0..frames {
            let center = (timeline.frame_time(index) as f64 * sample_rate as f64).round() as i64;
            let first = center - (size / 2) as i64;
            let mut energy = 0.0f32;
            for (offset, slot) in block.iter_mut().enumerate() {
                let n = first + offset as i64;
                *slot = if n >= window.first_sample as i64 && n < window.end_sample as i64 {
                    samples[n as usize]
                } else {
                    0.0
                };
                energy += *slot * *slot;
            }

            if (energy / size as f32).sqrt() < SILENCE_RMS {
                previous = None;
                out.push(RawFrame::default());
                continue;
            }

            let magnitudes = fft.magnitudes(&block)?;
            let levels = [
                band_level_db(&magnitudes[bins[0].clone()]),
                band_level_db(&magnitudes[bins[1].clone()]),
                band_level_db(&magnitudes[bins[2].clone()]),
            ];
            let logs = log_spectrum(magnitudes);
            let flux = previous
                .as_deref()
                .map(|prev| spectral_flux(prev, &logs))
                .unwrap_or(0.0);
            previous = Some(logs);
            out.push(RawFrame {
                levels_db: Some(levels),
                flux,
            });
        }

        self.fft = Some(fft);
        Ok(out)
    }

    fn prepare_fft(&mut self, size: usize) -> FftResources {
        match self.fft.take() {
            Some(fft) if fft.size == size => fft,
            _ => FftResources::new(&mut self.fft_planner, size),
        }
    }
}

impl fmt::Debug for AudioAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioAnalyzer")
            .field("fps", &self.fps)
            .field("bands", &self.bands)
            .field("kick_threshold", &self.kick_threshold)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("fft", &self.fft)
            .finish()
    }
}

/// Result of the analysis pass. Iterate it with [`Analysis::frames`]; each
/// call starts a fresh pass over the same measurements.
#[derive(Debug, Clone)]
pub struct Analysis {
    timeline: Timeline,
    grid: Option<BeatGrid>,
    summary: AnalysisSummary,
    kick_threshold: f32,
    raw: Vec<RawFrame>,
}

impl Analysis {
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn grid(&self) -> Option<BeatGrid> {
        self.grid
    }

    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Lazily produces the feature frames in timestamp order.
    pub fn frames(&self) -> FeatureFrames<'_> {
        let kick_window = ((KICK_WINDOW_SECONDS * self.timeline.fps as f32).round() as usize).max(1);
        let hop = self.timeline.hop();
        FeatureFrames {
            analysis: self,
            next: 0,
            levels: [AdaptiveLevel::new(hop); 3],
            accent_peak: 0.0,
            accent_release: 0.5f32.powf(hop / ACCENT_HALF_LIFE_SECONDS),
            previous: [0.0; 3],
            bass_history: VecDeque::with_capacity(kick_window),
            kick_window,
            last_kick: None,
        }
    }

    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            summary: self.summary.clone(),
            frames: self.frames().collect(),
        }
    }
}

/// Iterator over the [`FeatureFrame`]s of an [`Analysis`].
#[derive(Debug)]
pub struct FeatureFrames<'a> {
    analysis: &'a Analysis,
    next: usize,
    levels: [AdaptiveLevel; 3],
    accent_peak: f32,
    accent_release: f32,
    previous: [f32; 3],
    bass_history: VecDeque<f32>,
    kick_window: usize,
    last_kick: Option<f32>,
}

impl Iterator for FeatureFrames<'_> {
    type Item = FeatureFrame;

    fn next(&mut self) -> Option<FeatureFrame> {
        let analysis = self.analysis;
        let raw = analysis.raw.get(self.next)?;
        let index = self.next as u64;
        self.next += 1;

        let time = analysis.timeline.frame_time(index);
        let (beat_phase, bar_index) = analysis
            .grid
            .map(|grid| (grid.beat_phase(time), grid.bar_index(time)))
            .unwrap_or((0.0, 0));

        let mut frame = FeatureFrame {
            index,
            time,
            beat_phase,
            bar_index,
            ..Default::default()
        };

        if let Some(levels_db) = raw.levels_db {
            let energies = [
                self.levels[0].normalize(levels_db[0]),
                self.levels[1].normalize(levels_db[1]),
                self.levels[2].normalize(levels_db[2]),
            ];
            frame.bass = energies[0];
            frame.mid = energies[1];
            frame.high = energies[2];
            frame.onsets = BandFlags {
                bass: is_onset(energies[0], self.previous[0]),
                mid: is_onset(energies[1], self.previous[1]),
                high: is_onset(energies[2], self.previous[2]),
            };
            frame.accent = self.accent(raw.flux);
            frame.kick = self.detect_kick(time, energies[0]);
            self.previous = energies;
        } else {
            self.accent(0.0);
            self.detect_kick(time, 0.0);
            self.previous = [0.0; 3];
        }

        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.analysis.raw.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FeatureFrames<'_> {}

impl FeatureFrames<'_> {
    fn accent(&mut self, flux: f32) -> f32 {
        self.accent_peak = (self.accent_peak * self.accent_release).max(flux);
        if self.accent_peak <= 1e-6 {
            0.0
        } else {
            (flux / self.accent_peak).clamp(0.0, 1.0)
        }
    }

    /// A kick needs the bass level above the threshold and a rise over the
    /// recent minimum of at least `KICK_RISE_RATIO * threshold`.
    fn detect_kick(&mut self, time: f32, bass: f32) -> bool {
        let threshold = self.analysis.kick_threshold;
        let floor = self
            .bass_history
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min);
        let rise = if floor.is_finite() { bass - floor } else { bass };

        if self.bass_history.len() == self.kick_window {
            self.bass_history.pop_front();
        }
        self.bass_history.push_back(bass);

        let rested = self
            .last_kick
            .map(|last| time - last >= MIN_KICK_INTERVAL)
            .unwrap_or(true);
        let kick = bass > threshold && rise > threshold * KICK_RISE_RATIO && rested;
        if kick {
            self.last_kick = Some(time);
        }
        kick
    }
}

fn is_onset(current: f32, previous: f32) -> bool {
    current >= ONSET_LEVEL && current - previous >= ONSET_RISE
}

/// Running peak follower in the dB domain: instant attack, linear release.
#[derive(Debug, Clone, Copy)]
struct AdaptiveLevel {
    peak_db: Option<f32>,
    release_db: f32,
}

impl AdaptiveLevel {
    fn new(hop_seconds: f32) -> Self {
        Self {
            peak_db: None,
            release_db: RELEASE_DB_PER_SECOND * hop_seconds,
        }
    }

    fn normalize(&mut self, level_db: f32) -> f32 {
        if level_db <= ABSOLUTE_FLOOR_DB {
            return 0.0;
        }
        let peak = match self.peak_db {
            Some(peak) if peak - self.release_db > level_db => peak - self.release_db,
            _ => level_db,
        };
        self.peak_db = Some(peak);
        ((level_db - (peak - DYNAMIC_RANGE_DB)) / DYNAMIC_RANGE_DB).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
struct RawFrame {
    /// `None` for frames gated as silence.
    levels_db: Option<[f32; 3]>,
    flux: f32,
}

fn frame_fft_size(sample_rate: u32) -> usize {
    ((sample_rate as f32 * 0.046) as usize)
        .next_power_of_two()
        .clamp(256, 4096)
}

fn band_bins(bands: &BandRanges, size: usize, sample_rate: u32) -> [Range<usize>; 3] {
    let bin_hz = sample_rate as f32 / size as f32;
    let last = size / 2 + 1;
    let to_bins = |(lo, hi): (f32, f32)| {
        let start = ((lo / bin_hz).ceil() as usize).min(last);
        let end = ((hi / bin_hz).ceil() as usize).min(last);
        start..end.max(start)
    };
    [to_bins(bands.bass), to_bins(bands.mid), to_bins(bands.high)]
}

fn band_level_db(magnitudes: &[f32]) -> f32 {
    if magnitudes.is_empty() {
        return ABSOLUTE_FLOOR_DB - 1.0;
    }
    let power: f32 = magnitudes.iter().map(|a| a * a).sum();
    10.0 * (power + 1e-12).log10()
}

fn log_spectrum(magnitudes: &[f32]) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|a| (1.0 + FLUX_GAIN * a).ln())
        .collect()
}

fn spectral_flux(previous: &[f32], current: &[f32]) -> f32 {
    current
        .iter()
        .zip(previous)
        .map(|(now, before)| (now - before).max(0.0))
        .sum()
}

/// Autocorrelation tempo estimate with a log-normal prior around 120 BPM,
/// followed by a comb search for the beat phase.
fn estimate_grid(envelope: &[f32], rate: f32, window_start: f32, latency: f32) -> Option<BeatGrid> {
    let onsets = detrend(envelope, (rate * DETREND_SECONDS).round() as usize);
    let energy: f32 = onsets.iter().map(|v| v * v).sum();
    if energy <= 1e-9 {
        return None;
    }

    let min_lag = ((60.0 / TEMPO_MAX_BPM) * rate).floor().max(1.0) as usize;
    let max_lag = (((60.0 / TEMPO_MIN_BPM) * rate).ceil() as usize).min(onsets.len() / 2);
    if max_lag <= min_lag + 1 {
        return None;
    }

    let acf: Vec<f32> = (0..=max_lag + 1)
        .map(|lag| autocorrelation(&onsets, lag))
        .collect();

    let mut best: Option<(usize, f32)> = None;
    for lag in min_lag..=max_lag {
        let bpm = 60.0 * rate / lag as f32;
        let score = acf[lag] * tempo_prior(bpm);
        if best.map(|(_, top)| score > top).unwrap_or(true) {
            best = Some((lag, score));
        }
    }
    let (lag, score) = best?;
    if score <= 1e-9 {
        return None;
    }

    let period_frames = refine_peak(&acf, lag);
    let period = period_frames / rate;
    let phase = best_phase(&onsets, period_frames);
    let first = window_start + phase / rate + latency;
    let offset = first - ((first - window_start) / period).floor() * period;
    Some(BeatGrid { period, offset })
}

fn tempo_prior(bpm: f32) -> f32 {
    let octaves = (bpm / TEMPO_PRIOR_BPM).log2() / TEMPO_PRIOR_OCTAVES;
    (-0.5 * octaves * octaves).exp()
}

/// Subtracts a centred moving average and keeps the positive part.
fn detrend(values: &[f32], radius: usize) -> Vec<f32> {
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0f64);
    for v in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + *v as f64);
    }
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(values.len());
            let mean = (prefix[hi] - prefix[lo]) / (hi - lo) as f64;
            (values[i] - mean as f32).max(0.0)
        })
        .collect()
}

fn autocorrelation(values: &[f32], lag: usize) -> f32 {
    if lag >= values.len() {
        return 0.0;
    }
    let n = values.len() - lag;
    let sum: f32 = values[..n]
        .iter()
        .zip(&values[lag..])
        .map(|(a, b)| a * b)
        .sum();
    sum / n as f32
}

/// Parabolic interpolation around an autocorrelation peak.
fn refine_peak(acf: &[f32], lag: usize) -> f32 {
    if lag == 0 || lag + 1 >= acf.len() {
        return lag as f32;
    }
    let (left, mid, right) = (acf[lag - 1], acf[lag], acf[lag + 1]);
    let denom = left - 2.0 * mid + right;
    if denom.abs() <= f32::EPSILON {
        return lag as f32;
    }
    let delta = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    lag as f32 + delta
}

fn best_phase(onsets: &[f32], period: f32) -> f32 {
    let candidates = period.ceil().max(1.0) as usize;
    let mut best = (0usize, f32::MIN);
    for start in 0..candidates {
        let mut score = 0.0;
        let mut k = 0usize;
        loop {
            let idx = (start as f32 + k as f32 * period).round() as usize;
            if idx >= onsets.len() {
                break;
            }
            score += onsets[idx];
            k += 1;
        }
        if score > best.1 {
            best = (start, score);
        }
    }
    best.0 as f32
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
    magnitudes: Vec<f32>,
}

impl FftResources {
    fn new(planner: &mut RealFftPlanner<f32>, size: usize) -> Self {
        let plan = planner.plan_fft_forward(size);
        let scratch = plan.make_scratch_vec();
        let spectrum = plan.make_output_vec();
        let input = plan.make_input_vec();
        let magnitudes = vec![0.0; spectrum.len()];
        Self {
            size,
            window: (0..size).map(|i| hann_value(i, size)).collect(),
            plan,
            scratch,
            spectrum,
            input,
            magnitudes,
        }
    }

    /// Windowed amplitude spectrum of `block`, scaled so a full-scale sine
    /// peaks near 1.0.
    fn magnitudes(&mut self, block: &[f32]) -> Result<&[f32]> {
        for ((slot, sample), w) in self.input.iter_mut().zip(block).zip(&self.window) {
            *slot = sample * w;
        }
        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let scale = 4.0 / self.size as f32;
        for (out, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *out = bin.norm() * scale;
        }
        Ok(&self.magnitudes)
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::audio::synth;

    fn analyze(audio: &AudioBuffer, config: RenderConfig) -> Analysis {
        AudioAnalyzer::new(&config).unwrap().analyze(audio).unwrap()
    }

    #[test]
    fn silence_yields_zero_features() {
        let audio = synth::silence(4.0, 22_050).unwrap();
        let analysis = analyze(&audio, RenderConfig::default());

        assert!(analysis.grid().is_none());
        assert_eq!(analysis.len(), 96);
        for frame in analysis.frames() {
            assert_eq!((frame.bass, frame.mid, frame.high, frame.accent), (0.0, 0.0, 0.0, 0.0));
            assert_eq!(frame.onsets, BandFlags::default());
            assert!(!frame.kick);
            assert_eq!(frame.bar_index, 0);
        }
    }

    #[test]
    fn energies_stay_normalised_for_noise_and_clipping() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut samples: Vec<f32> = (0..22_050 * 3).map(|_| rng.gen_range(-1.0..1.0)).collect();
        samples.extend(std::iter::repeat(1.0).take(22_050));
        samples.extend((0..22_050).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }));
        let audio = AudioBuffer::new(samples, 22_050).unwrap();

        let analysis = analyze(&audio, RenderConfig::default());
        for frame in analysis.frames() {
            for band in Band::ALL {
                let energy = frame.energy(band);
                assert!((0.0..=1.0).contains(&energy), "{band:?} out of range: {energy}");
            }
            assert!((0.0..=1.0).contains(&frame.accent));
            assert!((0.0..1.0).contains(&frame.beat_phase));
        }
    }

    #[test]
    fn detects_tempo_and_kicks_of_a_steady_beat() {
        let audio = synth::kick_track(12.0, 22_050, 120.0, 0.8).unwrap();
        let analysis = analyze(&audio, RenderConfig::default());

        let bpm = analysis.summary().tempo_bpm.expect("tempo should be detected");
        assert!((bpm - 120.0).abs() < 4.0, "detected {bpm} BPM");

        let kicks = analysis.frames().filter(|f| f.kick).count();
        assert!((20..=25).contains(&kicks), "found {kicks} kicks");

        let bars: Vec<u64> = analysis.frames().map(|f| f.bar_index).collect();
        assert!(bars.windows(2).all(|w| w[0] <= w[1]));
        assert!(*bars.last().unwrap() >= 4);
    }

    #[test]
    fn frames_are_restartable() {
        let audio = synth::test_track(3.0, 16_000, 120.0).unwrap();
        let analysis = analyze(&audio, RenderConfig::default());
        let first: Vec<FeatureFrame> = analysis.frames().collect();
        let second: Vec<FeatureFrame> = analysis.frames().collect();
        assert_eq!(first, second);
        assert_eq!(analysis.frames().len(), first.len());
    }

    #[test]
    fn honours_the_requested_window() {
        let audio = synth::test_track(6.0, 16_000, 120.0).unwrap();
        let config = RenderConfig {
            start: 1.5,
            end: Some(3.5),
            ..Default::default()
        };
        let analysis = analyze(&audio, config);

        assert_eq!(analysis.len(), 48);
        let frames: Vec<FeatureFrame> = analysis.frames().collect();
        assert_eq!(frames[0].time, 1.5);
        assert!(frames.last().unwrap().time < 3.5);
        assert_eq!(analysis.summary().start_seconds, 1.5);
    }

    #[test]
    fn rejects_invalid_configuration_before_analysis() {
        let config = RenderConfig {
            bars: 0,
            ..Default::default()
        };
        assert!(AudioAnalyzer::new(&config).unwrap_err().is_config());
    }

    #[test]
    fn kick_gate_respects_threshold() {
        let audio = synth::kick_track(6.0, 22_050, 120.0, 0.8).unwrap();
        let strict = RenderConfig {
            kick_threshold: 1.0,
            ..Default::default()
        };
        assert_eq!(analyze(&audio, strict).frames().filter(|f| f.kick).count(), 0);
    }
}
