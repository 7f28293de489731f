use std::path::Path;

use anyhow::{bail, Context, Result};
use beatscape_core::AudioBuffer;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Decodes a WAV file into a mono buffer.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path)
        .with_context(|| format!("failed to open audio file '{}'", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("failed to decode float samples")?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                bail!("unsupported bit depth {}", spec.bits_per_sample);
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .context("failed to decode integer samples")?
        }
    };

    tracing::debug!(
        path = %path.display(),
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        "decoded audio"
    );

    AudioBuffer::from_interleaved(&samples, spec.channels, spec.sample_rate)
        .with_context(|| format!("'{}' holds no usable audio", path.display()))
}

/// Writes a mono buffer as 32-bit float WAV.
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    for &sample in audio.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmixes_stereo_int_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16_384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.sample_rate(), 8_000);
        assert_eq!(audio.samples().len(), 100);
        assert!((audio.samples()[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn float_samples_survive_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let audio = AudioBuffer::new(vec![0.5, -0.25, 0.0, 1.0], 22_050).unwrap();
        write_wav(&path, &audio).unwrap();
        let decoded = read_wav(&path).unwrap();
        assert_eq!(decoded.samples(), audio.samples());
        assert_eq!(decoded.sample_rate(), 22_050);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(format!("{err:#}").contains("here.wav"));
    }
}
