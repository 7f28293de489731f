use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use beatscape_core::{
    record::{check_frame, FrameSink, SinkConfig},
    BeatscapeError, Raster, Result,
};

/// Source audio muxed into the encoded video, trimmed to the rendered window.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub start: f32,
    pub end: Option<f32>,
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Pipes raw RGBA frames into the system `ffmpeg` binary and writes an H.264 MP4.
pub struct FfmpegSink {
    out_path: PathBuf,
    overwrite: bool,
    audio: Option<AudioTrack>,
    config: Option<SinkConfig>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    written: u64,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>, overwrite: bool, audio: Option<AudioTrack>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite,
            audio,
            config: None,
            child: None,
            stdin: None,
            written: 0,
        }
    }

    fn command(&self, config: &SinkConfig) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", config.width, config.height),
            "-r",
            &config.fps.to_string(),
            "-i",
            "pipe:0",
        ]);

        match &self.audio {
            Some(track) => {
                cmd.args(["-ss", &format!("{:.3}", track.start)]);
                if let Some(end) = track.end {
                    cmd.args(["-to", &format!("{end:.3}")]);
                }
                cmd.arg("-i")
                    .arg(&track.path)
                    .args(["-map", "0:v", "-map", "1:a", "-c:a", "aac", "-shortest"]);
            }
            None => {
                cmd.arg("-an");
            }
        }

        cmd.args([
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&self.out_path);
        cmd
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, config: SinkConfig) -> Result<()> {
        if config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(BeatscapeError::config(
                "frame width/height must be even for yuv420p output",
            ));
        }
        ensure_parent_dir(&self.out_path)?;
        if !self.overwrite && self.out_path.exists() {
            return Err(BeatscapeError::msg(format!(
                "output file '{}' already exists",
                self.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(BeatscapeError::msg(
                "ffmpeg is required for video output, but was not found on PATH",
            ));
        }

        let mut child = self.command(&config).spawn().map_err(|e| {
            BeatscapeError::msg(format!("failed to spawn ffmpeg (is it installed and on PATH?): {e}"))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BeatscapeError::msg("failed to open ffmpeg stdin"))?;

        tracing::debug!(path = %self.out_path.display(), ?config, "ffmpeg started");
        self.config = Some(config);
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.written = 0;
        Ok(())
    }

    fn push_frame(&mut self, index: u64, frame: &Raster) -> Result<()> {
        let (Some(config), Some(stdin)) = (self.config, self.stdin.as_mut()) else {
            return Err(BeatscapeError::render("ffmpeg sink is not running"));
        };
        check_frame(&config, self.written, index, frame)?;
        stdin.write_all(frame.data()).map_err(|e| {
            BeatscapeError::msg(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        drop(self.stdin.take());
        let Some(child) = self.child.take() else {
            return Ok(());
        };

        let output = child
            .wait_with_output()
            .map_err(|e| BeatscapeError::msg(format!("failed to wait for ffmpeg to finish: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BeatscapeError::msg(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        tracing::info!(path = %self.out_path.display(), frames = self.written, "video written");
        Ok(())
    }
}

impl Drop for FfmpegSink {
    /// Closes the pipe and reaps ffmpeg when the sink is dropped without
    /// `end`, so no child process outlives a failed render.
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.wait() {
                tracing::warn!(error = %err, "failed to wait for ffmpeg");
            }
        }
    }
}

/// Writes every frame as `frame_000000.png` into a directory.
pub struct PngSequenceSink {
    dir: PathBuf,
    config: Option<SinkConfig>,
    written: u64,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: None,
            written: 0,
        }
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, config: SinkConfig) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        self.config = Some(config);
        self.written = 0;
        Ok(())
    }

    fn push_frame(&mut self, index: u64, frame: &Raster) -> Result<()> {
        let Some(config) = self.config else {
            return Err(BeatscapeError::render("png sink is not running"));
        };
        check_frame(&config, self.written, index, frame)?;
        let image = image::RgbaImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| BeatscapeError::render("frame buffer does not match its size"))?;
        let path = self.frame_path(index);
        image
            .save(&path)
            .map_err(|e| BeatscapeError::msg(format!("failed to write '{}': {e}", path.display())))?;
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        tracing::info!(dir = %self.dir.display(), frames = self.written, "png sequence written");
        Ok(())
    }
}
