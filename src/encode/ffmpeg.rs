use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use super::VideoSink;
use crate::config::Resolution;
use crate::error::SinkError;
use crate::render::Frame;

/// Encoder settings for the `[encoder]` config section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FfmpegOptions {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    /// Target bitrate such as "8M"; replaces `crf` when set
    #[serde(default)]
    pub bitrate: Option<String>,
}

impl Default for FfmpegOptions {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            crf: default_crf(),
            bitrate: None,
        }
    }
}

fn default_binary() -> PathBuf { PathBuf::from("ffmpeg") }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_crf() -> u32 { 18 }

impl FfmpegOptions {
    /// Command-line arguments for encoding rgb24 frames from stdin.
    pub fn args(&self, output: &Path, audio: Option<&Path>, resolution: Resolution, fps: u32) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-loglevel".into(), "error".into(),
            "-f".into(), "rawvideo".into(),
            "-pixel_format".into(), "rgb24".into(),
            "-video_size".into(), resolution.to_string(),
            "-framerate".into(), fps.to_string(),
            "-i".into(), "pipe:0".into(),
        ];

        if let Some(audio) = audio {
            args.extend(["-i".to_string(), audio.display().to_string()]);
        }

        args.extend([
            "-c:v".to_string(), self.codec.clone(),
            "-pix_fmt".into(), self.pix_fmt.clone(),
        ]);

        if let Some(ref br) = self.bitrate {
            args.extend(["-b:v".to_string(), br.clone()]);
        } else {
            args.extend(["-crf".to_string(), self.crf.to_string()]);
            args.extend(["-preset".to_string(), "medium".to_string()]);
        }

        if audio.is_some() {
            args.extend([
                "-c:a".to_string(), "aac".into(),
                "-b:a".into(), "192k".into(),
                "-shortest".into(),
            ]);
        }

        args.push(output.display().to_string());
        args
    }
}

/// Pipes raw rgb24 frames into an `ffmpeg` child process.
pub struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    frame_len: usize,
}

impl FfmpegSink {
    /// Start ffmpeg writing to `output`, muxing `audio` when given.
    pub fn spawn(
        options: &FfmpegOptions,
        output: &Path,
        audio: Option<&Path>,
        resolution: Resolution,
        fps: u32,
    ) -> std::result::Result<Self, SinkError> {
        Self::spawn_inner(options, output, audio, resolution, fps)
            .map_err(|e| SinkError::Encoder(format!("{:#}", e)))
    }

    fn spawn_inner(
        options: &FfmpegOptions,
        output: &Path,
        audio: Option<&Path>,
        resolution: Resolution,
        fps: u32,
    ) -> Result<Self> {
        let args = options.args(output, audio, resolution, fps);
        let mut child = Command::new(&options.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}. Is ffmpeg installed?", options.binary.display()))?;

        let stdin = child.stdin.take().context("ffmpeg stdin not available")?;
        // Drain stderr so a chatty encoder cannot fill the pipe and stall.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        log::info!(
            "ffmpeg encoder started: {} @ {}fps, codec={}, output={}",
            resolution,
            fps,
            options.codec,
            output.display()
        );

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr,
            frame_len: resolution.frame_len(),
        })
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl VideoSink for FfmpegSink {
    fn write_frame(&mut self, frame: Frame) -> std::result::Result<(), SinkError> {
        if frame.pixels.len() != self.frame_len {
            return Err(SinkError::Rejected(format!(
                "frame {} has {} bytes, expected {}",
                frame.index,
                frame.pixels.len(),
                self.frame_len
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SinkError::Rejected("encoder input already closed".into()))?;
        stdin.write_all(&frame.pixels)?;
        Ok(())
    }

    fn finalize(&mut self) -> std::result::Result<(), SinkError> {
        // Closing stdin signals EOF.
        drop(self.stdin.take());
        let status = self.child.wait()?;
        let stderr = self.collect_stderr();
        if !status.success() {
            return Err(SinkError::Encoder(format!(
                "ffmpeg exited with {}:\n{}",
                status,
                stderr.trim()
            )));
        }
        log::info!("ffmpeg encoding complete");
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill() {
            log::debug!("ffmpeg already exited: {}", e);
        }
        let _ = self.child.wait();
        self.collect_stderr();
        log::warn!("ffmpeg encoder aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_use_crf_without_bitrate() {
        let args = FfmpegOptions::default().args(Path::new("out.mp4"), None, Resolution::new(640, 360), 30);
        assert!(args.windows(2).any(|w| w[0] == "-pixel_format" && w[1] == "rgb24"));
        assert!(args.windows(2).any(|w| w[0] == "-video_size" && w[1] == "640x360"));
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn args_mux_audio_and_bitrate() {
        let opts = FfmpegOptions {
            bitrate: Some("8M".into()),
            ..FfmpegOptions::default()
        };
        let args = opts.args(Path::new("out.mp4"), Some(Path::new("song.wav")), Resolution::new(64, 36), 24);
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "8M"));
        assert!(!args.iter().any(|a| a == "-crf"));
        assert!(args.iter().any(|a| a == "-shortest"));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
    }

    #[test]
    fn missing_binary_is_an_encoder_error() {
        let opts = FfmpegOptions {
            binary: PathBuf::from("/nonexistent/ffmpeg-binary"),
            ..FfmpegOptions::default()
        };
        let err = FfmpegSink::spawn(&opts, Path::new("out.mp4"), None, Resolution::new(8, 8), 30)
            .err()
            .unwrap();
        assert!(matches!(err, SinkError::Encoder(_)));
    }
}
