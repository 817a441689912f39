//! External encoder invocation (FFmpeg via ffmpeg-sidecar).
//!
//! Arguments are always passed as a vector to the subprocess API, never as
//! a shell command string, so exit codes and stderr stay inspectable and
//! path quoting is a non-issue.

use ffmpeg_sidecar::command::FfmpegCommand;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Invokes an image-sequence-to-video encoder over a staged frame set.
///
/// Invocation failure (non-zero exit, encoder missing) is reported as an
/// error and is not retried.
pub trait FrameEncoder: Send + Sync {
    /// Encode the frames matched by `input_pattern` into a video at
    /// `output_path`, using `rate_fps` as the output timing base. An
    /// existing output file is always replaced.
    fn encode(&self, input_pattern: &Path, rate_fps: u32, output_path: &Path)
        -> Result<(), String>;
}

/// FFmpeg-backed encoder.
///
/// Output is H.264 in yuv420p (broad playback compatibility) at CRF 23, a
/// middle-of-range quality setting. The `%0Nd` pattern feed requires
/// contiguous indices: a gap from a failed sample makes FFmpeg stop at the
/// first missing index, truncating the output. That is the accepted legacy
/// behavior; [`GapPolicy::RenumberCompact`](crate::GapPolicy) removes the
/// hazard by compacting indices before the encode.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
}

impl FfmpegEncoder {
    /// Encoder using the default FFmpeg binary: the system `ffmpeg` on
    /// Linux, the sidecar binary adjacent to the executable elsewhere.
    pub fn new() -> Self {
        Self {
            ffmpeg: default_ffmpeg_path(),
        }
    }

    /// Encoder using an explicit FFmpeg binary path.
    pub fn with_path(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Verify the FFmpeg binary is runnable by invoking `ffmpeg -version`.
    pub fn verify(&self) -> Result<(), String> {
        match Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(format!(
                "ffmpeg at {} exited with status {}",
                self.ffmpeg.display(),
                status
            )),
            Err(e) => Err(format!(
                "ffmpeg not found at {}: {}",
                self.ffmpeg.display(),
                e
            )),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn encode(
        &self,
        input_pattern: &Path,
        rate_fps: u32,
        output_path: &Path,
    ) -> Result<(), String> {
        debug!(
            "encoding {} at {} fps -> {}",
            input_pattern.display(),
            rate_fps,
            output_path.display()
        );

        let mut command = FfmpegCommand::new_with_path(&self.ffmpeg);
        command
            .args(["-y"])
            .args(["-framerate", &rate_fps.to_string()])
            .args(["-i", input_pattern.to_string_lossy().as_ref()])
            .args(["-c:v", "libx264"])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-crf", "23"])
            .arg(output_path.to_string_lossy().to_string());

        let inner = command.as_inner_mut();
        inner.stdout(Stdio::null());
        inner.stderr(Stdio::piped());

        let mut child = inner
            .spawn()
            .map_err(|e| format!("failed to start ffmpeg: {}", e))?;

        let stderr_output = if let Some(mut stderr) = child.stderr.take() {
            let mut output = String::new();
            let _ = stderr.read_to_string(&mut output);
            output
        } else {
            String::new()
        };

        let status = child
            .wait()
            .map_err(|e| format!("ffmpeg process error: {}", e))?;

        if !status.success() {
            return Err(if stderr_output.is_empty() {
                format!("ffmpeg failed with exit code: {:?}", status.code())
            } else {
                format!(
                    "ffmpeg failed: {}",
                    stderr_output.lines().last().unwrap_or(&stderr_output)
                )
            });
        }

        info!("video saved: {}", output_path.display());
        Ok(())
    }
}

fn default_ffmpeg_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        // Linux: system FFmpeg from PATH
        PathBuf::from("ffmpeg")
    }
    #[cfg(not(target_os = "linux"))]
    {
        // Windows/macOS: the sidecar binary next to current_exe()
        ffmpeg_sidecar::paths::ffmpeg_path()
    }
}
