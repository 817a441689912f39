//! Job descriptors, pipeline configuration, and result types.
//!
//! A [`CaptureJob`] is resolved once by the caller and consumed read-only by
//! every pipeline component. No component reads ambient mutable state
//! (environment variables, argv) during a run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default navigation timeout for opening a target, in milliseconds.
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 60_000;

/// A capture rectangle in integer device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Rectangle X position
    pub x: i32,
    /// Rectangle Y position
    pub y: i32,
    /// Rectangle width in pixels
    pub width: u32,
    /// Rectangle height in pixels
    pub height: u32,
}

/// A fully resolved capture job. Immutable once the pipeline starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureJob {
    /// Target URL to open and record
    pub url: String,
    /// Explicit capture rectangle. `None` means resolve from the surface's
    /// content bounding box at job start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Rect>,
    /// Total capture window in milliseconds
    pub duration_ms: u64,
    /// Sampling rate in samples per second
    pub rate_fps: u32,
    /// Final video output path
    pub output_path: PathBuf,
    /// Navigation timeout passed to the browser collaborator
    #[serde(default = "default_nav_timeout")]
    pub nav_timeout_ms: u64,
}

fn default_nav_timeout() -> u64 {
    DEFAULT_NAV_TIMEOUT_MS
}

impl CaptureJob {
    /// Create a job with the default navigation timeout and an
    /// auto-resolved capture region.
    pub fn new(
        url: impl Into<String>,
        duration_ms: u64,
        rate_fps: u32,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            url: url.into(),
            region: None,
            duration_ms,
            rate_fps,
            output_path: output_path.into(),
            nav_timeout_ms: DEFAULT_NAV_TIMEOUT_MS,
        }
    }

    /// Label used for the job-scoped staging directory, derived from the
    /// output file stem.
    pub fn label(&self) -> String {
        self.output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "capture".to_string())
    }
}

/// How scheduled samples are driven against the shared surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Capture sample i, sleep the remaining inter-frame interval, capture
    /// i+1. Strictly ordered, no overlap.
    #[default]
    Sequential,
    /// Arm all N delayed triggers at job start. Waits run concurrently;
    /// the capture calls themselves are still serialized.
    Concurrent,
}

/// How missing frame indices are handled before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Keep original indices. The encoder's pattern feed stops at the first
    /// gap, so failed samples truncate the output. Indices stay stable as a
    /// debugging aid.
    #[default]
    AcceptGaps,
    /// Rename staged frames to a contiguous sequence before encoding,
    /// eliminating the gap hazard.
    RenumberCompact,
}

/// How loudly per-sample capture failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureVerbosity {
    /// Per-sample failures logged at warn level
    #[default]
    Verbose,
    /// Per-sample failures logged at debug level only
    Quiet,
}

/// Pipeline configuration. One configurable pipeline replaces the source's
/// five near-duplicate variants.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sample scheduling policy
    #[serde(default)]
    pub sampling: SamplingPolicy,
    /// Missing-index handling before encode
    #[serde(default)]
    pub gaps: GapPolicy,
    /// Failure-reporting verbosity
    #[serde(default)]
    pub verbosity: FailureVerbosity,
}

/// Outcome of one capture job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeResult {
    /// Final video output path
    pub output_path: PathBuf,
    /// Whether the encode produced an output file
    pub success: bool,
    /// Number of frames staged for the encoder
    pub frames_staged: usize,
    /// Number of frames the schedule called for
    pub frames_total: usize,
    /// Encoder error detail when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EncodeResult {
    pub(crate) fn failed(output_path: &Path, staged: usize, total: usize, error: String) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
            success: false,
            frames_staged: staged,
            frames_total: total,
            error: Some(error),
        }
    }
}
