//! Error types for the capture pipeline.

use std::fmt;

/// Fatal job errors surfaced to the caller.
///
/// Per-sample capture failures and cleanup failures are absorbed inside the
/// pipeline and never appear here; encoder invocation failures are reported
/// through a failed [`EncodeResult`](crate::EncodeResult) instead.
#[derive(Debug)]
pub enum PipelineError {
    /// Navigation or page setup failed; the target could not be opened
    TargetUnreachable(String),
    /// The surface could not report a usable content bounding box
    RegionUnavailable(String),
    /// The job parameters yield zero scheduled samples
    EmptySchedule,
    /// The staging directory could not be created
    Staging(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::TargetUnreachable(msg) => write!(f, "Target unreachable: {}", msg),
            PipelineError::RegionUnavailable(msg) => {
                write!(f, "Capture region unavailable: {}", msg)
            }
            PipelineError::EmptySchedule => write!(f, "Job parameters yield an empty schedule"),
            PipelineError::Staging(msg) => write!(f, "Staging directory error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<PipelineError> for String {
    fn from(err: PipelineError) -> Self {
        err.to_string()
    }
}
