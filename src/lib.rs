//! Timed frame capture of rendered web pages, assembled into video.
//!
//! The caller supplies a resolved [`CaptureJob`] plus two collaborators: a
//! [`Browser`] that opens a live rendering surface for a URL, and a
//! [`FrameEncoder`] that turns a staged image sequence into a video file
//! (normally the bundled [`FfmpegEncoder`]). The pipeline samples the
//! surface at the job's rate over the job's duration, stages successful
//! samples under order-preserving names, invokes the encoder, and removes
//! the staging directory on every exit path.
//!
//! ```no_run
//! # async fn demo<B: pagereel::Browser>(browser: B) where B::Surface: 'static {
//! use pagereel::{run_capture_pipeline, CaptureJob, FfmpegEncoder, PipelineConfig};
//!
//! let job = CaptureJob::new(
//!     "https://example.com",
//!     5_000, // duration in ms
//!     10,    // samples per second
//!     "output.mp4",
//! );
//! let encoder = FfmpegEncoder::new();
//! let result = run_capture_pipeline(&browser, &encoder, &job, &PipelineConfig::default()).await;
//! # let _ = result;
//! # }
//! ```

pub mod encoder;
pub mod error;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod sampler;
pub mod schedule;
pub mod store;
pub mod surface;

pub use encoder::{FfmpegEncoder, FrameEncoder};
pub use error::PipelineError;
pub use job::{
    CaptureJob, EncodeResult, FailureVerbosity, GapPolicy, PipelineConfig, Rect, SamplingPolicy,
};
pub use pipeline::{run_batch, run_capture_pipeline, run_capture_pipeline_with_stop};
pub use sampler::{CapturedFrame, StopHandle};
pub use schedule::{schedule, FrameSchedule, ScheduledSample};
pub use store::FrameStore;
pub use surface::{resolve_region, BoundingBox, Browser, Surface};
