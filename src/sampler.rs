//! Timed sampling of a shared rendering surface.
//!
//! Two scheduling policies are supported (see
//! [`SamplingPolicy`](crate::SamplingPolicy)). Under the concurrent policy
//! only the waits overlap: the capture primitive is not reentrant, so every
//! actual capture call goes through one async mutex per surface. Ordering of
//! the collected results is governed solely by schedule index, never by
//! completion order.

use crate::job::{FailureVerbosity, PipelineConfig, Rect, SamplingPolicy};
use crate::schedule::FrameSchedule;
use crate::surface::Surface;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Handle to cancel an in-progress job.
pub type StopHandle = Arc<AtomicBool>;

/// One sample result. `data` is `None` when the capture primitive failed
/// for this index (the empty-marker); the frame is never revisited.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub index: usize,
    pub data: Option<Vec<u8>>,
}

impl CapturedFrame {
    pub fn is_captured(&self) -> bool {
        self.data.is_some()
    }
}

/// Capture every scheduled sample, waiting for each nominal offset relative
/// to job start before invoking the capture primitive.
///
/// Per-sample failures are absorbed: a failed capture yields an
/// empty-marker frame and the batch keeps going. A set stop handle aborts
/// the remaining schedule; frames already captured are returned.
pub async fn collect_samples<S>(
    surface: Arc<S>,
    region: Rect,
    schedule: &FrameSchedule,
    config: &PipelineConfig,
    stop: &StopHandle,
) -> Vec<CapturedFrame>
where
    S: Surface + 'static,
{
    match config.sampling {
        SamplingPolicy::Sequential => {
            sequential(surface, region, schedule, config.verbosity, stop).await
        }
        SamplingPolicy::Concurrent => {
            concurrent(surface, region, schedule, config.verbosity, stop).await
        }
    }
}

async fn sequential<S: Surface>(
    surface: Arc<S>,
    region: Rect,
    schedule: &FrameSchedule,
    verbosity: FailureVerbosity,
    stop: &StopHandle,
) -> Vec<CapturedFrame> {
    let start = Instant::now();
    let mut frames = Vec::with_capacity(schedule.len());

    for sample in schedule.samples() {
        if stop.load(Ordering::Relaxed) {
            debug!("stop requested, aborting schedule at sample {}", sample.index);
            break;
        }
        sleep_until(start + Duration::from_millis(sample.offset_ms)).await;
        frames.push(capture_one(&*surface, region, sample.index, verbosity));
    }

    frames
}

async fn concurrent<S>(
    surface: Arc<S>,
    region: Rect,
    schedule: &FrameSchedule,
    verbosity: FailureVerbosity,
    stop: &StopHandle,
) -> Vec<CapturedFrame>
where
    S: Surface + 'static,
{
    let start = Instant::now();
    // Critical section around the capture primitive. Waits race freely;
    // captures never do.
    let capture_lock = Arc::new(Mutex::new(()));

    let mut tasks = Vec::with_capacity(schedule.len());
    for sample in schedule.samples() {
        let surface = Arc::clone(&surface);
        let capture_lock = Arc::clone(&capture_lock);
        let stop = Arc::clone(stop);
        let index = sample.index;
        let offset_ms = sample.offset_ms;
        tasks.push(tokio::spawn(async move {
            sleep_until(start + Duration::from_millis(offset_ms)).await;
            if stop.load(Ordering::Relaxed) {
                return CapturedFrame { index, data: None };
            }
            let _guard = capture_lock.lock().await;
            capture_one(&*surface, region, index, verbosity)
        }));
    }

    // Join order equals schedule order, so the collection is indexed by
    // schedule index regardless of capture completion order.
    let mut frames = Vec::with_capacity(schedule.len());
    for (sample, task) in schedule.samples().iter().zip(tasks) {
        let frame = match task.await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("sample {} task failed: {}", sample.index, e);
                CapturedFrame {
                    index: sample.index,
                    data: None,
                }
            }
        };
        frames.push(frame);
    }

    frames
}

fn capture_one<S: Surface + ?Sized>(
    surface: &S,
    region: Rect,
    index: usize,
    verbosity: FailureVerbosity,
) -> CapturedFrame {
    match surface.capture_image(region) {
        Ok(bytes) => CapturedFrame {
            index,
            data: Some(bytes),
        },
        Err(e) => {
            match verbosity {
                FailureVerbosity::Verbose => warn!("capture failed for sample {}: {}", index, e),
                FailureVerbosity::Quiet => debug!("capture failed for sample {}: {}", index, e),
            }
            CapturedFrame { index, data: None }
        }
    }
}
