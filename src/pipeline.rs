//! The capture pipeline: region resolution, scheduling, sampling, staging,
//! encoding, cleanup.
//!
//! One configurable pipeline replaces the source's five near-duplicate
//! variants. Resource discipline: the browser session and the staging
//! directory are each scoped to one job and released on every exit path.

use crate::encoder::FrameEncoder;
use crate::error::PipelineError;
use crate::job::{CaptureJob, EncodeResult, GapPolicy, PipelineConfig};
use crate::sampler::{collect_samples, StopHandle};
use crate::schedule::{schedule, FrameSchedule};
use crate::store::FrameStore;
use crate::surface::{resolve_region, Browser, Surface};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run one capture job to completion.
///
/// Fatal setup errors (target unreachable, region unavailable, empty
/// schedule, staging failure) surface as `Err`. Per-sample capture failures
/// are absorbed as gaps. Encoder invocation failure is reported through a
/// failed [`EncodeResult`], not an error. The staging directory is removed
/// and the surface closed whatever the outcome.
pub async fn run_capture_pipeline<B, E>(
    browser: &B,
    encoder: &E,
    job: &CaptureJob,
    config: &PipelineConfig,
) -> Result<EncodeResult, PipelineError>
where
    B: Browser,
    B::Surface: 'static,
    E: FrameEncoder,
{
    run_capture_pipeline_with_stop(browser, encoder, job, config, StopHandle::default()).await
}

/// [`run_capture_pipeline`] with a cancellation handle.
///
/// Setting the handle aborts the remaining schedule, stages whatever frames
/// were captured, skips the encode, and proceeds straight to cleanup.
pub async fn run_capture_pipeline_with_stop<B, E>(
    browser: &B,
    encoder: &E,
    job: &CaptureJob,
    config: &PipelineConfig,
    stop: StopHandle,
) -> Result<EncodeResult, PipelineError>
where
    B: Browser,
    B::Surface: 'static,
    E: FrameEncoder,
{
    info!(
        "starting capture: {} ({} ms at {} fps)",
        job.url, job.duration_ms, job.rate_fps
    );

    let surface = browser
        .open_target(&job.url, job.nav_timeout_ms)
        .map_err(PipelineError::TargetUnreachable)?;
    let surface = Arc::new(surface);

    let outcome = run_on_surface(Arc::clone(&surface), encoder, job, config, &stop).await;

    // The session is job-scoped; close it on every exit path.
    if let Err(e) = surface.close() {
        warn!("failed to close surface: {}", e);
    }

    outcome
}

async fn run_on_surface<S, E>(
    surface: Arc<S>,
    encoder: &E,
    job: &CaptureJob,
    config: &PipelineConfig,
    stop: &StopHandle,
) -> Result<EncodeResult, PipelineError>
where
    S: Surface + 'static,
    E: FrameEncoder,
{
    // Geometry is frozen at job start; surfaces may reflow between samples.
    let region = match job.region {
        Some(region) => region,
        None => resolve_region(&*surface)?,
    };

    let sched = schedule(job.duration_ms, job.rate_fps);
    if sched.is_empty() {
        return Err(PipelineError::EmptySchedule);
    }
    let frames_total = sched.len();
    info!(
        "recording {} frames, {:.1} ms interval",
        frames_total,
        1000.0 / job.rate_fps as f64
    );

    let store = FrameStore::create(&job.label(), frames_total)?;

    // No early return between here and cleanup.
    let result =
        sample_and_encode(surface, encoder, job, config, stop, &store, region, &sched).await;

    store.cleanup();
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
async fn sample_and_encode<S, E>(
    surface: Arc<S>,
    encoder: &E,
    job: &CaptureJob,
    config: &PipelineConfig,
    stop: &StopHandle,
    store: &FrameStore,
    region: crate::job::Rect,
    sched: &FrameSchedule,
) -> EncodeResult
where
    S: Surface + 'static,
    E: FrameEncoder,
{
    let frames_total = sched.len();
    let frames = collect_samples(surface, region, sched, config, stop).await;
    let staged = store.stage_all(&frames);
    info!("captured {}/{} valid frames", staged, frames_total);

    if let GapPolicy::RenumberCompact = config.gaps {
        if let Err(e) = store.compact() {
            error!("frame compaction failed: {}", e);
            return EncodeResult::failed(&job.output_path, staged, frames_total, e);
        }
    }

    if stop.load(Ordering::Relaxed) {
        info!("job cancelled before encode");
        return EncodeResult::failed(
            &job.output_path,
            staged,
            frames_total,
            "job cancelled".to_string(),
        );
    }

    match encoder.encode(&store.input_pattern(), job.rate_fps, &job.output_path) {
        Ok(()) => EncodeResult {
            output_path: job.output_path.clone(),
            success: true,
            frames_staged: staged,
            frames_total,
            error: None,
        },
        Err(e) => {
            error!("encode failed: {}", e);
            EncodeResult::failed(&job.output_path, staged, frames_total, e)
        }
    }
}

/// Run a batch of resolved jobs sequentially.
///
/// One job's fatal failure never aborts the rest; every outcome is
/// collected and returned in job order.
pub async fn run_batch<B, E>(
    browser: &B,
    encoder: &E,
    jobs: &[CaptureJob],
    config: &PipelineConfig,
) -> Vec<Result<EncodeResult, PipelineError>>
where
    B: Browser,
    B::Surface: 'static,
    E: FrameEncoder,
{
    let mut outcomes = Vec::with_capacity(jobs.len());
    for (i, job) in jobs.iter().enumerate() {
        info!("job {}/{}: {}", i + 1, jobs.len(), job.url);
        let outcome = run_capture_pipeline(browser, encoder, job, config).await;
        match &outcome {
            Ok(result) if result.success => {
                info!("job {} finished: {}", i + 1, result.output_path.display())
            }
            Ok(result) => warn!(
                "job {} encode failed: {}",
                i + 1,
                result.error.as_deref().unwrap_or("unknown")
            ),
            Err(e) => error!("job {} failed: {}", i + 1, e),
        }
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Rect, SamplingPolicy};
    use crate::surface::BoundingBox;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    struct FakeSurface {
        calls: AtomicUsize,
        fail_calls: HashSet<usize>,
        closed: AtomicBool,
    }

    impl Surface for FakeSurface {
        fn bounding_box(&self) -> Result<BoundingBox, String> {
            Ok(BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 320.0,
                height: 200.0,
            })
        }

        fn capture_image(&self, _region: Rect) -> Result<Vec<u8>, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_calls.contains(&call) {
                Err("render glitch".to_string())
            } else {
                Ok(vec![0u8; 32])
            }
        }

        fn close(&self) -> Result<(), String> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeBrowser {
        fail_open: bool,
        fail_calls: HashSet<usize>,
        last_surface: Mutex<Option<Arc<FakeSurface>>>,
    }

    impl FakeBrowser {
        fn new() -> Self {
            Self {
                fail_open: false,
                fail_calls: HashSet::new(),
                last_surface: Mutex::new(None),
            }
        }

        fn failing_samples(fail_calls: impl IntoIterator<Item = usize>) -> Self {
            Self {
                fail_open: false,
                fail_calls: fail_calls.into_iter().collect(),
                last_surface: Mutex::new(None),
            }
        }

        fn unreachable() -> Self {
            Self {
                fail_open: true,
                fail_calls: HashSet::new(),
                last_surface: Mutex::new(None),
            }
        }
    }

    impl Browser for FakeBrowser {
        type Surface = Arc<FakeSurface>;

        fn open_target(&self, _url: &str, _timeout_ms: u64) -> Result<Self::Surface, String> {
            if self.fail_open {
                return Err("navigation timeout".to_string());
            }
            let surface = Arc::new(FakeSurface {
                calls: AtomicUsize::new(0),
                fail_calls: self.fail_calls.clone(),
                closed: AtomicBool::new(false),
            });
            *self.last_surface.lock().unwrap() = Some(Arc::clone(&surface));
            Ok(surface)
        }
    }

    /// Records the staging state observed at encode time.
    #[derive(Default)]
    struct FakeEncoder {
        fail: bool,
        invocations: AtomicUsize,
        seen: Mutex<Option<EncodeObservation>>,
    }

    struct EncodeObservation {
        staging_dir: PathBuf,
        staged_files: Vec<String>,
        rate_fps: u32,
    }

    impl FakeEncoder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    impl FrameEncoder for FakeEncoder {
        fn encode(
            &self,
            input_pattern: &Path,
            rate_fps: u32,
            _output_path: &Path,
        ) -> Result<(), String> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            let staging_dir = input_pattern.parent().unwrap().to_path_buf();
            let mut staged_files: Vec<String> = std::fs::read_dir(&staging_dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            staged_files.sort();
            *self.seen.lock().unwrap() = Some(EncodeObservation {
                staging_dir,
                staged_files,
                rate_fps,
            });
            if self.fail {
                Err("ffmpeg failed: exit code 1".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn job(output: &str) -> CaptureJob {
        CaptureJob::new("https://example.com", 1000, 5, output)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_path_reports_all_frames_and_cleans_up() {
        crate::logging::init_logging();
        let browser = FakeBrowser::new();
        let encoder = FakeEncoder::default();

        let result = run_capture_pipeline(&browser, &encoder, &job("out.mp4"), &Default::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.frames_staged, 5);
        assert_eq!(result.frames_total, 5);
        assert!(result.error.is_none());

        let seen = encoder.seen.lock().unwrap();
        let seen = seen.as_ref().unwrap();
        assert_eq!(seen.rate_fps, 5);
        assert_eq!(seen.staged_files.len(), 5);
        // Staging directory gone once the call returns
        assert!(!seen.staging_dir.exists());

        let surface = browser.last_surface.lock().unwrap();
        assert!(surface.as_ref().unwrap().closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_samples_leave_gaps_under_accept_gaps() {
        let browser = FakeBrowser::failing_samples([1, 2]);
        let encoder = FakeEncoder::default();

        let result = run_capture_pipeline(&browser, &encoder, &job("out.mp4"), &Default::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.frames_staged, 3);
        assert_eq!(result.frames_total, 5);

        let seen = encoder.seen.lock().unwrap();
        let seen = seen.as_ref().unwrap();
        assert_eq!(
            seen.staged_files,
            vec!["frame_0000.png", "frame_0003.png", "frame_0004.png"]
        );
        assert!(!seen.staging_dir.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renumber_compact_feeds_contiguous_indices() {
        let browser = FakeBrowser::failing_samples([1, 2]);
        let encoder = FakeEncoder::default();
        let config = PipelineConfig {
            gaps: GapPolicy::RenumberCompact,
            ..Default::default()
        };

        let result = run_capture_pipeline(&browser, &encoder, &job("out.mp4"), &config)
            .await
            .unwrap();

        assert!(result.success);
        let seen = encoder.seen.lock().unwrap();
        let seen = seen.as_ref().unwrap();
        assert_eq!(
            seen.staged_files,
            vec!["frame_0000.png", "frame_0001.png", "frame_0002.png"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_target_is_fatal_and_skips_encoder() {
        let browser = FakeBrowser::unreachable();
        let encoder = FakeEncoder::default();

        let err = run_capture_pipeline(&browser, &encoder, &job("out.mp4"), &Default::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::TargetUnreachable(_)));
        assert_eq!(encoder.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encode_failure_still_cleans_up() {
        let browser = FakeBrowser::new();
        let encoder = FakeEncoder::failing();

        let result = run_capture_pipeline(&browser, &encoder, &job("out.mp4"), &Default::default())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.frames_staged, 5);
        assert!(result.error.as_deref().unwrap().contains("ffmpeg failed"));

        let seen = encoder.seen.lock().unwrap();
        assert!(!seen.as_ref().unwrap().staging_dir.exists());

        let surface = browser.last_surface.lock().unwrap();
        assert!(surface.as_ref().unwrap().closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_skips_encode_and_cleans_up() {
        let browser = FakeBrowser::new();
        let encoder = FakeEncoder::default();
        let stop: StopHandle = Arc::new(AtomicBool::new(true));

        let result = run_capture_pipeline_with_stop(
            &browser,
            &encoder,
            &job("out.mp4"),
            &Default::default(),
            stop,
        )
        .await
        .unwrap();

        assert!(!result.success);
        assert_eq!(result.frames_staged, 0);
        assert_eq!(result.error.as_deref(), Some("job cancelled"));
        assert_eq!(encoder.invocations.load(Ordering::SeqCst), 0);

        let surface = browser.last_surface.lock().unwrap();
        assert!(surface.as_ref().unwrap().closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_schedule_is_a_fatal_job_error() {
        let browser = FakeBrowser::new();
        let encoder = FakeEncoder::default();
        let mut bad_job = job("out.mp4");
        bad_job.duration_ms = 0;

        let err = run_capture_pipeline(&browser, &encoder, &bad_job, &Default::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EmptySchedule));
        // The session is still closed on this abort path
        let surface = browser.last_surface.lock().unwrap();
        assert!(surface.as_ref().unwrap().closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_region_skips_resolution() {
        let browser = FakeBrowser::new();
        let encoder = FakeEncoder::default();
        let mut fixed_job = job("out.mp4");
        fixed_job.region = Some(Rect {
            x: 10,
            y: 10,
            width: 100,
            height: 50,
        });

        let result = run_capture_pipeline(&browser, &encoder, &fixed_job, &Default::default())
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_policy_end_to_end() {
        let browser = FakeBrowser::failing_samples([3]);
        let encoder = FakeEncoder::default();
        let config = PipelineConfig {
            sampling: SamplingPolicy::Concurrent,
            ..Default::default()
        };

        let result = run_capture_pipeline(&browser, &encoder, &job("out.mp4"), &config)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.frames_staged, 4);
        assert_eq!(result.frames_total, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_continues_past_fatal_job_failure() {
        let encoder = FakeEncoder::default();
        let jobs = vec![job("a.mp4"), job("b.mp4")];

        let unreachable = FakeBrowser::unreachable();
        let outcomes = run_batch(&unreachable, &encoder, &jobs, &Default::default()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_err()));

        let reachable = FakeBrowser::new();
        let outcomes = run_batch(&reachable, &encoder, &jobs, &Default::default()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.as_ref().unwrap().success));
    }
}
