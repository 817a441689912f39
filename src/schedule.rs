//! Frame scheduling: pure arithmetic, no wall-clock dependency.
//!
//! Timing enforcement against real time belongs to the sampler; keeping the
//! schedule pure makes the policy unit-testable without real delays.

use serde::{Deserialize, Serialize};

/// One planned sample: its ordering key and ideal capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSample {
    /// Zero-based schedule index, the sole ordering key for all later stages
    pub index: usize,
    /// Nominal offset from job start, in milliseconds
    pub offset_ms: u64,
}

/// Ordered sequence of scheduled samples for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSchedule {
    samples: Vec<ScheduledSample>,
}

impl FrameSchedule {
    pub fn samples(&self) -> &[ScheduledSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Compute the schedule for a capture window.
///
/// N = ceil(duration_ms / 1000) × rate_fps, with sample i at
/// round(i × 1000 / rate_fps) ms from job start. Degenerate inputs
/// (zero duration or rate) yield an empty schedule, not an error; the
/// caller decides whether that fails the job.
pub fn schedule(duration_ms: u64, rate_fps: u32) -> FrameSchedule {
    if duration_ms == 0 || rate_fps == 0 {
        return FrameSchedule {
            samples: Vec::new(),
        };
    }

    let count = duration_ms.div_ceil(1000) as usize * rate_fps as usize;
    let samples = (0..count)
        .map(|index| ScheduledSample {
            index,
            offset_ms: ((index as f64) * 1000.0 / rate_fps as f64).round() as u64,
        })
        .collect();

    FrameSchedule { samples }
}
