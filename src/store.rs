//! On-disk staging of captured frames.
//!
//! Filenames are fixed-width zero-padded so lexical order equals index
//! order, which is what the encoder's pattern feed relies on. The staging
//! directory is job-scoped and never reused across jobs.

use crate::error::PipelineError;
use crate::sampler::CapturedFrame;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Distinguishes staging directories created within the same millisecond.
static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(0);

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXT: &str = "png";
const MIN_PAD_WIDTH: usize = 4;

/// Job-scoped staging area for captured frames.
#[derive(Debug)]
pub struct FrameStore {
    dir: PathBuf,
    pad_width: usize,
}

impl FrameStore {
    /// Create a fresh staging directory for one job.
    ///
    /// The directory name carries the job label, a timestamp, and the
    /// process id so that staging areas are never shared across jobs.
    pub fn create(label: &str, frame_count: usize) -> Result<Self, PipelineError> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S%3f");
        let dir = std::env::temp_dir().join(format!(
            "pagereel_{}_{}_{}_{}",
            sanitize_label(label),
            stamp,
            std::process::id(),
            NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).map_err(|e| {
            PipelineError::Staging(format!("failed to create {}: {}", dir.display(), e))
        })?;
        debug!("staging directory: {}", dir.display());
        Ok(Self {
            dir,
            pad_width: pad_width(frame_count),
        })
    }

    /// Create a store rooted at an existing directory (tests, custom staging).
    pub fn at_dir(dir: impl Into<PathBuf>, frame_count: usize) -> Self {
        Self {
            dir: dir.into(),
            pad_width: pad_width(frame_count),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one captured frame to the staging area.
    ///
    /// Returns the staged path, or `None` for an empty-marker frame. Write
    /// errors are absorbed as a gap at that index rather than failing the
    /// job.
    pub fn stage(&self, frame: &CapturedFrame) -> Option<PathBuf> {
        let bytes = frame.data.as_deref()?;
        let path = self.frame_path(frame.index);
        match fs::write(&path, bytes) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("failed to stage frame {}: {}", frame.index, e);
                None
            }
        }
    }

    /// Stage every captured frame, returning the number staged.
    pub fn stage_all(&self, frames: &[CapturedFrame]) -> usize {
        frames.iter().filter(|f| self.stage(f).is_some()).count()
    }

    /// Rename staged frames to a contiguous index sequence, closing any
    /// gaps left by failed samples. Returns the number of frames after
    /// compaction.
    ///
    /// Renaming walks indices upward, and a frame only ever moves to a
    /// lower index, so no rename can collide with a not-yet-moved frame.
    pub fn compact(&self) -> Result<usize, String> {
        let mut staged: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(|e| format!("failed to read {}: {}", self.dir.display(), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(FRAME_PREFIX))
            })
            .collect();
        staged.sort();

        let mut moved = 0;
        for (next, path) in staged.iter().enumerate() {
            let target = self.frame_path(next);
            if *path != target {
                fs::rename(path, &target)
                    .map_err(|e| format!("failed to compact {}: {}", path.display(), e))?;
                moved += 1;
            }
        }
        if moved > 0 {
            info!("compacted {} frame(s) into a contiguous sequence", moved);
        }
        Ok(staged.len())
    }

    /// Input pattern for the encoder's image-sequence feed, e.g.
    /// `<staging>/frame_%04d.png`.
    pub fn input_pattern(&self) -> PathBuf {
        self.dir
            .join(format!("{}%0{}d.{}", FRAME_PREFIX, self.pad_width, FRAME_EXT))
    }

    /// Best-effort recursive removal of the staging directory. Failure is
    /// logged, never escalated: it must not mask the job outcome.
    pub fn cleanup(&self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("removed staging directory {}", self.dir.display()),
            Err(e) => warn!(
                "could not remove staging directory {}: {}",
                self.dir.display(),
                e
            ),
        }
    }

    fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}{:0width$}.{}",
            FRAME_PREFIX,
            index,
            FRAME_EXT,
            width = self.pad_width
        ))
    }
}

/// Fixed pad width for a frame count: enough digits for the highest index,
/// never fewer than four.
fn pad_width(frame_count: usize) -> usize {
    let digits = frame_count.max(1).to_string().len();
    digits.max(MIN_PAD_WIDTH)
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned
    }
}
