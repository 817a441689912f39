//! Browser collaborator traits and capture-region resolution.

use crate::error::PipelineError;
use crate::job::Rect;
use serde::{Deserialize, Serialize};

/// Content bounding box reported by a live surface, in fractional CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A live, navigable rendering surface (browser page/tab).
///
/// The capture primitive is not guaranteed reentrant: the pipeline never
/// issues two `capture_image` calls on one surface concurrently.
pub trait Surface: Send + Sync {
    /// Content bounding box of the rendered document.
    fn bounding_box(&self) -> Result<BoundingBox, String>;

    /// Capture one still image of the given rectangle, as encoded PNG bytes.
    fn capture_image(&self, region: Rect) -> Result<Vec<u8>, String>;

    /// Close the underlying browser session.
    fn close(&self) -> Result<(), String>;
}

impl<S: Surface + ?Sized> Surface for std::sync::Arc<S> {
    fn bounding_box(&self) -> Result<BoundingBox, String> {
        (**self).bounding_box()
    }
    fn capture_image(&self, region: Rect) -> Result<Vec<u8>, String> {
        (**self).capture_image(region)
    }
    fn close(&self) -> Result<(), String> {
        (**self).close()
    }
}

/// Opens rendering surfaces for target URLs.
pub trait Browser: Send + Sync {
    type Surface: Surface;

    /// Navigate to `url` and wait for page readiness, up to `timeout_ms`.
    fn open_target(&self, url: &str, timeout_ms: u64) -> Result<Self::Surface, String>;
}

/// Resolve the capture rectangle from the surface's content bounding box,
/// rounded to integer device pixels.
///
/// Computed once per job, before scheduling begins, and reused unchanged for
/// every sample: surfaces may reflow between samples, and the crop window
/// must stay stable. An unavailable surface is a fatal job error.
pub fn resolve_region<S: Surface + ?Sized>(surface: &S) -> Result<Rect, PipelineError> {
    let bounds = surface
        .bounding_box()
        .map_err(PipelineError::RegionUnavailable)?;
    Ok(Rect {
        x: bounds.x.round() as i32,
        y: bounds.y.round() as i32,
        width: bounds.width.round().max(0.0) as u32,
        height: bounds.height.round().max(0.0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSurface(BoundingBox);

    impl Surface for FixedSurface {
        fn bounding_box(&self) -> Result<BoundingBox, String> {
            Ok(self.0)
        }
        fn capture_image(&self, _region: Rect) -> Result<Vec<u8>, String> {
            Ok(Vec::new())
        }
        fn close(&self) -> Result<(), String> {
            Ok(())
        }
    }

    struct DeadSurface;

    impl Surface for DeadSurface {
        fn bounding_box(&self) -> Result<BoundingBox, String> {
            Err("detached".to_string())
        }
        fn capture_image(&self, _region: Rect) -> Result<Vec<u8>, String> {
            Err("detached".to_string())
        }
        fn close(&self) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn test_resolve_region_rounds_to_device_pixels() {
        let surface = FixedSurface(BoundingBox {
            x: 0.4,
            y: -1.5,
            width: 1279.6,
            height: 719.2,
        });
        let region = resolve_region(&surface).unwrap();
        assert_eq!(
            region,
            Rect {
                x: 0,
                y: -1, // f64::round rounds half away from zero
                width: 1280,
                height: 719,
            }
        );
    }

    #[test]
    fn test_resolve_region_clamps_negative_extent() {
        let surface = FixedSurface(BoundingBox {
            x: 0.0,
            y: 0.0,
            width: -3.0,
            height: 10.0,
        });
        let region = resolve_region(&surface).unwrap();
        assert_eq!(region.width, 0);
        assert_eq!(region.height, 10);
    }

    #[test]
    fn test_resolve_region_surface_failure_is_fatal() {
        let err = resolve_region(&DeadSurface).unwrap_err();
        assert!(matches!(err, PipelineError::RegionUnavailable(_)));
    }
}
