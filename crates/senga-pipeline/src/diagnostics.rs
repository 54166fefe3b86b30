//! Per-run metrics describing what the closure pipeline did.
//!
//! Filled in by [`crate::close`] as the stages run and carried in the
//! output so callers can log or display how much work a recompute was.

use serde::{Deserialize, Serialize};

/// Stage-by-stage counters of one closure pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureMetrics {
    /// Stroke pixels in the binarized input after denoising.
    pub stroke_pixels: u64,
    /// Pixels erased by the denoise stage.
    pub denoised_pixels: u64,
    /// Oriented border elements of the denoised mask.
    pub edgel_count: usize,
    /// Curvature-extremum keypoints detected.
    pub keypoint_count: usize,
    /// Positive-quality spline candidates considered.
    pub spline_candidates: usize,
    /// Spline closures drawn.
    pub splines_drawn: usize,
    /// Straight segment closures drawn.
    pub segments_drawn: usize,
    /// Pixels filled inside tolerated micro-regions.
    pub micro_fill_pixels: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_zero() {
        let metrics = ClosureMetrics::default();
        assert_eq!(metrics.stroke_pixels, 0);
        assert_eq!(metrics.splines_drawn, 0);
    }

    #[test]
    fn round_trips_through_serde() {
        let metrics = ClosureMetrics {
            stroke_pixels: 120,
            denoised_pixels: 4,
            edgel_count: 260,
            keypoint_count: 2,
            spline_candidates: 1,
            splines_drawn: 1,
            segments_drawn: 0,
            micro_fill_pixels: 3,
        };
        let json = serde_json::to_string(&metrics).unwrap();
        let back: ClosureMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metrics);
    }
}
