//! The staged line-art closure pipeline.
//!
//! Binarize the sketch, drop speckle, estimate border normals and
//! curvature, pick end-point keypoints, bridge them with admissible
//! spline and segment closures, fill tolerated micro-regions, and emit
//! the closed mask together with its distance transform.
//!
//! The closure stages implement the first step of "A Fast and Efficient
//! Semi-guided Algorithm for Flat Coloring Line-arts" (Fourey,
//! Tschumperlé, Revoy: <https://hal.archives-ouvertes.fr/hal-01891876>).

use std::collections::HashMap;

use crate::admissibility::ClosureCheck;
use crate::binarize::binarize;
use crate::cancel::CancelToken;
use crate::closure::{draw_segments, draw_splines, fill_micro_regions};
use crate::curvature::{PixelGeometry, estimate_stroke_radii};
use crate::denoise::denoise;
use crate::diagnostics::ClosureMetrics;
use crate::distance::stroke_distance_map;
use crate::keypoints;
use crate::spline::find_candidates;
use crate::types::{Cancelled, ClosureParams, LineArtOutput, Pixel, SourceImage};

/// Smallest 8-connected stroke component kept by denoising.
const MINIMAL_LINEART_AREA: usize = 5;
/// Half-width, in edgels, of the border normal smoothing kernel.
const NORMAL_ESTIMATE_MASK_SIZE: usize = 5;
/// How aggressively curvature extrema count as stroke end points.
const END_POINT_RATE: f32 = 0.85;
/// Largest angle between facing end-point normals for a spline.
const SPLINE_MAX_ANGLE_DEG: f32 = 90.0;
/// How many closures may attach to one keypoint.
const END_POINT_CONNECTIVITY: u32 = 2;
/// Scale of the spline end tangents relative to the endpoint distance.
const SPLINE_ROUNDNESS: f64 = 1.0;
/// Smallest trapped background region users notice.
const CREATED_REGIONS_SIGNIFICANT_AREA: i64 = 4;
/// Smallest trapped background region allowed to be created.
const CREATED_REGIONS_MINIMUM_AREA: i64 = 100;

/// Run the closure pipeline over one input snapshot.
///
/// Returns the closed 0/1 stroke mask (a pointwise superset of the
/// binarized input), its Euclidean distance map, and the run metrics.
/// The pipeline is deterministic: the same snapshot and parameters
/// produce byte-identical outputs.
///
/// # Errors
///
/// Returns [`Cancelled`], the only failure mode, once the token is
/// observed cancelled at a suspension point; no partial result escapes.
pub fn close(
    source: &SourceImage,
    params: &ClosureParams,
    cancel: &CancelToken,
) -> Result<LineArtOutput, Cancelled> {
    let mut metrics = ClosureMetrics::default();

    let mut strokes = binarize(source, params.select_transparent, params.threshold, cancel)?;
    metrics.denoised_pixels = denoise(&mut strokes, MINIMAL_LINEART_AREA, cancel)?;
    metrics.stroke_pixels = strokes.pixels().filter(|p| p.0[0] != 0).count() as u64;

    let mut closed = strokes.clone();

    if params.spline_max_len > 0 || params.segment_max_len > 0 {
        let mut geometry = PixelGeometry::compute(&strokes, NORMAL_ESTIMATE_MASK_SIZE, cancel)?;
        metrics.edgel_count = geometry.edgel_count();

        let radii = estimate_stroke_radii(&strokes, cancel)?;
        geometry.thin(&radii, END_POINT_RATE, cancel)?;

        let keypoints = keypoints::extract(&mut geometry, cancel)?;
        metrics.keypoint_count = keypoints.len();

        let mut visited: HashMap<Pixel, u32> = HashMap::new();
        let mut check = ClosureCheck::new(
            strokes.width(),
            strokes.height(),
            CREATED_REGIONS_SIGNIFICANT_AREA,
            CREATED_REGIONS_MINIMUM_AREA - 1,
        );
        let mut fill_pixels: Vec<Pixel> = Vec::new();

        if params.spline_max_len > 0 {
            let candidates = find_candidates(
                &keypoints,
                &geometry,
                params.spline_max_len,
                SPLINE_MAX_ANGLE_DEG,
                cancel,
            )?;
            metrics.spline_candidates = candidates.len();
            metrics.splines_drawn = draw_splines(
                &mut closed,
                &strokes,
                &geometry,
                candidates,
                SPLINE_ROUNDNESS,
                END_POINT_CONNECTIVITY,
                &mut visited,
                &mut check,
                &mut fill_pixels,
                cancel,
            )?;
        }

        if params.segment_max_len > 0 {
            metrics.segments_drawn = draw_segments(
                &mut closed,
                &geometry,
                &keypoints,
                params.segment_max_len,
                END_POINT_CONNECTIVITY,
                &mut visited,
                &mut check,
                &mut fill_pixels,
                cancel,
            )?;
        }

        metrics.micro_fill_pixels = fill_micro_regions(&mut closed, &fill_pixels, cancel)?;
    }

    cancel.checkpoint()?;

    // Collapse closure values to the published 0/1 form before the
    // distance transform (both are nonzero, so the map is unaffected).
    for p in closed.pixels_mut() {
        p.0[0] = u8::from(p.0[0] != 0);
    }
    let distmap = stroke_distance_map(&closed);

    Ok(LineArtOutput {
        closed,
        distmap,
        metrics,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::GrayImage;

    fn source_from(rows: &[&str]) -> SourceImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        // Dark strokes on a white background.
        let luma = GrayImage::from_fn(width, height, |x, y| {
            let byte = rows[y as usize].as_bytes()[x as usize];
            image::Luma([if byte == b'#' { 0 } else { 255 }])
        });
        SourceImage::new(luma)
    }

    fn gap_source() -> SourceImage {
        source_from(&[
            "....................................",
            "....................................",
            ".##############.....##############..",
            "....................................",
            "....................................",
        ])
    }

    #[test]
    fn disabled_closure_returns_the_denoised_binarization() {
        let params = ClosureParams {
            spline_max_len: 0,
            segment_max_len: 0,
            ..ClosureParams::default()
        };
        let output = close(&gap_source(), &params, &CancelToken::new()).unwrap();
        let strokes: usize = output.closed.pixels().filter(|p| p.0[0] == 1).count();
        assert_eq!(strokes, 28, "both bars survive untouched");
        assert_eq!(output.metrics.splines_drawn, 0);
        assert_eq!(output.metrics.segments_drawn, 0);
        assert_eq!(output.metrics.keypoint_count, 0);
    }

    #[test]
    fn spline_closure_bridges_the_gap() {
        let params = ClosureParams {
            spline_max_len: 100,
            segment_max_len: 0,
            ..ClosureParams::default()
        };
        let output = close(&gap_source(), &params, &CancelToken::new()).unwrap();
        assert_eq!(output.metrics.splines_drawn, 1);
        for x in 15..=19 {
            assert_eq!(output.closed.get_pixel(x, 2).0[0], 1, "gap open at x={x}");
        }
    }

    #[test]
    fn segment_closure_bridges_the_gap() {
        let params = ClosureParams {
            spline_max_len: 0,
            segment_max_len: 100,
            ..ClosureParams::default()
        };
        let output = close(&gap_source(), &params, &CancelToken::new()).unwrap();
        assert!(output.metrics.segments_drawn >= 1);
        for x in 15..=19 {
            assert_eq!(output.closed.get_pixel(x, 2).0[0], 1, "gap open at x={x}");
        }
    }

    #[test]
    fn closed_mask_is_a_superset_of_the_input() {
        let output =
            close(&gap_source(), &ClosureParams::default(), &CancelToken::new()).unwrap();
        let binarized = {
            let mut mask = binarize(&gap_source(), true, 0.92, &CancelToken::new()).unwrap();
            denoise(&mut mask, MINIMAL_LINEART_AREA, &CancelToken::new()).unwrap();
            mask
        };
        for (x, y, p) in binarized.enumerate_pixels() {
            if p.0[0] != 0 {
                assert_eq!(output.closed.get_pixel(x, y).0[0], 1, "lost stroke at ({x},{y})");
            }
        }
    }

    #[test]
    fn published_mask_is_strictly_binary() {
        let output =
            close(&gap_source(), &ClosureParams::default(), &CancelToken::new()).unwrap();
        assert!(output.closed.pixels().all(|p| p.0[0] <= 1));
    }

    #[test]
    fn distance_map_is_positive_exactly_on_strokes() {
        let output =
            close(&gap_source(), &ClosureParams::default(), &CancelToken::new()).unwrap();
        for (x, y, p) in output.closed.enumerate_pixels() {
            let d = output.distmap.get_pixel(x, y).0[0];
            if p.0[0] == 1 {
                assert!(d >= 1.0, "stroke at ({x},{y}) has distance {d}");
            } else {
                assert!(d.abs() < f32::EPSILON, "background at ({x},{y}) has distance {d}");
            }
        }
    }

    #[test]
    fn runs_are_deterministic() {
        let params = ClosureParams::default();
        let a = close(&gap_source(), &params, &CancelToken::new()).unwrap();
        let b = close(&gap_source(), &params, &CancelToken::new()).unwrap();
        assert_eq!(a.closed.as_raw(), b.closed.as_raw());
        assert_eq!(a.distmap.as_raw(), b.distmap.as_raw());
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn speckle_is_denoised_away() {
        let output = close(
            &source_from(&[
                "..........",
                ".##.......",
                "..........",
                "......#...",
                "..........",
            ]),
            &ClosureParams::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(output.metrics.denoised_pixels, 3);
        assert!(output.closed.pixels().all(|p| p.0[0] == 0));
        assert!(output.distmap.pixels().all(|p| p.0[0].abs() < f32::EPSILON));
    }

    #[test]
    fn degenerate_one_column_input_passes_through() {
        let output = close(
            &source_from(&[".", "#", "#", "#", "#", "#", "."]),
            &ClosureParams::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(output.metrics.edgel_count, 0);
        assert_eq!(output.metrics.keypoint_count, 0);
        let strokes: usize = output.closed.pixels().filter(|p| p.0[0] == 1).count();
        assert_eq!(strokes, 5);
    }

    #[test]
    fn pre_cancelled_token_yields_no_output() {
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            close(&gap_source(), &ClosureParams::default(), &token).map(|_| ()),
            Err(Cancelled)
        );
    }
}
