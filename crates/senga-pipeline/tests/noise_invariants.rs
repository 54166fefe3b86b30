//! Whole-pipeline invariants on dense pseudo-random sketches.

#![allow(clippy::unwrap_used)]

use std::hash::Hasher;

use image::GrayImage;
use senga_pipeline::{CancelToken, ClosureParams, SourceImage, close};
use siphasher::sip::SipHasher13;

/// Deterministic speckle sketch: dark strokes on white.
fn noise_source(seed: u64, size: u32, density_percent: u64) -> SourceImage {
    let luma = GrayImage::from_fn(size, size, |x, y| {
        let mut hasher = SipHasher13::new_with_keys(seed, 0x5eed);
        hasher.write_u32(x);
        hasher.write_u32(y);
        let dark = hasher.finish() % 100 < density_percent;
        image::Luma([if dark { 0 } else { 255 }])
    });
    SourceImage::new(luma)
}

fn binarized_strokes(source: &SourceImage) -> GrayImage {
    let mut mask = senga_pipeline::binarize::binarize(source, true, 0.92, &CancelToken::new())
        .unwrap();
    senga_pipeline::denoise::denoise(&mut mask, 5, &CancelToken::new()).unwrap();
    mask
}

#[test]
fn closed_mask_is_binary_and_a_superset_of_the_strokes() {
    let source = noise_source(77, 48, 50);
    let output = close(&source, &ClosureParams::default(), &CancelToken::new()).unwrap();
    let strokes = binarized_strokes(&source);

    for (x, y, p) in output.closed.enumerate_pixels() {
        assert!(p.0[0] <= 1, "non-binary byte {} at ({x},{y})", p.0[0]);
        if strokes.get_pixel(x, y).0[0] != 0 {
            assert_eq!(p.0[0], 1, "stroke lost at ({x},{y})");
        }
    }
}

#[test]
fn distance_map_orientation_holds_on_noise() {
    let source = noise_source(78, 48, 50);
    let output = close(&source, &ClosureParams::default(), &CancelToken::new()).unwrap();

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
fn identical_runs_are_byte_identical() {
    let source = noise_source(79, 48, 50);
    let params = ClosureParams::default();
    let a = close(&source, &params, &CancelToken::new()).unwrap();
    let b = close(&source, &params, &CancelToken::new()).unwrap();
    assert_eq!(a.closed.as_raw(), b.closed.as_raw());
    assert_eq!(a.distmap.as_raw(), b.distmap.as_raw());
    assert_eq!(a.metrics, b.metrics);
}

#[test]
fn closure_work_is_reported_in_the_metrics() {
    let source = noise_source(80, 48, 50);
    let output = close(&source, &ClosureParams::default(), &CancelToken::new()).unwrap();
    assert!(output.metrics.stroke_pixels > 0);
    assert!(output.metrics.edgel_count > 0);
    assert!(output.metrics.keypoint_count > 0, "dense speckle has stroke tips");
}
