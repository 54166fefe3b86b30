//! Spline candidate search and discrete Hermite rasterization.
//!
//! Every unordered pair of keypoints within the spline length limit is
//! scored by how well their normals face each other across the gap; the
//! surviving candidates are processed best-first. An accepted candidate
//! is rasterized as a cubic Hermite curve whose end tangents follow the
//! keypoint normals.

use image::GrayImage;

use crate::cancel::CancelToken;
use crate::curvature::PixelGeometry;
use crate::types::{Cancelled, Pixel, mask_at};

/// A scored pair of keypoints proposed for a spline closure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineCandidate {
    /// First keypoint.
    pub p1: Pixel,
    /// Second keypoint.
    pub p2: Pixel,
    /// Product of the distance, facing and angle qualities; positive.
    pub quality: f32,
}

/// Score every keypoint pair within `max_len` pixels and return the
/// positive-quality candidates ordered by descending quality (ties keep
/// their insertion order).
///
/// The quality is the product of three terms: closeness
/// `1 - d / max_len`, facing `((n1 - n2) . (p2 - p1)) / d`, and normal
/// opposition `n1 . (-n2) - cos(max_angle)`, each clamped at zero.
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is cancelled during the pair scan.
#[allow(clippy::cast_precision_loss)]
pub fn find_candidates(
    keypoints: &[Pixel],
    geometry: &PixelGeometry,
    max_len: u32,
    max_angle_deg: f32,
    cancel: &CancelToken,
) -> Result<Vec<SplineCandidate>, Cancelled> {
    let cos_min = (std::f32::consts::PI * (max_angle_deg / 180.0)).cos();
    let max_len = max_len as f32;
    let mut candidates = Vec::new();

    for (i, &p1) in keypoints.iter().enumerate() {
        cancel.checkpoint()?;
        for &p2 in &keypoints[i + 1..] {
            let distance = p1.distance(p2);
            if distance > max_len {
                continue;
            }

            let [n1x, n1y] = geometry.normal(p1);
            let [n2x, n2y] = geometry.normal(p2);
            let (vx, vy) = ((p2.x - p1.x) as f32, (p2.y - p1.y) as f32);

            let cos_n = n1x.mul_add(-n2x, n1y * -n2y);
            let quality_a = (1.0 - distance / max_len).max(0.0);
            let quality_b = ((n1x.mul_add(vx, n1y * vy) - n2x.mul_add(vx, n2y * vy))
                / distance)
                .max(0.0);
            let quality_c = (cos_n - cos_min).max(0.0);
            let quality = quality_a * quality_b * quality_c;
            if quality > 0.0 {
                candidates.push(SplineCandidate { p1, p2, quality });
            }
        }
    }

    // Stable sort: equal qualities keep pair-scan order.
    candidates.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(candidates)
}

/// Rasterize a cubic Hermite spline from `p0` to `p1` with end tangents
/// `t0` and `t1` into a deduplicated pixel sequence.
///
/// The parameter step adapts so consecutive samples stay within roughly
/// 0.75 pixel in the dominant axis; the terminal endpoint is appended if
/// sampling did not land on it exactly.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::similar_names)]
pub fn discrete_spline(p0: Pixel, t0: [f64; 2], p1: Pixel, t1: [f64; 2]) -> Vec<Pixel> {
    let (p0x, p0y) = (f64::from(p0.x), f64::from(p0.y));
    let (p1x, p1y) = (f64::from(p1.x), f64::from(p1.y));

    let a0 = 2.0 * p0x - 2.0 * p1x + t0[0] - t1[0];
    let b0 = -3.0 * p0x + 3.0 * p1x - 2.0 * t0[0] + t1[0];
    let c0 = t0[0];
    let d0 = p0x;
    let a1 = 2.0 * p0y - 2.0 * p1y + t0[1] - t1[1];
    let b1 = -3.0 * p0y + 3.0 * p1y - 2.0 * t0[1] + t1[1];
    let c1 = t0[1];
    let d1 = p0y;

    let dt_min = 1.0 / (p0x - p1x).abs().max((p0y - p1y).abs());

    let mut points = vec![Pixel::new(d0.round() as i32, d1.round() as i32)];
    let mut t = 0.0f64;
    while t <= 1.0 {
        let t2 = t * t;
        let t3 = t * t2;
        let p = Pixel::new(
            (a0 * t3 + b0 * t2 + c0 * t + d0).round() as i32,
            (a1 * t3 + b1 * t2 + c1 * t + d1).round() as i32,
        );
        if points.last() != Some(&p) {
            points.push(p);
        }
        let dx = (3.0 * a0 * t2 + 2.0 * b0 * t + c0).abs() + 1e-8;
        let dy = (3.0 * a1 * t2 + 2.0 * b1 * t + c1).abs() + 1e-8;
        t += dt_min.min(0.75 / dx.max(dy));
    }
    if points.last() != Some(&p1) {
        points.push(p1);
    }
    points
}

/// Number of stroke/background transitions along a pixel sequence,
/// sampled against `mask` (out-of-image samples count as background).
#[must_use]
pub fn count_transitions(pixels: &[Pixel], mask: &GrayImage) -> usize {
    let mut result = 0;
    let mut previous = None;
    for p in pixels {
        let value = mask_at(mask, p.x, p.y) != 0;
        if let Some(prev) = previous
            && prev != value
        {
            result += 1;
        }
        previous = Some(value);
    }
    result
}
