//! Drawing admissible spline and segment closures into the working mask.
//!
//! Accepted closures are written as value 2 so later stages can still
//! tell synthesized pixels from original strokes; the pipeline collapses
//! the distinction when it publishes the mask.

use std::collections::HashMap;

use image::GrayImage;

use crate::admissibility::ClosureCheck;
use crate::cancel::CancelToken;
use crate::curvature::PixelGeometry;
use crate::spline::{SplineCandidate, count_transitions, discrete_spline};
use crate::types::{Cancelled, Pixel, in_bounds, mask_at};

/// Value drawn into the working mask for a synthesized closure pixel.
const CLOSURE_VALUE: u8 = 2;

/// Process spline candidates best-first and draw each admissible one.
///
/// A candidate is taken only while both endpoints have been used fewer
/// than `connectivity` times. Its Hermite curve (end tangents scaled by
/// the endpoint distance and `roundness`) must cross the stroke border
/// of the *original* binarized mask exactly twice (one exit, one entry)
/// and must pass the region-size admissibility check against the
/// working mask. Returns the number of splines drawn.
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is cancelled between candidates.
#[allow(clippy::too_many_arguments)]
pub fn draw_splines(
    closed: &mut GrayImage,
    strokes: &GrayImage,
    geometry: &PixelGeometry,
    candidates: Vec<SplineCandidate>,
    roundness: f64,
    connectivity: u32,
    visited: &mut HashMap<Pixel, u32>,
    check: &mut ClosureCheck,
    fill_pixels: &mut Vec<Pixel>,
    cancel: &CancelToken,
) -> Result<usize, Cancelled> {
    let mut drawn = 0;
    for candidate in candidates {
        cancel.checkpoint()?;

        let SplineCandidate { p1, p2, .. } = candidate;
        if visited.get(&p1).copied().unwrap_or(0) >= connectivity
            || visited.get(&p2).copied().unwrap_or(0) >= connectivity
        {
            continue;
        }

        let distance = f64::from(p1.distance(p2));
        let scale = distance * roundness;
        let [n1x, n1y] = geometry.normal(p1);
        let [n2x, n2y] = geometry.normal(p2);
        let t1 = [f64::from(n1x) * scale, f64::from(n1y) * scale];
        let t2 = [f64::from(n2x) * scale, f64::from(n2y) * scale];

        let curve = discrete_spline(p1, t1, p2, t2);

        if count_transitions(&curve, strokes) == 2
            && check.allow_closure(closed, &curve, fill_pixels)
        {
            draw(closed, &curve);
            *visited.entry(p1).or_insert(0) += 1;
            *visited.entry(p2).or_insert(0) += 1;
            drawn += 1;
        }
    }
    Ok(drawn)
}

/// Cast a straight ray from each still-connectable keypoint along its
/// normal and draw each admissible hit segment. Returns the number of
/// segments drawn.
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is cancelled between keypoints.
#[allow(clippy::too_many_arguments)]
pub fn draw_segments(
    closed: &mut GrayImage,
    geometry: &PixelGeometry,
    keypoints: &[Pixel],
    max_len: u32,
    connectivity: u32,
    visited: &mut HashMap<Pixel, u32>,
    check: &mut ClosureCheck,
    fill_pixels: &mut Vec<Pixel>,
    cancel: &CancelToken,
) -> Result<usize, Cancelled> {
    let mut drawn = 0;
    for &p in keypoints {
        cancel.checkpoint()?;

        if visited.get(&p).copied().unwrap_or(0) >= connectivity {
            continue;
        }

        let segment = segment_until_hit(closed, p, geometry.normal(p), max_len);
        if !segment.is_empty() && check.allow_closure(closed, &segment, fill_pixels) {
            draw(closed, &segment);
            *visited.entry(p).or_insert(0) += 1;
            drawn += 1;
        }
    }
    Ok(drawn)
}

/// Walk a ray of up to `size` pixels from `start` along `direction`.
///
/// The walk collects pixels until it has left the strokes and re-enters
/// one; the hit pixel itself is not collected. Leaving the image after
/// leaving the strokes also terminates the segment; the image border
/// closes regions the same way a stroke does. A ray that never leaves
/// the strokes, or leaves the image before leaving them, yields nothing.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn segment_until_hit(
    mask: &GrayImage,
    start: Pixel,
    direction: [f32; 2],
    size: u32,
) -> Vec<Pixel> {
    let dir_x = f64::from(direction[0] * size as f32).round();
    let dir_y = f64::from(direction[1] * size as f32).round();
    let t_max = (dir_x.abs() as i64).max(dir_y.abs() as i64);
    if t_max == 0 {
        return Vec::new();
    }

    let mut out = false;
    let mut points = Vec::new();
    for t in 0..=t_max {
        #[allow(clippy::cast_precision_loss)]
        let f = t as f64 / t_max as f64;
        let p = Pixel::new(
            (f64::from(start.x) + dir_x * f).round() as i32,
            (f64::from(start.y) + dir_y * f).round() as i32,
        );
        if in_bounds(mask, p.x, p.y) {
            let value = mask_at(mask, p.x, p.y);
            if out && value != 0 {
                return points;
            }
            out = value == 0;
        } else if out {
            return points;
        } else {
            return Vec::new();
        }
        points.push(p);
    }
    Vec::new()
}

/// Flood-fill each recorded micro-region seed 4-connectedly, marking
/// background cells as stroke. Returns the number of pixels filled.
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is cancelled between seeds.
pub fn fill_micro_regions(
    closed: &mut GrayImage,
    seeds: &[Pixel],
    cancel: &CancelToken,
) -> Result<usize, Cancelled> {
    let mut filled = 0;
    let mut stack: Vec<Pixel> = Vec::new();
    for &seed in seeds {
        cancel.checkpoint()?;
        stack.push(seed);
        while let Some(p) = stack.pop() {
            if !in_bounds(closed, p.x, p.y) || mask_at(closed, p.x, p.y) != 0 {
                continue;
            }
            #[allow(clippy::cast_sign_loss)]
            closed.put_pixel(p.x as u32, p.y as u32, image::Luma([1]));
            filled += 1;
            stack.push(Pixel::new(p.x + 1, p.y));
            stack.push(Pixel::new(p.x - 1, p.y));
            stack.push(Pixel::new(p.x, p.y + 1));
            stack.push(Pixel::new(p.x, p.y - 1));
        }
    }
    Ok(filled)
}

#[allow(clippy::cast_sign_loss)]
fn draw(closed: &mut GrayImage, pixels: &[Pixel]) {
    for p in pixels {
        if in_bounds(closed, p.x, p.y) {
            closed.put_pixel(p.x as u32, p.y as u32, image::Luma([CLOSURE_VALUE]));
        }
    }
}
