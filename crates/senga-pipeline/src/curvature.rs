//! Per-pixel normal and curvature fields projected from the edgel graph.
//!
//! The edgel chains carry smoothed normals and signed curvature; this
//! module folds them onto the pixel grid. Each pixel receives the
//! maximum curvature of its incident edgels (clamped at zero) and a
//! normal accumulated from its edgels weighted by squared curvature, so
//! high-curvature borders (stroke tips) dominate the direction. A
//! second, chain-smoothed curvature field feeds the end-point detector.

use image::GrayImage;

use crate::cancel::CancelToken;
use crate::distance::stroke_distance_map;
use crate::edgel::EdgelSet;
use crate::types::{Cancelled, Pixel, mask_at};

/// Per-pixel geometry derived from the borders of a stroke mask.
#[derive(Debug)]
pub struct PixelGeometry {
    width: u32,
    height: u32,
    pub(crate) normals: Vec<[f32; 2]>,
    /// Raw curvature; after [`thin`](Self::thin) this becomes the 1.0/0.0
    /// end-point mask consumed by keypoint extraction.
    pub(crate) curvatures: Vec<f32>,
    pub(crate) smoothed: Vec<f32>,
    edgel_count: usize,
}

impl PixelGeometry {
    /// Build the edgel graph of `mask`, smooth its normals over
    /// `normal_mask_size` chain neighbors, and project normals and
    /// curvatures onto the pixel grid.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the token is cancelled in any scan.
    pub fn compute(
        mask: &GrayImage,
        normal_mask_size: usize,
        cancel: &CancelToken,
    ) -> Result<Self, Cancelled> {
        let (width, height) = mask.dimensions();
        let len = (width as usize) * (height as usize);
        let mut geometry = Self {
            width,
            height,
            normals: vec![[0.0, 0.0]; len],
            curvatures: vec![0.0; len],
            smoothed: vec![0.0; len],
            edgel_count: 0,
        };

        let mut set = EdgelSet::build(mask, cancel)?;
        cancel.checkpoint()?;
        set.smooth_normals(normal_mask_size, cancel)?;
        set.compute_curvature(cancel)?;
        geometry.edgel_count = set.len();

        // Accumulate curvature-weighted normals and per-pixel maxima.
        for e in set.edgels() {
            cancel.checkpoint()?;
            let curvature = e.curvature.max(0.0);
            let weight = (curvature * curvature).max(1e-8);
            let idx = geometry.index(e.x, e.y);
            geometry.normals[idx][0] += weight * e.x_normal;
            geometry.normals[idx][1] += weight * e.y_normal;
            geometry.curvatures[idx] = geometry.curvatures[idx].max(curvature);
        }

        // Renormalize through atan2 so identical inputs renormalize
        // identically across platforms.
        for y in 0..height {
            cancel.checkpoint()?;
            for x in 0..width {
                let idx = (x as usize) + (y as usize) * (width as usize);
                let angle = geometry.normals[idx][1].atan2(geometry.normals[idx][0]);
                geometry.normals[idx] = [angle.cos(), angle.sin()];
            }
        }

        // Smooth curvatures along each chain, then take the maximum on
        // each pixel.
        let smoothed_per_edgel = chain_smoothed_curvatures(&set, cancel)?;
        for (e, smoothed) in set.edgels().iter().zip(&smoothed_per_edgel) {
            let idx = geometry.index(e.x, e.y);
            if geometry.smoothed[idx] < *smoothed {
                geometry.smoothed[idx] = *smoothed;
            }
        }

        Ok(geometry)
    }

    /// Collapse the raw curvature field to a 1.0/0.0 end-point mask.
    ///
    /// A pixel stays high iff its smoothed curvature reaches
    /// `(1 - end_point_rate)` scaled down by the local stroke radius, or
    /// its raw curvature reaches the clamped threshold
    /// `max(0.25, 1 - end_point_rate)`. Interior stroke pixels carry a
    /// zero radius from [`estimate_stroke_radii`]; the `max(1.0, r)`
    /// clamp keeps their denominator at 1 (they carry no curvature
    /// either, so nothing changes for them).
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the token is cancelled mid-scan.
    pub fn thin(
        &mut self,
        radii: &[f32],
        end_point_rate: f32,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled> {
        let threshold = 1.0 - end_point_rate;
        let clamped_threshold = threshold.max(0.25);
        for y in 0..self.height as usize {
            cancel.checkpoint()?;
            for x in 0..self.width as usize {
                let idx = x + y * self.width as usize;
                let high = self.smoothed[idx] >= threshold / radii[idx].max(1.0)
                    || self.curvatures[idx] >= clamped_threshold;
                self.curvatures[idx] = if high { 1.0 } else { 0.0 };
            }
        }
        Ok(())
    }

    /// Unit normal at a pixel; zero vector out of image.
    #[must_use]
    pub fn normal(&self, p: Pixel) -> [f32; 2] {
        if self.contains(p) {
            self.normals[self.index(p.x, p.y)]
        } else {
            [0.0, 0.0]
        }
    }

    /// Raw (or, after thinning, 1.0/0.0) curvature at a pixel.
    #[must_use]
    pub fn curvature(&self, p: Pixel) -> f32 {
        if self.contains(p) {
            self.curvatures[self.index(p.x, p.y)]
        } else {
            0.0
        }
    }

    /// Chain-smoothed curvature at a pixel.
    #[must_use]
    pub fn smoothed_curvature(&self, p: Pixel) -> f32 {
        if self.contains(p) {
            self.smoothed[self.index(p.x, p.y)]
        } else {
            0.0
        }
    }

    /// Number of edgels the mask produced.
    #[must_use]
    pub const fn edgel_count(&self) -> usize {
        self.edgel_count
    }

    /// Field width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Field height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[allow(clippy::cast_possible_wrap)]
    pub(crate) const fn contains(&self, p: Pixel) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width as i32 && p.y < self.height as i32
    }

    #[allow(clippy::cast_sign_loss)]
    pub(crate) const fn index(&self, x: i32, y: i32) -> usize {
        (x as usize) + (y as usize) * (self.width as usize)
    }
}

/// Nine-tap Gaussian smoothing of edgel curvatures along each chain,
/// five steps out on each side, early-terminating on short chains.
#[allow(clippy::cast_precision_loss)]
fn chain_smoothed_curvatures(
    set: &EdgelSet,
    cancel: &CancelToken,
) -> Result<Vec<f32>, Cancelled> {
    let mut weights = [1.0f32; 9];
    for (i, w) in weights.iter_mut().enumerate().skip(1) {
        *w = (-((i * i) as f32) / 30.0).exp();
    }

    let edgels = set.edgels();
    let mut smoothed = vec![0.0f32; edgels.len()];
    for (i, e) in edgels.iter().enumerate() {
        cancel.checkpoint()?;

        let mut before = e.previous;
        let mut after = e.next;
        let mut value = e.curvature;
        let mut weights_sum = weights[0];
        let mut remaining = 5;
        let mut k = 1;
        while remaining > 0 && after != before {
            value += weights[k] * edgels[before].curvature;
            value += weights[k] * edgels[after].curvature;
            before = edgels[before].previous;
            after = edgels[after].next;
            weights_sum += 2.0 * weights[k];
            remaining -= 1;
            k += 1;
        }
        smoothed[i] = value / weights_sum;
    }
    Ok(smoothed)
}

/// Per-pixel stroke radius estimate.
///
/// Only stroke pixels lying directly on a border (distance exactly 1.0)
/// receive a value: from each, walk uphill in the stroke distance
/// transform through the steepest 8-neighbor until no neighbor is
/// deeper, and record the depth reached. All other pixels stay 0.
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is cancelled mid-scan.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn estimate_stroke_radii(
    mask: &GrayImage,
    cancel: &CancelToken,
) -> Result<Vec<f32>, Cancelled> {
    let (width, height) = (mask.width() as i32, mask.height() as i32);
    let dist = stroke_distance_map(mask);
    let at = |x: i32, y: i32| dist.get_pixel(x as u32, y as u32).0[0];

    let mut radii = vec![0.0f32; (width as usize) * (height as usize)];
    for y in 0..height {
        cancel.checkpoint()?;
        for x in 0..width {
            if mask_at(mask, x, y) == 0 || (at(x, y) - 1.0).abs() > f32::EPSILON {
                continue;
            }

            let (mut dx, mut dy) = (x, y);
            let mut d = 1.0f32;
            loop {
                let px = dx - 1;
                let py = dy - 1;
                let nx = dx + 1;
                let ny = dy + 1;
                if px >= 0 {
                    if at(px, dy) > d {
                        d = at(px, dy);
                        dx = px;
                        continue;
                    }
                    if py >= 0 && at(px, py) > d {
                        d = at(px, py);
                        dx = px;
                        dy = py;
                        continue;
                    }
                    if ny < height && at(px, ny) > d {
                        d = at(px, ny);
                        dx = px;
                        dy = ny;
                        continue;
                    }
                }
                if nx < width {
                    if at(nx, dy) > d {
                        d = at(nx, dy);
                        dx = nx;
                        continue;
                    }
                    if py >= 0 && at(nx, py) > d {
                        d = at(nx, py);
                        dx = nx;
                        dy = py;
                        continue;
                    }
                    if ny < height && at(nx, ny) > d {
                        d = at(nx, ny);
                        dx = nx;
                        dy = ny;
                        continue;
                    }
                }
                if py > 0 && at(dx, py) > d {
                    d = at(dx, py);
                    dy = py;
                    continue;
                }
                if ny < height && at(dx, ny) > d {
                    d = at(dx, ny);
                    dy = ny;
                    continue;
                }
                break;
            }
            radii[(x + y * width) as usize] = d;
        }
    }
    Ok(radii)
}
