//! Curvature-extremum keypoint extraction.
//!
//! After thinning, the curvature field is a 1.0/0.0 mask of candidate
//! end-point pixels. Each 8-connected component collapses to a single
//! representative: the pixel of maximum chain-smoothed curvature, or,
//! when the component carries no smoothed curvature at all, the first
//! pixel of the component in scan order. The representatives are the
//! keypoints the closure steps connect.

use std::collections::VecDeque;

use crate::cancel::CancelToken;
use crate::curvature::PixelGeometry;
use crate::types::{Cancelled, Pixel};

const NEIGHBORS_8: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, -1),
    (0, 1),
    (1, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
];

/// Collapse every 8-connected high-curvature component of `geometry` to
/// one representative pixel. The curvature field is consumed: all
/// component pixels are zeroed except each representative, which keeps
/// its extremal value.
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is cancelled during the scan or a
/// component flood.
#[allow(clippy::cast_possible_wrap)]
pub fn extract(
    geometry: &mut PixelGeometry,
    cancel: &CancelToken,
) -> Result<Vec<Pixel>, Cancelled> {
    let width = geometry.width() as i32;
    let height = geometry.height() as i32;
    let mut visited = vec![false; (width as usize) * (height as usize)];
    let mut queue: VecDeque<Pixel> = VecDeque::new();
    let mut keypoints = Vec::new();

    for y in 0..height {
        cancel.checkpoint()?;
        for x in 0..width {
            let idx = geometry.index(x, y);
            if geometry.curvatures[idx] <= 0.0 || visited[idx] {
                continue;
            }

            let mut max_smoothed_pixel = Pixel::new(-1, -1);
            let mut max_smoothed = 0.0f32;
            let mut max_raw_pixel = Pixel::new(x, y);
            let mut max_raw = geometry.curvatures[idx];

            queue.push_back(Pixel::new(x, y));
            visited[idx] = true;

            while let Some(p) = queue.pop_front() {
                cancel.checkpoint()?;

                let p_idx = geometry.index(p.x, p.y);
                let smoothed = geometry.smoothed[p_idx];
                let raw = geometry.curvatures[p_idx];
                geometry.curvatures[p_idx] = 0.0;

                for (dx, dy) in NEIGHBORS_8 {
                    let (nx, ny) = (p.x + dx, p.y + dy);
                    if nx < 0 || nx >= width || ny < 0 || ny >= height {
                        continue;
                    }
                    let n_idx = geometry.index(nx, ny);
                    if geometry.curvatures[n_idx] > 0.0 && !visited[n_idx] {
                        visited[n_idx] = true;
                        queue.push_back(Pixel::new(nx, ny));
                    }
                }

                if smoothed > max_smoothed {
                    max_smoothed_pixel = p;
                    max_smoothed = smoothed;
                }
                if raw > max_raw {
                    max_raw_pixel = p;
                    max_raw = raw;
                }
            }

            if max_smoothed > 0.0 {
                let idx = geometry.index(max_smoothed_pixel.x, max_smoothed_pixel.y);
                geometry.curvatures[idx] = max_smoothed;
                keypoints.push(max_smoothed_pixel);
            } else {
                let idx = geometry.index(max_raw_pixel.x, max_raw_pixel.y);
                geometry.curvatures[idx] = max_raw;
                keypoints.push(max_raw_pixel);
            }
        }
    }

    Ok(keypoints)
}
