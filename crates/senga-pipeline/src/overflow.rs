//! Bounded selection overflow under the line art.
//!
//! A flood-filled selection stops exactly at the strokes, which leaves a
//! visible halo once the art is colored. This pass pushes the selection
//! under the strokes: starting from stroke-border pixels adjacent to the
//! selection it climbs the distance field toward the stroke ridge, at
//! most `max_grow` steps deep. Requiring strictly increasing distance
//! pins the growth to the selection's own bank: the field peaks at the
//! ridge and descends toward the far bank, so the far side is never
//! reached.

use std::collections::VecDeque;

use image::GrayImage;

use crate::types::{DistanceMap, Pixel, in_bounds, mask_at};

const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, -1),
    (0, 1),
];

/// Grow `seed_mask` under the strokes described by `distmap`, at most
/// `max_grow` pixels deep. Returns the grown selection mask.
///
/// `distmap` must be the distance map published with the closed mask the
/// selection was filled against; `seed_mask` holds 1 for selected
/// background, 0 elsewhere.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::missing_panics_doc)]
pub fn overflow(distmap: &DistanceMap, seed_mask: &GrayImage, max_grow: u32) -> GrayImage {
    let (width, height) = (seed_mask.width() as i32, seed_mask.height() as i32);
    let mut grown = seed_mask.clone();
    let dist = |x: i32, y: i32| distmap.get_pixel(x as u32, y as u32).0[0];

    let mut queue: VecDeque<(Pixel, u32)> = VecDeque::new();
    for y in 0..height {
        for x in 0..width {
            if (dist(x, y) - 1.0).abs() > f32::EPSILON || mask_at(&grown, x, y) != 0 {
                continue;
            }
            let selected_neighbor = NEIGHBORS_8.iter().any(|&(dx, dy)| {
                in_bounds(&grown, x + dx, y + dy) && mask_at(&grown, x + dx, y + dy) != 0
            });
            if selected_neighbor {
                queue.push_back((Pixel::new(x, y), 1));
            }
        }
    }

    while let Some((p, level)) = queue.pop_front() {
        if mask_at(&grown, p.x, p.y) != 0 {
            continue;
        }
        grown.put_pixel(p.x as u32, p.y as u32, image::Luma([1]));
        if level >= max_grow {
            // Deep enough: do not overflood under the line art.
            continue;
        }
        for (dx, dy) in NEIGHBORS_8 {
            let (nx, ny) = (p.x + dx, p.y + dy);
            if in_bounds(&grown, nx, ny)
                && mask_at(&grown, nx, ny) == 0
                && dist(nx, ny) > dist(p.x, p.y)
            {
                queue.push_back((Pixel::new(nx, ny), level + 1));
            }
        }
    }

    grown
}
