//! Removal of small connected stroke components left by binarization.
//!
//! Scanner dust and thresholding speckle produce tiny 8-connected stroke
//! blobs that would otherwise sprout spurious border keypoints. Any
//! component below the minimum area is erased in place.

use std::collections::VecDeque;

use image::GrayImage;

use crate::cancel::CancelToken;
use crate::types::{Cancelled, Pixel, in_bounds, mask_at};

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

/// Erase 8-connected stroke components with fewer than `minimum_area`
/// pixels. Returns the number of pixels erased.
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is cancelled during the scan or a
/// component flood.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn denoise(
    mask: &mut GrayImage,
    minimum_area: usize,
    cancel: &CancelToken,
) -> Result<u64, Cancelled> {
    let width = mask.width() as i32;
    let height = mask.height() as i32;
    let mut visited = vec![false; (width as usize) * (height as usize)];
    let mut queue: VecDeque<Pixel> = VecDeque::new();
    let mut region: Vec<Pixel> = Vec::with_capacity(minimum_area);
    let mut erased = 0u64;

    for y in 0..height {
        cancel.checkpoint()?;
        for x in 0..width {
            let idx = (x + y * width) as usize;
            if mask_at(mask, x, y) == 0 || visited[idx] {
                continue;
            }

            queue.push_back(Pixel::new(x, y));
            visited[idx] = true;
            let mut region_size = 0usize;
            region.clear();

            while let Some(p) = queue.pop_front() {
                cancel.checkpoint()?;
                for (dx, dy) in NEIGHBORS_8 {
                    let (nx, ny) = (p.x + dx, p.y + dy);
                    if in_bounds(mask, nx, ny)
                        && mask_at(mask, nx, ny) != 0
                        && !visited[(nx + ny * width) as usize]
                    {
                        visited[(nx + ny * width) as usize] = true;
                        queue.push_back(Pixel::new(nx, ny));
                    }
                }
                region_size += 1;
                if region_size < minimum_area {
                    region.push(p);
                }
            }

            if region_size < minimum_area {
                for p in &region {
                    mask.put_pixel(p.x as u32, p.y as u32, image::Luma([0]));
                }
                erased += region.len() as u64;
            }
        }
    }

    Ok(erased)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> GrayImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        GrayImage::from_fn(width, height, |x, y| {
            let byte = rows[y as usize].as_bytes()[x as usize];
            image::Luma([u8::from(byte == b'#')])
        })
    }

    fn stroke_count(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] != 0).count()
    }

    #[test]
    fn component_below_minimum_is_erased() {
        let mut mask = mask_from(&[
            "........",
            ".##.....",
            ".##.....",
            "........",
            "........",
        ]);
        let erased = denoise(&mut mask, 5, &CancelToken::new()).unwrap();
        assert_eq!(erased, 4);
        assert_eq!(stroke_count(&mask), 0);
    }

    #[test]
    fn component_at_minimum_survives() {
        let mut mask = mask_from(&[
            "........",
            ".#####..",
            "........",
        ]);
        let erased = denoise(&mut mask, 5, &CancelToken::new()).unwrap();
        assert_eq!(erased, 0);
        assert_eq!(stroke_count(&mask), 5);
    }

    #[test]
    fn diagonal_pixels_form_one_component() {
        // 8-connectivity: a diagonal chain of five pixels is a single
        // component of area 5 and survives.
        let mut mask = mask_from(&[
            "#.....",
            ".#....",
            "..#...",
            "...#..",
            "....#.",
        ]);
        let erased = denoise(&mut mask, 5, &CancelToken::new()).unwrap();
        assert_eq!(erased, 0);
        assert_eq!(stroke_count(&mask), 5);
    }

    #[test]
    fn separate_small_blobs_are_each_erased() {
        let mut mask = mask_from(&[
            "#....#",
            "......",
            "......",
            "#....#",
        ]);
        let erased = denoise(&mut mask, 5, &CancelToken::new()).unwrap();
        assert_eq!(erased, 4);
        assert_eq!(stroke_count(&mask), 0);
    }

    #[test]
    fn large_component_keeps_small_neighbour_intact_only_if_connected() {
        let mut mask = mask_from(&[
            "######....",
            "..........",
            "........#.",
        ]);
        denoise(&mut mask, 5, &CancelToken::new()).unwrap();
        assert_eq!(stroke_count(&mask), 6);
        assert_eq!(mask.get_pixel(8, 2).0[0], 0);
    }

    #[test]
    fn cancelled_token_aborts() {
        let mut mask = mask_from(&["###", "###"]);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(denoise(&mut mask, 5, &token), Err(Cancelled));
    }
}
