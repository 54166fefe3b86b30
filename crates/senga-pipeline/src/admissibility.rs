//! Region-size admissibility of a candidate closure.
//!
//! Accepting a closure must not trap a background region of awkward
//! size: a "medium" region (at least the significant area but below the
//! minimum area) reads as an error to a user flood-filling the art, so
//! such candidates are refused. Micro-regions below the significant
//! area are tolerated and remembered as seeds to be filled over.
//!
//! Candidate and traversed-border flags live in an auxiliary marks
//! buffer owned by the checker, never in the mask bytes, so a rejected
//! candidate leaves the working mask untouched and the check is
//! testable in isolation. The buffer is all-zero between calls: border
//! marks are only ever placed on candidate pixels, and every candidate
//! pixel is cleared on exit.

use image::GrayImage;

use crate::edgel::{BorderStep, next8};
use crate::types::{Direction, Pixel, in_bounds, mask_at};

/// Bit flagging a pixel as part of the candidate sequence (bit 1; bits
/// 2-5 are the per-direction traversal marks).
const CANDIDATE: u8 = 2;

/// Reusable admissibility checker for one closure stage.
#[derive(Debug)]
pub struct ClosureCheck {
    marks: Vec<u8>,
    width: i32,
    height: i32,
    significant_area: i64,
    minimum_area: i64,
}

impl ClosureCheck {
    /// Create a checker for masks of the given dimensions.
    ///
    /// `significant_area` is the smallest region size users notice;
    /// `minimum_area` is the largest region size still refused (the
    /// refused band is `[significant_area, minimum_area]`).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(width: u32, height: u32, significant_area: i64, minimum_area: i64) -> Self {
        Self {
            marks: vec![0; (width as usize) * (height as usize)],
            width: width as i32,
            height: height as i32,
            significant_area,
            minimum_area,
        }
    }

    /// Decide whether drawing `pixels` into `mask` is admissible.
    ///
    /// Traces every border the candidate pixels touch. A trace that
    /// closes within the edgel budget and encloses an area inside the
    /// refused band rejects the candidate; an enclosed micro-region
    /// records the interior pixel across the border as a fill seed.
    /// Seeds are appended to `fill_pixels` only on acceptance.
    pub fn allow_closure(
        &mut self,
        mask: &GrayImage,
        pixels: &[Pixel],
        fill_pixels: &mut Vec<Pixel>,
    ) -> bool {
        // A region with more than `2 * (minimum_area + 1)` border edgels
        // necessarily holds more than `minimum_area` pixels, so traces
        // stop there.
        let max_edgel_count = 2 * (self.minimum_area + 1);

        for p in pixels {
            if in_bounds(mask, p.x, p.y) {
                let idx = self.index(p.x, p.y);
                self.marks[idx] |= CANDIDATE;
            }
        }

        let mut seeds: Vec<Pixel> = Vec::new();
        let mut accepted = true;

        'candidates: for &p in pixels {
            if !in_bounds(mask, p.x, p.y) {
                continue;
            }
            for direction in Direction::ALL {
                if !self.border_in_direction(mask, p, direction) {
                    continue;
                }
                if self.marks[self.index(p.x, p.y)] & direction.mark() != 0 {
                    continue;
                }

                let start = BorderStep {
                    x: p.x,
                    y: p.y,
                    direction,
                };
                let count = self.track_mark(mask, start, max_edgel_count);
                if count < 0 || count > max_edgel_count {
                    continue;
                }

                let area = self.region_area(mask, start);
                if area >= self.significant_area && area <= self.minimum_area {
                    accepted = false;
                    break 'candidates;
                }
                if area > 0 && area < self.significant_area {
                    let (dx, dy) = direction.delta();
                    let seed = Pixel::new(p.x + dx, p.y + dy);
                    if in_bounds(mask, seed.x, seed.y) {
                        seeds.push(seed);
                    }
                }
            }
        }

        // Clear every mark. Traversal marks only exist on candidate
        // pixels, so clearing those restores an all-zero buffer.
        for p in pixels {
            if in_bounds(mask, p.x, p.y) {
                let idx = self.index(p.x, p.y);
                self.marks[idx] = 0;
            }
        }

        if accepted {
            fill_pixels.append(&mut seeds);
        }
        accepted
    }

    /// Whether `p` (stroke or candidate) borders background in the given
    /// direction; off-image neighbors count as background.
    fn border_in_direction(&self, mask: &GrayImage, p: Pixel, direction: Direction) -> bool {
        let (dx, dy) = direction.delta();
        let (nx, ny) = (p.x + dx, p.y + dy);
        if in_bounds(mask, nx, ny) {
            !self.stroke_or_candidate(mask, nx, ny)
        } else {
            true
        }
    }

    fn stroke_or_candidate(&self, mask: &GrayImage, x: i32, y: i32) -> bool {
        mask_at(mask, x, y) != 0
            || (x >= 0
                && y >= 0
                && x < self.width
                && y < self.height
                && self.marks[self.index(x, y)] & CANDIDATE != 0)
    }

    /// Clockwise successor of a border step, with candidate pixels
    /// counting as stroke.
    fn successor(&self, mask: &GrayImage, step: BorderStep) -> BorderStep {
        next8(&|x: i32, y: i32| self.stroke_or_candidate(mask, x, y), step)
    }

    /// Follow the border from `start`, flagging each traversed edgel
    /// that lies on a candidate pixel. Returns the number of edgels
    /// visited (possibly `size_limit + 1` when the cap is hit), or -1
    /// if an already-flagged edgel is reached (the border was traced
    /// before from another side of the candidate).
    fn track_mark(&mut self, mask: &GrayImage, start: BorderStep, size_limit: i64) -> i64 {
        let mut step = start;
        let mut count = 1i64;
        loop {
            step = self.successor(mask, step);
            let idx = self.index(step.x, step.y);
            if self.marks[idx] & CANDIDATE != 0 {
                if self.marks[idx] & step.direction.mark() != 0 {
                    return -1;
                }
                self.marks[idx] |= step.direction.mark();
            }
            if step != start {
                count += 1;
            }
            if step == start || count > size_limit {
                return count;
            }
        }
    }

    /// Signed area enclosed by the border through `start`: X- edgels add
    /// `x - 1`, X+ edgels subtract `x`. A border that does not enclose
    /// its region (an outer border) comes out negative.
    fn region_area(&self, mask: &GrayImage, start: BorderStep) -> i64 {
        let mut step = start;
        let mut area = 0i64;
        loop {
            match step.direction {
                Direction::XPlus => area -= i64::from(step.x),
                Direction::XMinus => area += i64::from(step.x) - 1,
                Direction::YPlus | Direction::YMinus => {}
            }
            step = self.successor(mask, step);
            if step == start {
                return area;
            }
        }
    }

    #[allow(clippy::cast_sign_loss)]
    const fn index(&self, x: i32, y: i32) -> usize {
        (x as usize) + (y as usize) * (self.width as usize)
    }
}

#[cfg(test)]
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

    fn check_for(mask: &GrayImage) -> ClosureCheck {
        // The pipeline's fixed band: significant 4, refused up to 99.
        ClosureCheck::new(mask.width(), mask.height(), 4, 99)
    }

    #[test]
    fn closing_a_medium_region_is_refused() {
        // A 5x10 = 50 pixel chamber, open at one pixel on the top wall.
        let mask = mask_from(&[
            "############",
            "#####.######",
            "#..........#",
            "#..........#",
            "#..........#",
            "#..........#",
            "#..........#",
            "############",
        ]);
        let mut check = check_for(&mask);
        let mut fill = Vec::new();
        let candidate = [Pixel::new(5, 1)];
        assert!(!check.allow_closure(&mask, &candidate, &mut fill));
        assert!(fill.is_empty());
    }

    #[test]
    fn closing_a_large_region_is_allowed() {
        // An 11x11 = 121 pixel chamber: at least the minimum area.
        let mask = mask_from(&[
            "#############",
            "######.######",
            "#...........#",
            "#...........#",
            "#...........#",
            "#...........#",
            "#...........#",
            "#...........#",
            "#...........#",
            "#...........#",
            "#...........#",
            "#...........#",
            "#...........#",
            "#############",
        ]);
        let mut check = check_for(&mask);
        let mut fill = Vec::new();
        assert!(check.allow_closure(&mask, &[Pixel::new(6, 1)], &mut fill));
        assert!(fill.is_empty());
    }

    #[test]
    fn micro_region_is_allowed_and_seeded() {
        // Closing traps a two-pixel slot below the candidate.
        let mask = mask_from(&[
            "#.#",
            "#.#",
            "#.#",
            "###",
        ]);
        let mut check = check_for(&mask);
        let mut fill = Vec::new();
        let candidate = [Pixel::new(1, 0)];
        assert!(check.allow_closure(&mask, &candidate, &mut fill));
        assert_eq!(fill, vec![Pixel::new(1, 1)]);
    }

    #[test]
    fn rejection_leaves_the_mask_untouched() {
        let mask = mask_from(&[
            "############",
            "#####.######",
            "#..........#",
            "#..........#",
            "#..........#",
            "#..........#",
            "#..........#",
            "############",
        ]);
        let before = mask.clone();
        let mut check = check_for(&mask);
        let mut fill = Vec::new();
        assert!(!check.allow_closure(&mask, &[Pixel::new(5, 1)], &mut fill));
        assert_eq!(mask, before);
    }

    #[test]
    fn checker_state_is_clean_between_calls() {
        // The same rejection decided twice: leftover marks from the
        // first call would derail the second trace.
        let mask = mask_from(&[
            "############",
            "#####.######",
            "#..........#",
            "#..........#",
            "#..........#",
            "#..........#",
            "#..........#",
            "############",
        ]);
        let mut check = check_for(&mask);
        let mut fill = Vec::new();
        assert!(!check.allow_closure(&mask, &[Pixel::new(5, 1)], &mut fill));
        assert!(!check.allow_closure(&mask, &[Pixel::new(5, 1)], &mut fill));
        assert!(check.marks.iter().all(|&m| m == 0));
    }

    #[test]
    fn open_geometry_is_admissible() {
        // A candidate continuing a free-standing bar encloses nothing.
        let mask = mask_from(&[
            "..........",
            ".#####....",
            "..........",
        ]);
        let mut check = check_for(&mask);
        let mut fill = Vec::new();
        let candidate: Vec<Pixel> = (6..=8).map(|x| Pixel::new(x, 1)).collect();
        assert!(check.allow_closure(&mask, &candidate, &mut fill));
        assert!(fill.is_empty());
    }

    #[test]
    fn out_of_image_candidate_pixels_are_ignored() {
        let mask = mask_from(&["....", ".##.", "...."]);
        let mut check = check_for(&mask);
        let mut fill = Vec::new();
        let candidate = [Pixel::new(-3, 1), Pixel::new(3, 1), Pixel::new(17, 9)];
        assert!(check.allow_closure(&mask, &candidate, &mut fill));
        assert!(check.marks.iter().all(|&m| m == 0));
    }
}
