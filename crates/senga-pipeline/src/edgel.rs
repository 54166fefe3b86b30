//! Oriented-border (edgel) graph of a binary stroke mask.
//!
//! An edgel is a stroke pixel together with the direction of an adjacent
//! non-stroke pixel. Every border of every stroke component decomposes
//! into a closed chain of edgels; [`next8`] computes the clockwise
//! successor of an edgel from its 3x3 pixel neighborhood, and
//! [`EdgelSet::build`] links the whole set into doubly-linked chains
//! through array indices.
//!
//! Indices rather than references keep the graph trivially droppable on
//! cancellation and cheap to assert over in tests.

use std::collections::HashMap;

use image::GrayImage;

use crate::cancel::CancelToken;
use crate::types::{Cancelled, Direction, mask_at};

/// One oriented border element.
#[derive(Debug, Clone)]
pub struct Edgel {
    /// Pixel holding the border.
    pub x: i32,
    /// Pixel holding the border.
    pub y: i32,
    /// Which side of the pixel faces background.
    pub direction: Direction,
    /// Border normal, initially the outward unit vector of `direction`,
    /// unit length again after smoothing.
    pub x_normal: f32,
    /// See `x_normal`.
    pub y_normal: f32,
    /// Signed local curvature of the border at this element.
    pub curvature: f32,
    /// Index of the clockwise successor along the same border.
    pub next: usize,
    /// Index of the clockwise predecessor along the same border.
    pub previous: usize,
}

/// A (pixel, direction) pair identifying a border element during a walk,
/// without the geometric payload of a full [`Edgel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderStep {
    /// Pixel holding the border.
    pub x: i32,
    /// Pixel holding the border.
    pub y: i32,
    /// Which side of the pixel faces background.
    pub direction: Direction,
}

/// Clockwise successor of `step` along its border.
///
/// `stroke` reports whether a coordinate holds a stroke pixel;
/// out-of-image coordinates must report background. The turn is decided
/// from two pixels of the 3x3 neighborhood: the diagonal ahead-left of
/// the walk direction (outer turn), then the pixel straight ahead
/// (continue), else the border rotates in place.
#[must_use]
pub fn next8(stroke: &impl Fn(i32, i32) -> bool, step: BorderStep) -> BorderStep {
    let BorderStep { x, y, direction } = step;
    match direction {
        Direction::XPlus => {
            if stroke(x + 1, y + 1) {
                BorderStep {
                    x: x + 1,
                    y: y + 1,
                    direction: Direction::YMinus,
                }
            } else if stroke(x, y + 1) {
                BorderStep {
                    x,
                    y: y + 1,
                    direction: Direction::XPlus,
                }
            } else {
                BorderStep {
                    x,
                    y,
                    direction: Direction::YPlus,
                }
            }
        }
        Direction::YMinus => {
            if stroke(x + 1, y - 1) {
                BorderStep {
                    x: x + 1,
                    y: y - 1,
                    direction: Direction::XMinus,
                }
            } else if stroke(x + 1, y) {
                BorderStep {
                    x: x + 1,
                    y,
                    direction: Direction::YMinus,
                }
            } else {
                BorderStep {
                    x,
                    y,
                    direction: Direction::XPlus,
                }
            }
        }
        Direction::XMinus => {
            if stroke(x - 1, y - 1) {
                BorderStep {
                    x: x - 1,
                    y: y - 1,
                    direction: Direction::YPlus,
                }
            } else if stroke(x, y - 1) {
                BorderStep {
                    x,
                    y: y - 1,
                    direction: Direction::XMinus,
                }
            } else {
                BorderStep {
                    x,
                    y,
                    direction: Direction::YMinus,
                }
            }
        }
        Direction::YPlus => {
            if stroke(x - 1, y + 1) {
                BorderStep {
                    x: x - 1,
                    y: y + 1,
                    direction: Direction::XPlus,
                }
            } else if stroke(x - 1, y) {
                BorderStep {
                    x: x - 1,
                    y,
                    direction: Direction::YPlus,
                }
            } else {
                BorderStep {
                    x,
                    y,
                    direction: Direction::XMinus,
                }
            }
        }
    }
}

/// The complete edgel set of a mask, chains linked through indices.
#[derive(Debug, Default)]
pub struct EdgelSet {
    edgels: Vec<Edgel>,
}

impl EdgelSet {
    /// Enumerate every oriented border of `mask` and link each edgel to
    /// its clockwise successor and predecessor.
    ///
    /// A mask with width or height of at most 1 yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the token is cancelled during the scan
    /// or the linking pass.
    pub fn build(mask: &GrayImage, cancel: &CancelToken) -> Result<Self, Cancelled> {
        let mut set = Self::default();
        if mask.width() <= 1 || mask.height() <= 1 {
            return Ok(set);
        }

        let mut index: HashMap<(i32, i32, Direction), usize> = HashMap::new();

        #[allow(clippy::cast_possible_wrap)]
        let (width, height) = (mask.width() as i32, mask.height() as i32);
        for y in 0..height {
            cancel.checkpoint()?;
            for x in 0..width {
                if mask_at(mask, x, y) == 0 {
                    continue;
                }
                for direction in [
                    Direction::YMinus,
                    Direction::YPlus,
                    Direction::XMinus,
                    Direction::XPlus,
                ] {
                    let (dx, dy) = direction.delta();
                    if mask_at(mask, x + dx, y + dy) == 0 {
                        let [x_normal, y_normal] = direction.normal();
                        index.insert((x, y, direction), set.edgels.len());
                        set.edgels.push(Edgel {
                            x,
                            y,
                            direction,
                            x_normal,
                            y_normal,
                            curvature: 0.0,
                            next: usize::MAX,
                            previous: usize::MAX,
                        });
                    }
                }
            }
        }

        let stroke = |x: i32, y: i32| mask_at(mask, x, y) != 0;
        for i in 0..set.edgels.len() {
            cancel.checkpoint()?;
            let step = BorderStep {
                x: set.edgels[i].x,
                y: set.edgels[i].y,
                direction: set.edgels[i].direction,
            };
            let successor = next8(&stroke, step);
            // Structural invariant: the clockwise successor of an edgel
            // is itself an edgel of the same mask.
            #[allow(clippy::expect_used)]
            let j = *index
                .get(&(successor.x, successor.y, successor.direction))
                .expect("border successor must exist in the edgel index");
            set.edgels[i].next = j;
            set.edgels[j].previous = i;
        }

        Ok(set)
    }

    /// Number of edgels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edgels.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edgels.is_empty()
    }

    /// The edgels, in construction (row-major) order.
    #[must_use]
    pub fn edgels(&self) -> &[Edgel] {
        &self.edgels
    }

    /// Smooth every edgel normal along its chain with a Gaussian kernel
    /// of half-width `mask_size` edgels, sigma `mask_size * 0.775`.
    ///
    /// The walk out from each edgel stops early when the forward walker
    /// reaches the backward walker, which signals a chain shorter than
    /// the kernel. Each smoothed normal is renormalized to unit length.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the token is cancelled mid-scan.
    #[allow(clippy::cast_precision_loss)]
    pub fn smooth_normals(
        &mut self,
        mask_size: usize,
        cancel: &CancelToken,
    ) -> Result<(), Cancelled> {
        let sigma = mask_size as f32 * 0.775;
        let den = 2.0 * sigma * sigma;
        let weights: Vec<f32> = (0..=mask_size)
            .map(|i| {
                if i == 0 {
                    1.0
                } else {
                    (-((i * i) as f32) / den).exp()
                }
            })
            .collect();

        for i in 0..self.edgels.len() {
            cancel.checkpoint()?;

            let mut before = self.edgels[i].previous;
            let mut after = self.edgels[i].next;
            let [mut sx, mut sy] = self.edgels[i].direction.normal();

            let mut remaining = mask_size;
            let mut k = 1;
            while remaining > 0 && after != before {
                let [bx, by] = self.edgels[before].direction.normal();
                let [ax, ay] = self.edgels[after].direction.normal();
                sx += weights[k] * (bx + ax);
                sy += weights[k] * (by + ay);
                before = self.edgels[before].previous;
                after = self.edgels[after].next;
                remaining -= 1;
                k += 1;
            }

            let length = sx.hypot(sy);
            if length > 0.0 {
                self.edgels[i].x_normal = sx / length;
                self.edgels[i].y_normal = sy / length;
            } else {
                self.edgels[i].x_normal = 0.0;
                self.edgels[i].y_normal = 0.0;
            }
        }
        Ok(())
    }

    /// Compute per-edgel curvature from the smoothed normals of the two
    /// chain neighbors: magnitude `|(n_next - n_prev)| / 2`, sign taken
    /// from the 2D cross product of `n_prev` with `n_next` (positive on
    /// convex turns of the border).
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the token is cancelled mid-scan.
    pub fn compute_curvature(&mut self, cancel: &CancelToken) -> Result<(), Cancelled> {
        for i in 0..self.edgels.len() {
            cancel.checkpoint()?;
            let previous = &self.edgels[self.edgels[i].previous];
            let next = &self.edgels[self.edgels[i].next];
            let (px, py) = (previous.x_normal, previous.y_normal);
            let (nx, ny) = (next.x_normal, next.y_normal);
            let dx = (nx - px) * 0.5;
            let dy = (ny - py) * 0.5;
            let magnitude = dx.hypot(dy);
            let cross = px.mul_add(ny, -(py * nx));
            self.edgels[i].curvature = if cross > 0.0 { magnitude } else { -magnitude };
        }
        Ok(())
    }
}
