//! Euclidean distance transform of a stroke mask.
//!
//! Wraps [`imageproc::distance_transform::euclidean_squared_distance_transform`]
//! to measure, for every stroke pixel, how deep inside the stroke it sits.
//! The overflow pass and the stroke-radius estimate both climb this field.

use image::GrayImage;
use imageproc::distance_transform::euclidean_squared_distance_transform;

use crate::types::DistanceMap;

/// Distance of each nonzero (stroke) pixel to the nearest zero
/// (background) pixel, measured center to center; background pixels map
/// to 0.0. A stroke pixel with a cardinal background neighbor therefore
/// maps to exactly 1.0, and the field is maximal along stroke ridges.
#[must_use]
pub fn stroke_distance_map(mask: &GrayImage) -> DistanceMap {
    // The imageproc transform measures distance *to* the foreground, so
    // feed it the inverted mask: background becomes the foreground the
    // strokes measure their distance to.
    let inverted = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        image::Luma([u8::from(mask.get_pixel(x, y).0[0] == 0) * 255])
    });
    let squared = euclidean_squared_distance_transform(&inverted);
    #[allow(clippy::cast_possible_truncation)]
    DistanceMap::from_fn(mask.width(), mask.height(), |x, y| {
        image::Luma([squared.get_pixel(x, y).0[0].sqrt() as f32])
    })
}
