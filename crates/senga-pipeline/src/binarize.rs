//! Channel selection and binarization of the input sketch.
//!
//! Produces the binary stroke mask the rest of the pipeline operates on:
//! byte 1 where the sketch has a stroke, 0 elsewhere. The stroke plane is
//! either the alpha channel (line art drawn as opaque strokes over a
//! transparent background) or the inverted luminance (dark strokes over a
//! light background).

use image::GrayImage;

use crate::cancel::CancelToken;
use crate::types::{Cancelled, SourceImage};

/// Binarize the source into a 0/1 stroke mask.
///
/// The alpha plane is used iff `select_transparent` is set, the source
/// has one, *and* it contains at least one fully transparent pixel;
/// otherwise there is no transparent background to select against and
/// the luminance is used instead. On the luminance path the plane
/// maximum is taken as the background level and `max - value` as the
/// stroke intensity, so light backgrounds binarize to zero.
///
/// A pixel is a stroke iff its intensity exceeds
/// `255 * (1 - threshold)` (truncated to a byte).
///
/// # Errors
///
/// Returns [`Cancelled`] if the token is cancelled during a scan.
pub fn binarize(
    source: &SourceImage,
    select_transparent: bool,
    threshold: f64,
    cancel: &CancelToken,
) -> Result<GrayImage, Cancelled> {
    let (width, height) = (source.width(), source.height());

    let alpha = match source.alpha() {
        Some(plane) if select_transparent => {
            // Without any fully transparent pixel there is no
            // transparent background to select against.
            if has_fully_transparent(plane, cancel)? {
                Some(plane)
            } else {
                None
            }
        }
        _ => None,
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cutoff = (255.0 * (1.0 - threshold)) as u8;

    let mut mask = GrayImage::new(width, height);

    if let Some(plane) = alpha {
        for y in 0..height {
            cancel.checkpoint()?;
            for x in 0..width {
                let value = plane.get_pixel(x, y).0[0];
                mask.put_pixel(x, y, image::Luma([u8::from(value > cutoff)]));
            }
        }
    } else {
        let max_value = plane_maximum(source.luma(), cancel)?;
        for y in 0..height {
            cancel.checkpoint()?;
            for x in 0..width {
                let value = max_value - source.luma().get_pixel(x, y).0[0];
                mask.put_pixel(x, y, image::Luma([u8::from(value > cutoff)]));
            }
        }
    }

    Ok(mask)
}

/// Whether the alpha plane contains at least one fully transparent byte.
fn has_fully_transparent(plane: &GrayImage, cancel: &CancelToken) -> Result<bool, Cancelled> {
    for (y, row) in plane.rows().enumerate() {
        if y % 64 == 0 {
            cancel.checkpoint()?;
        }
        if row.into_iter().any(|p| p.0[0] == 0) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Largest byte in the plane (the background level of a light sketch).
fn plane_maximum(plane: &GrayImage, cancel: &CancelToken) -> Result<u8, Cancelled> {
    let mut max_value = 0u8;
    for (y, row) in plane.rows().enumerate() {
        if y % 64 == 0 {
            cancel.checkpoint()?;
        }
        for p in row {
            max_value = max_value.max(p.0[0]);
        }
    }
    Ok(max_value)
}
