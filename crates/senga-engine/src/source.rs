//! Input-buffer contract for the line-art controller.
//!
//! The controller never reads pixels itself: it asks the source for a
//! fresh snapshot at compute time and ships that snapshot to the worker.
//! Sources with a non-zero origin are snapshotted in their own local
//! space; the controller re-attaches the origin to the published result.

use image::GrayImage;
use senga_pipeline::SourceImage;

/// A raster the controller can snapshot and recompute from.
///
/// Implementations that buffer writes should flush them inside
/// [`snapshot`](Self::snapshot) so the copy reflects every change made
/// before the recompute was triggered.
pub trait LineArtSource: Send {
    /// Whether the source carries an alpha channel.
    fn has_alpha(&self) -> bool;

    /// Origin of the buffer in image space (shift-x, shift-y).
    fn origin(&self) -> (i32, i32);

    /// Copy the pixels into a fresh backing buffer, luma plus optional
    /// alpha, in the source's local coordinate space.
    fn snapshot(&self) -> SourceImage;
}

/// An in-memory source backed by owned gray planes.
#[derive(Debug, Clone)]
pub struct RasterSource {
    luma: GrayImage,
    alpha: Option<GrayImage>,
    origin: (i32, i32),
}

impl RasterSource {
    /// Create a source from a luminance plane at origin (0, 0).
    #[must_use]
    pub const fn new(luma: GrayImage) -> Self {
        Self {
            luma,
            alpha: None,
            origin: (0, 0),
        }
    }

    /// Create a source from luminance and alpha planes at origin (0, 0).
    #[must_use]
    pub const fn with_alpha(luma: GrayImage, alpha: GrayImage) -> Self {
        Self {
            luma,
            alpha: Some(alpha),
            origin: (0, 0),
        }
    }

    /// Move the source to an origin in image space.
    #[must_use]
    pub const fn at_origin(mut self, x: i32, y: i32) -> Self {
        self.origin = (x, y);
        self
    }

    /// Mutable access to the luminance plane. Pair edits with a
    /// [`LineArt::notify_input_changed`](crate::LineArt::notify_input_changed)
    /// call so the controller schedules a recompute.
    pub const fn luma_mut(&mut self) -> &mut GrayImage {
        &mut self.luma
    }
}

impl LineArtSource for RasterSource {
    fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    fn origin(&self) -> (i32, i32) {
        self.origin
    }

    fn snapshot(&self) -> SourceImage {
        match &self.alpha {
            Some(alpha) => SourceImage::with_alpha(self.luma.clone(), alpha.clone()),
            None => SourceImage::new(self.luma.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_an_independent_copy() {
        let mut source = RasterSource::new(GrayImage::from_pixel(3, 3, image::Luma([7])));
        let snapshot = source.snapshot();
        source.luma_mut().put_pixel(1, 1, image::Luma([0]));
        assert_eq!(snapshot.luma().get_pixel(1, 1).0[0], 7);
    }

    #[test]
    fn origin_round_trips() {
        let source = RasterSource::new(GrayImage::new(2, 2)).at_origin(-5, 12);
        assert_eq!(source.origin(), (-5, 12));
    }

    #[test]
    fn alpha_presence_is_reported() {
        let luma = GrayImage::new(2, 2);
        assert!(!RasterSource::new(luma.clone()).has_alpha());
        assert!(RasterSource::with_alpha(luma.clone(), GrayImage::new(2, 2)).has_alpha());
    }
}
