//! Pure line-art closure pipeline (sans-IO).
//!
//! Converts a raster sketch into a *closed* binary stroke mask suitable
//! for flood-fill based smart coloring, plus a Euclidean distance map of
//! the closed art:
//!
//! binarize -> denoise -> border normals & curvature -> keypoints ->
//! spline & segment closures -> micro-region fill -> distance transform
//!
//! Everything here is synchronous and allocation-owned; the asynchronous
//! recompute wrapper lives in the `senga-engine` crate. Long-running
//! scans poll a [`CancelToken`] and bail out with [`Cancelled`].

pub mod admissibility;
pub mod binarize;
pub mod cancel;
pub mod close;
pub mod closure;
pub mod curvature;
pub mod denoise;
pub mod diagnostics;
pub mod distance;
pub mod edgel;
pub mod keypoints;
pub mod overflow;
pub mod spline;
pub mod types;

pub use cancel::CancelToken;
pub use close::close;
pub use diagnostics::ClosureMetrics;
pub use distance::stroke_distance_map;
pub use overflow::overflow;
pub use types::{
    Cancelled, ClosureParams, Direction, DistanceMap, LineArtOutput, Pixel, SourceImage,
};
