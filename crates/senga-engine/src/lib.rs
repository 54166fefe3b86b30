//! Asynchronous recompute controller for the senga closure pipeline.
//!
//! [`LineArt`] wraps [`senga_pipeline::close`] with the lifecycle a
//! painting application needs: assign an input buffer, tune parameters,
//! and read the latest closed mask and distance map, while every
//! invalidation cancels the superseded worker and recomputes in the
//! background.

pub mod line_art;
pub mod source;

pub use line_art::{EngineError, LineArt, LineArtResult, Notification, ParamError};
pub use source::{LineArtSource, RasterSource};

// Re-export the pipeline surface engine callers need.
pub use senga_pipeline::{
    CancelToken, Cancelled, ClosureMetrics, ClosureParams, DistanceMap, LineArtOutput,
    SourceImage, overflow,
};
