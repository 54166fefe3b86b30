//! Asynchronous recompute controller for one line-art object.
//!
//! Owns at most one running pipeline computation. Parameter changes and
//! input invalidations cancel the current worker (without waiting for
//! it) and start a fresh one over a new snapshot, so a published result
//! always corresponds to the latest input and parameter tuple. The
//! worker never touches controller state: it sends its result over a
//! channel, and the controller publishes it (and fires notifications)
//! from its own thread, inside [`poll`](LineArt::poll) or
//! [`get`](LineArt::get).

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use senga_pipeline::{
    CancelToken, Cancelled, ClosureMetrics, ClosureParams, DistanceMap, LineArtOutput,
};
use image::GrayImage;
use log::debug;

use crate::source::LineArtSource;

/// Lifecycle notifications, emitted on the controller's thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A computation was started.
    ComputingStart,
    /// A computation finished, or a running one was superseded.
    ComputingEnd,
}

/// A published closure result.
#[derive(Debug, Clone)]
pub struct LineArtResult {
    /// Closed 0/1 stroke mask, in the source's local space.
    pub closed: GrayImage,
    /// Distance map aligned with the closed mask.
    pub distmap: DistanceMap,
    /// Run metrics.
    pub metrics: ClosureMetrics,
    /// Origin of the source buffer the result maps back onto.
    pub origin: (i32, i32),
}

/// Parameter rejected by a setter; the controller state is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ParamError {
    /// Threshold outside `[0.0, 1.0]`.
    #[error("threshold {0} outside [0.0, 1.0]")]
    Threshold(f64),
    /// Max grow outside `[1, 100]`.
    #[error("max-grow {0} outside [1, 100]")]
    MaxGrow(u32),
    /// Spline max length outside `[0, 1000]`.
    #[error("spline max length {0} outside [0, 1000]")]
    SplineMaxLength(u32),
    /// Segment max length outside `[0, 1000]`.
    #[error("segment max length {0} outside [0, 1000]")]
    SegmentMaxLength(u32),
}

/// [`LineArt::get`] could not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No input buffer is set.
    #[error("no input buffer is set")]
    NoInput,
    /// The controller is frozen and holds no previously computed result.
    #[error("frozen with no computed result")]
    Frozen,
}

struct Computation {
    cancel: CancelToken,
    rx: Receiver<Result<LineArtOutput, Cancelled>>,
    origin: (i32, i32),
}

/// The stateful line-art object: input, parameters, and the most recent
/// closed mask and distance map.
pub struct LineArt {
    input: Option<Box<dyn LineArtSource>>,
    result: Option<Arc<LineArtResult>>,
    computation: Option<Computation>,
    invalidated: bool,
    frozen: bool,
    compute_after_thaw: bool,
    params: ClosureParams,
    max_grow: u32,
    gap_length_bound: bool,
    subscribers: Vec<Sender<Notification>>,
}

impl Default for LineArt {
    fn default() -> Self {
        Self::new()
    }
}

impl LineArt {
    /// Create an empty controller with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: None,
            result: None,
            computation: None,
            invalidated: false,
            frozen: false,
            compute_after_thaw: false,
            params: ClosureParams::default(),
            max_grow: 3,
            gap_length_bound: false,
            subscribers: Vec::new(),
        }
    }

    /// Subscribe to [`Notification`]s. Dropped receivers are pruned on
    /// the next emission.
    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Associate an input buffer (or none) and trigger a recompute.
    ///
    /// Assigning always recomputes, even when handed the same buffer
    /// again: the controller does not deduplicate by input identity.
    pub fn set_input(&mut self, input: Option<Box<dyn LineArtSource>>) {
        self.input = input;
        self.compute();
    }

    /// Whether an input buffer is set.
    #[must_use]
    pub const fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// Suspend recomputes until [`thaw`](Self::thaw).
    pub fn freeze(&mut self) {
        self.frozen = true;
        self.compute_after_thaw = false;
    }

    /// Resume recomputes; runs one if any trigger fired while frozen.
    pub fn thaw(&mut self) {
        self.frozen = false;
        if self.compute_after_thaw {
            self.compute_after_thaw = false;
            self.compute();
        }
    }

    /// Whether recomputes are suspended.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// When bound, writes to either closure length mirror to the other.
    pub const fn bind_gap_length(&mut self, bound: bool) {
        self.gap_length_bound = bound;
    }

    /// Binarize the alpha channel instead of the luminance.
    pub fn set_select_transparent(&mut self, value: bool) {
        if self.params.select_transparent != value {
            self.params.select_transparent = value;
            self.compute();
        }
    }

    /// Current select-transparent flag.
    #[must_use]
    pub const fn select_transparent(&self) -> bool {
        self.params.select_transparent
    }

    /// Stroke detection threshold in `[0.0, 1.0]`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Threshold`] when out of range; no state
    /// changes and no recompute is triggered.
    pub fn set_threshold(&mut self, value: f64) -> Result<(), ParamError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ParamError::Threshold(value));
        }
        if (self.params.threshold - value).abs() > f64::EPSILON {
            self.params.threshold = value;
            self.compute();
        }
        Ok(())
    }

    /// Current threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.params.threshold
    }

    /// Maximum overflow growth in `[1, 100]` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::MaxGrow`] when out of range.
    pub fn set_max_grow(&mut self, value: u32) -> Result<(), ParamError> {
        if !(1..=100).contains(&value) {
            return Err(ParamError::MaxGrow(value));
        }
        if self.max_grow != value {
            self.max_grow = value;
            self.compute();
        }
        Ok(())
    }

    /// Current max grow.
    #[must_use]
    pub const fn max_grow(&self) -> u32 {
        self.max_grow
    }

    /// Maximum spline closure length in `[0, 1000]` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::SplineMaxLength`] when out of range.
    pub fn set_spline_max_length(&mut self, value: u32) -> Result<(), ParamError> {
        if value > 1000 {
            return Err(ParamError::SplineMaxLength(value));
        }
        if self.params.spline_max_len != value {
            self.params.spline_max_len = value;
            if self.gap_length_bound {
                self.params.segment_max_len = value;
            }
            self.compute();
        }
        Ok(())
    }

    /// Current spline max length.
    #[must_use]
    pub const fn spline_max_length(&self) -> u32 {
        self.params.spline_max_len
    }

    /// Maximum segment closure length in `[0, 1000]` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::SegmentMaxLength`] when out of range.
    pub fn set_segment_max_length(&mut self, value: u32) -> Result<(), ParamError> {
        if value > 1000 {
            return Err(ParamError::SegmentMaxLength(value));
        }
        if self.params.segment_max_len != value {
            self.params.segment_max_len = value;
            if self.gap_length_bound {
                self.params.spline_max_len = value;
            }
            self.compute();
        }
        Ok(())
    }

    /// Current segment max length.
    #[must_use]
    pub const fn segment_max_length(&self) -> u32 {
        self.params.segment_max_len
    }

    /// Note that the input buffer's content changed. Invalidations are
    /// coalesced: however many arrive between polls, the next
    /// [`poll`](Self::poll) triggers a single recompute.
    pub const fn notify_input_changed(&mut self) {
        self.invalidated = true;
    }

    /// Service deferred work on the controller thread: run the one
    /// coalesced recompute if the input was invalidated, otherwise
    /// publish a finished computation if one is waiting.
    pub fn poll(&mut self) {
        if self.invalidated {
            self.invalidated = false;
            self.compute();
            return;
        }
        if let Some(computation) = self.computation.take() {
            match computation.rx.try_recv() {
                Ok(outcome) => self.finish(computation.origin, outcome),
                // Still running: keep waiting.
                Err(TryRecvError::Empty) => self.computation = Some(computation),
                // Worker died without sending; treat like a cancel.
                Err(TryRecvError::Disconnected) => {}
            }
        }
    }

    /// The currently published result, if any.
    #[must_use]
    pub fn result(&self) -> Option<Arc<LineArtResult>> {
        self.result.clone()
    }

    /// Block until a result is available, starting a computation if none
    /// is running and none is stored, then return it.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoInput`] without an input buffer;
    /// [`EngineError::Frozen`] when frozen with nothing computed.
    pub fn get(&mut self) -> Result<Arc<LineArtResult>, EngineError> {
        if self.input.is_none() {
            return Err(EngineError::NoInput);
        }
        if self.computation.is_none() && self.result.is_none() {
            self.compute();
        }
        if let Some(computation) = self.computation.take() {
            if let Ok(outcome) = computation.rx.recv() {
                self.finish(computation.origin, outcome);
            }
        }
        self.result.clone().ok_or(EngineError::Frozen)
    }

    /// Cancel and drop the running worker, clear the stored result, and
    /// start a new computation over a fresh input snapshot.
    fn compute(&mut self) {
        if self.frozen {
            self.compute_after_thaw = true;
            return;
        }

        if let Some(computation) = self.computation.take() {
            // Cancel without waiting; the worker observes the token at
            // its next suspension point and tears itself down.
            debug!("superseding a running line art computation");
            self.emit(Notification::ComputingEnd);
            computation.cancel.cancel();
        }

        self.invalidated = false;
        self.result = None;

        if let Some(input) = &self.input {
            let snapshot = input.snapshot();
            let origin = input.origin();
            let params = self.params;
            let cancel = CancelToken::new();
            let worker_cancel = cancel.clone();
            let (tx, rx) = mpsc::channel();

            debug!(
                "computing line art: {}x{}, alpha: {}",
                snapshot.width(),
                snapshot.height(),
                input.has_alpha(),
            );
            thread::spawn(move || {
                let outcome = senga_pipeline::close(&snapshot, &params, &worker_cancel);
                // The controller may have moved on and dropped the
                // receiving end; that is not the worker's concern.
                let _ = tx.send(outcome);
            });

            self.computation = Some(Computation { cancel, rx, origin });
            self.emit(Notification::ComputingStart);
        }
    }

    fn finish(&mut self, origin: (i32, i32), outcome: Result<LineArtOutput, Cancelled>) {
        match outcome {
            Ok(output) => {
                debug!(
                    "line art computed: {} strokes, {} splines, {} segments",
                    output.metrics.stroke_pixels,
                    output.metrics.splines_drawn,
                    output.metrics.segments_drawn,
                );
                self.result = Some(Arc::new(LineArtResult {
                    closed: output.closed,
                    distmap: output.distmap,
                    metrics: output.metrics,
                    origin,
                }));
                self.emit(Notification::ComputingEnd);
            }
            Err(Cancelled) => {
                // The superseding compute() already announced the end.
            }
        }
    }

    fn emit(&mut self, notification: Notification) {
        self.subscribers
            .retain(|tx| tx.send(notification).is_ok());
    }
}

impl Drop for LineArt {
    fn drop(&mut self) {
        if let Some(computation) = self.computation.take() {
            computation.cancel.cancel();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn param_errors_reject_out_of_range_values() {
        let mut line_art = LineArt::new();
        assert_eq!(
            line_art.set_threshold(1.5),
            Err(ParamError::Threshold(1.5))
        );
        assert_eq!(line_art.set_max_grow(0), Err(ParamError::MaxGrow(0)));
        assert_eq!(line_art.set_max_grow(101), Err(ParamError::MaxGrow(101)));
        assert_eq!(
            line_art.set_spline_max_length(1001),
            Err(ParamError::SplineMaxLength(1001))
        );
        assert_eq!(
            line_art.set_segment_max_length(9999),
            Err(ParamError::SegmentMaxLength(9999))
        );
        // Nothing changed.
        assert!((line_art.threshold() - 0.92).abs() < f64::EPSILON);
        assert_eq!(line_art.max_grow(), 3);
        assert_eq!(line_art.spline_max_length(), 100);
        assert_eq!(line_art.segment_max_length(), 100);
    }

    #[test]
    fn bound_lengths_mirror_each_other() {
        let mut line_art = LineArt::new();
        line_art.bind_gap_length(true);
        line_art.set_spline_max_length(40).unwrap();
        assert_eq!(line_art.segment_max_length(), 40);
        line_art.set_segment_max_length(7).unwrap();
        assert_eq!(line_art.spline_max_length(), 7);
    }

    #[test]
    fn unbound_lengths_stay_independent() {
        let mut line_art = LineArt::new();
        line_art.set_spline_max_length(40).unwrap();
        assert_eq!(line_art.segment_max_length(), 100);
    }

    #[test]
    fn get_without_input_fails() {
        let mut line_art = LineArt::new();
        assert_eq!(line_art.get().map(|_| ()), Err(EngineError::NoInput));
    }

    #[test]
    fn freeze_is_reported() {
        let mut line_art = LineArt::new();
        assert!(!line_art.is_frozen());
        line_art.freeze();
        assert!(line_art.is_frozen());
        line_art.thaw();
        assert!(!line_art.is_frozen());
    }
}
