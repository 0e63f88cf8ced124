//! Detect, track and recognize loop for video streams.
//!
//! A [`Controller`] alternates between two modes. While `Detecting`, it
//! runs a [`Detector`] every few frames and seeds one single-object tracker
//! per detected box. While `Tracking`, it advances those trackers every
//! frame, keeps detecting on the same cadence, and appends detections that
//! overlap nothing already tracked. Every time the tracked set grows, a
//! [`Recognizer`] labels it on a worker thread; labels are applied once the
//! result arrives, without ever blocking the frame loop.
//!
//! Detection, tracking, recognition and rendering are collaborators behind
//! traits; this crate owns the control flow between them.

pub mod config;
pub mod error;
pub mod integration;
pub mod pacing;
pub mod tracker;

pub use config::ControllerConfig;
pub use error::{Error, RecognitionError, Result};
pub use integration::{
    BoxBuilder, Controller, Detector, FrameReport, IntoBoxes, Mode, RecognitionScope,
    Recognizer, RenderFlow, Renderer, RunSummary,
};
pub use pacing::{FramePacer, Pacing};
pub use tracker::{
    Association, AssociationThresholds, Color, FailurePolicy, LabelPalette, Rect,
    SingleObjectTracker, TrackedObject, TrackerFactory, TrackerPool, UNKNOWN_LABEL,
};
