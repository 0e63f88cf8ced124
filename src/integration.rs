//! Integration module connecting detectors, trackers and recognizers.
//!
//! This module provides the collaborator traits the controller drives and
//! the controller itself.

mod builder;
mod detector;
mod pipeline;
mod recognition;
mod renderer;

pub use builder::BoxBuilder;
pub use detector::{Detector, IntoBoxes};
pub use pipeline::{Controller, FrameReport, Mode, RunSummary};
pub use recognition::{RecognitionOutcome, RecognitionScope, RecognitionSlot, Recognizer};
pub use renderer::{RenderFlow, Renderer};
