//! Trait for object detection backends.

use crate::tracker::Rect;

/// Trait for object detection backends (cascade classifier, DNN, ...).
///
/// Implement this trait to feed any detector into the controller.
///
/// # Example
///
/// ```ignore
/// use facetrack_rs::{Detector, Rect};
///
/// struct CascadeDetector {
///     // Your classifier here
/// }
///
/// impl Detector<Frame> for CascadeDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<Rect>, Self::Error> {
///         // Run the classifier and return TLWH boxes
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector<F> {
    /// Error type for detection failures.
    type Error: std::fmt::Display;

    /// Run detection on a frame and return candidate boxes in TLWH format.
    ///
    /// An empty vector is a normal result. Errors are logged by the
    /// controller and treated as an empty result.
    fn detect(&mut self, frame: &F) -> Result<Vec<Rect>, Self::Error>;
}

/// Helper trait for converting model-specific outputs to boxes.
pub trait IntoBoxes {
    fn into_boxes(self) -> Vec<Rect>;
}

impl IntoBoxes for Vec<Rect> {
    fn into_boxes(self) -> Vec<Rect> {
        self
    }
}

/// Raw `[x, y, w, h]` rows, as classic cascade classifiers return them.
impl IntoBoxes for Vec<[f32; 4]> {
    fn into_boxes(self) -> Vec<Rect> {
        self.into_iter()
            .map(|[x, y, w, h]| Rect::new(x, y, w, h))
            .collect()
    }
}
