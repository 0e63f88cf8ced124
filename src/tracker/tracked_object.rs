//! Per-object state owned by the tracker pool.

use crate::tracker::color::{Color, LabelPalette};
use crate::tracker::rect::Rect;

/// Label carried by every object until recognition says otherwise.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// One tracked object as seen by the controller and the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    /// Identifier, stable for the object's lifetime in its pool
    pub id: u64,
    /// Latest bounding box (TLWH)
    pub bbox: Rect,
    /// Display color
    pub color: Color,
    /// Recognition label, `UNKNOWN_LABEL` until a result arrives
    pub label: String,
}

impl TrackedObject {
    pub fn new(id: u64, bbox: Rect, color: Color) -> Self {
        Self {
            id,
            bbox,
            color,
            label: UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.label != UNKNOWN_LABEL
    }

    /// Replace the label and derive the display color from it.
    pub fn set_label(&mut self, label: impl Into<String>, palette: &LabelPalette) {
        self.label = label.into();
        self.color = palette.for_label(self.is_known());
    }
}
