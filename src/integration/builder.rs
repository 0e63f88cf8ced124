//! Builder for creating boxes from various input formats.

use crate::tracker::Rect;

/// Builder for creating `Rect` boxes from various detector output formats.
#[derive(Debug, Clone, Copy)]
pub struct BoxBuilder {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    scale: f32,
}

impl Default for BoxBuilder {
    fn default() -> Self {
        Self {
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            scale: 1.0,
        }
    }
}

impl BoxBuilder {
    /// Create a new box builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.x1 = x;
        self.y1 = y;
        self.x2 = x + w;
        self.y2 = y + h;
        self
    }

    /// Scale coordinates, e.g. to map boxes found on a downscaled frame
    /// back to full resolution.
    pub fn scale(mut self, factor: f32) -> Self {
        self.scale = factor;
        self
    }

    /// Build the final `Rect`.
    pub fn build(self) -> Rect {
        Rect::from_tlbr(
            self.x1 * self.scale,
            self.y1 * self.scale,
            self.x2 * self.scale,
            self.y2 * self.scale,
        )
    }
}
