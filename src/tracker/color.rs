//! Display colors attached to tracked objects.

use rand::Rng;
use serde::Deserialize;

/// RGB display color handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Color used for objects whose label was recognized.
    pub const KNOWN: Color = Color::new(0, 255, 0);
    /// Color used for objects recognition could not identify.
    pub const UNKNOWN: Color = Color::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pick an arbitrary color, used once per object when tracking starts.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            r: rng.gen_range(0..=255),
            g: rng.gen_range(0..=255),
            b: rng.gen_range(0..=255),
        }
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// The pair of colors label assignment switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LabelPalette {
    pub known: Color,
    pub unknown: Color,
}

impl Default for LabelPalette {
    fn default() -> Self {
        Self {
            known: Color::KNOWN,
            unknown: Color::UNKNOWN,
        }
    }
}

impl LabelPalette {
    pub fn for_label(&self, known: bool) -> Color {
        if known { self.known } else { self.unknown }
    }
}
