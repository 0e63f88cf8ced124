//! Association of fresh detections with already tracked objects.

use serde::Deserialize;
use tracing::debug;

use crate::tracker::rect::{Rect, iou_batch};

/// IoU thresholds splitting candidates into duplicates and new objects.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssociationThresholds {
    /// A candidate whose best IoU is strictly above this is a duplicate.
    pub duplicate_iou: f32,
    /// A candidate whose best IoU is strictly below this is new.
    pub new_iou: f32,
}

impl Default for AssociationThresholds {
    fn default() -> Self {
        Self {
            duplicate_iou: 0.5,
            new_iou: 0.2,
        }
    }
}

/// A candidate confirmed as an object already in the pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Index into the candidate list
    pub candidate: usize,
    /// Index into the tracked list
    pub slot: usize,
    /// Overlap with that tracked box
    pub iou: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    pub duplicates: Vec<Match>,
    /// Candidate indices that overlap nothing tracked
    pub new: Vec<usize>,
    /// Candidate indices between the two thresholds. These are neither
    /// confirmed nor added.
    pub ambiguous: Vec<usize>,
}

impl Association {
    pub fn has_new(&self) -> bool {
        !self.new.is_empty()
    }
}

/// Classify every candidate against the tracked boxes by its best IoU.
///
/// Degenerate candidates are dropped before classification. With nothing
/// tracked, every remaining candidate is new.
pub fn associate(
    tracked: &[Rect],
    candidates: &[Rect],
    thresholds: &AssociationThresholds,
) -> Association {
    let mut result = Association::default();
    let ious = iou_batch(candidates, tracked);

    for (candidate, bbox) in candidates.iter().enumerate() {
        if bbox.is_degenerate() {
            continue;
        }

        let best = ious
            .row(candidate)
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (slot, iou)| match best {
                Some((_, best_iou)) if best_iou >= iou => best,
                _ => Some((slot, iou)),
            });

        match best {
            Some((slot, iou)) if iou > thresholds.duplicate_iou => {
                result.duplicates.push(Match {
                    candidate,
                    slot,
                    iou,
                });
            }
            Some((_, iou)) if iou >= thresholds.new_iou => {
                result.ambiguous.push(candidate);
            }
            _ => result.new.push(candidate),
        }
    }

    if !result.ambiguous.is_empty() {
        debug!(
            ambiguous = ?result.ambiguous,
            "dropping candidates inside the ambiguous overlap band"
        );
    }

    result
}
