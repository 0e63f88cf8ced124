//! Pool of independent single-object trackers, one per tracked object.

use std::marker::PhantomData;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::tracker::color::{Color, LabelPalette};
use crate::tracker::rect::Rect;
use crate::tracker::single::{SingleObjectTracker, TrackerFactory};
use crate::tracker::tracked_object::TrackedObject;

/// When a pool update counts as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail as soon as any single tracker loses its object.
    AnyLost,
    /// Fail only once every tracker has lost its object.
    #[default]
    AllLost,
}

/// Outcome of advancing every tracker by one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolUpdate {
    /// Whether the pool as a whole is still tracking, per `FailurePolicy`
    pub ok: bool,
    /// Latest box of every remaining slot, in insertion order
    pub boxes: Vec<Rect>,
    /// Objects whose tracker failed during this update, with their last
    /// box. They are no longer part of the pool.
    pub lost: Vec<TrackedObject>,
}

struct Slot<T> {
    tracker: T,
    object: TrackedObject,
}

pub struct TrackerPool<F, K: TrackerFactory<F>> {
    factory: K,
    slots: Vec<Slot<K::Tracker>>,
    next_id: u64,
    policy: FailurePolicy,
    _frame: PhantomData<fn(&F)>,
}

impl<F, K: TrackerFactory<F>> TrackerPool<F, K> {
    pub fn new(factory: K, policy: FailurePolicy) -> Self {
        Self {
            factory,
            slots: Vec::new(),
            next_id: 1,
            policy,
            _frame: PhantomData,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of every tracked object in slot order.
    pub fn objects(&self) -> Vec<TrackedObject> {
        self.slots.iter().map(|s| s.object.clone()).collect()
    }

    pub fn object(&self, index: usize) -> Option<&TrackedObject> {
        self.slots.get(index).map(|s| &s.object)
    }

    pub fn ids(&self) -> Vec<u64> {
        self.slots.iter().map(|s| s.object.id).collect()
    }

    /// Latest box of every slot, index-aligned with insertion order.
    pub fn boxes(&self) -> Vec<Rect> {
        self.slots.iter().map(|s| s.object.bbox).collect()
    }

    /// Drop every tracker and its object state.
    pub fn reset(&mut self) {
        if !self.slots.is_empty() {
            debug!(dropped = self.slots.len(), "tracker pool reset");
        }
        self.slots.clear();
    }

    /// Start tracking `bbox` on `frame`. Degenerate boxes are skipped.
    pub fn add(&mut self, frame: &F, bbox: Rect, color: Color) -> Option<u64> {
        if bbox.is_degenerate() {
            debug!(?bbox, "skipping degenerate seed box");
            return None;
        }

        let mut tracker = self.factory.create();
        tracker.init(frame, bbox);

        let id = self.next_id;
        self.next_id += 1;
        self.slots.push(Slot {
            tracker,
            object: TrackedObject::new(id, bbox, color),
        });
        Some(id)
    }

    /// Advance every tracker one step.
    ///
    /// A tracker that loses its object is destroyed together with the
    /// object; the survivors keep their relative order. An empty pool
    /// never reports success.
    pub fn update(&mut self, frame: &F) -> PoolUpdate {
        let mut lost = Vec::new();

        self.slots.retain_mut(|slot| match slot.tracker.update(frame) {
            Some(bbox) if !bbox.is_degenerate() => {
                slot.object.bbox = bbox;
                true
            }
            _ => {
                lost.push(slot.object.clone());
                false
            }
        });

        let ok = !self.slots.is_empty()
            && match self.policy {
                FailurePolicy::AnyLost => lost.is_empty(),
                FailurePolicy::AllLost => true,
            };

        if !lost.is_empty() {
            let ids: Vec<u64> = lost.iter().map(|o| o.id).collect();
            warn!(lost = ?ids, remaining = self.slots.len(), "trackers lost their objects");
        }

        PoolUpdate {
            ok,
            boxes: self.boxes(),
            lost,
        }
    }

    /// Re-seed every tracker on `frame` at its current box. Ids, colors
    /// and labels survive.
    pub fn reseed(&mut self, frame: &F) {
        for slot in self.slots.iter_mut() {
            let mut tracker = self.factory.create();
            tracker.init(frame, slot.object.bbox);
            slot.tracker = tracker;
        }
    }

    /// Assign `labels[i]` to the slot whose id is `ids[i]`.
    ///
    /// Slots that have left the pool since the ids were taken are skipped.
    /// Returns how many slots were relabelled.
    pub fn apply_labels(
        &mut self,
        ids: &[u64],
        labels: &[String],
        palette: &LabelPalette,
    ) -> usize {
        let mut applied = 0;
        for (id, label) in ids.iter().zip(labels) {
            if let Some(slot) = self.slots.iter_mut().find(|s| s.object.id == *id) {
                slot.object.set_label(label.as_str(), palette);
                applied += 1;
            }
        }
        applied
    }
}
