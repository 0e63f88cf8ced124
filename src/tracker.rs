mod association;
mod color;
mod pool;
mod rect;
mod single;
mod tracked_object;

pub use association::{Association, AssociationThresholds, Match, associate};
pub use color::{Color, LabelPalette};
pub use pool::{FailurePolicy, PoolUpdate, TrackerPool};
pub use rect::{Rect, iou_batch};
pub use single::{SingleObjectTracker, TrackerFactory};
pub use tracked_object::{TrackedObject, UNKNOWN_LABEL};
