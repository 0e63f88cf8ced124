//! Single-object tracker abstraction the pool is built on.

use crate::tracker::rect::Rect;

/// One opaque single-object tracker (correlation filter, CSRT, KCF, ...).
///
/// Implementations are seeded once with `init` and then advanced one frame
/// at a time. Returning `None` from `update` means the object was lost.
pub trait SingleObjectTracker<F> {
    /// Seed the tracker with the object's box on `frame`.
    fn init(&mut self, frame: &F, bbox: Rect);

    /// Advance one frame and return the object's new box, if still found.
    fn update(&mut self, frame: &F) -> Option<Rect>;
}

/// Creates fresh tracker instances for the pool.
pub trait TrackerFactory<F> {
    type Tracker: SingleObjectTracker<F>;

    fn create(&mut self) -> Self::Tracker;
}

impl<F, T, C> TrackerFactory<F> for C
where
    C: FnMut() -> T,
    T: SingleObjectTracker<F>,
{
    type Tracker = T;

    fn create(&mut self) -> T {
        self()
    }
}
