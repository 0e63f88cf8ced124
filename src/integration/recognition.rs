//! Asynchronous recognition with a single outstanding task.
//!
//! Recognition runs on a small fixed pool of worker threads so the frame
//! loop never waits for it. The controller keeps one handle; a newer
//! submission supersedes the older one without cancelling it. Every
//! worker reports on one shared channel, tagged with the generation of
//! its submission, and only the latest generation is ever applied.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::error::RecognitionError;
use crate::tracker::Rect;

/// Labels the objects inside `boxes` on `frame`.
///
/// Runs off the control thread. The output is index-aligned with `boxes`.
/// Reference data (known faces, embeddings) belongs to the implementation
/// and is loaded once, before the controller starts.
pub trait Recognizer<F>: Send + Sync + 'static {
    fn recognize(&self, frame: &F, boxes: &[Rect]) -> Result<Vec<String>, RecognitionError>;
}

impl<F, C> Recognizer<F> for C
where
    C: Fn(&F, &[Rect]) -> Result<Vec<String>, RecognitionError> + Send + Sync + 'static,
{
    fn recognize(&self, frame: &F, boxes: &[Rect]) -> Result<Vec<String>, RecognitionError> {
        self(frame, boxes)
    }
}

/// What the outstanding recognition task covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionScope {
    /// One freshly detected object
    Single,
    /// Several freshly detected objects
    Multiple,
    /// Tracked objects plus newly appended ones
    Appended,
}

impl RecognitionScope {
    pub fn for_fresh(count: usize) -> Self {
        if count > 1 {
            RecognitionScope::Multiple
        } else {
            RecognitionScope::Single
        }
    }
}

/// A validated result, ready to be applied to the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutcome {
    pub generation: u64,
    pub scope: RecognitionScope,
    /// Ids of the tracked objects the task was submitted for
    pub ids: Vec<u64>,
    /// One label per id, same order
    pub labels: Vec<String>,
    pub elapsed: Duration,
}

struct Delivery {
    generation: u64,
    result: Result<Vec<String>, RecognitionError>,
}

struct Pending {
    generation: u64,
    scope: RecognitionScope,
    ids: Vec<u64>,
    started: Instant,
    overdue_reported: bool,
}

/// Single-slot handle over at most one outstanding recognition task.
pub struct RecognitionSlot {
    pending: Option<Pending>,
    generation: u64,
    deadline: Duration,
    superseded: u64,
    discarded: u64,
    workers: ThreadPool,
    in_flight: Arc<AtomicUsize>,
    sender: Sender<Delivery>,
    results: Receiver<Delivery>,
}

impl RecognitionSlot {
    /// Create a slot backed by `workers` recognition threads.
    ///
    /// At most `workers` recognizers run at once; further submissions
    /// queue until a thread frees up.
    pub fn new(deadline: Duration, workers: usize) -> crate::Result<Self> {
        let workers = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("recognition-{i}"))
            .build()?;
        let (sender, results) = unbounded();

        Ok(Self {
            pending: None,
            generation: 0,
            deadline,
            superseded: 0,
            discarded: 0,
            workers,
            in_flight: Arc::new(AtomicUsize::new(0)),
            sender,
            results,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Scope of the outstanding task, if any.
    pub fn scope(&self) -> Option<RecognitionScope> {
        self.pending.as_ref().map(|p| p.scope)
    }

    /// Generation of the most recent submission (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// How many tasks were replaced before their result was collected.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    /// How many results arrived for a task that was no longer wanted.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Submitted tasks that have not finished yet, queued or running,
    /// superseded ones included.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Upper bound on recognizers running at the same time.
    pub fn workers(&self) -> usize {
        self.workers.current_num_threads()
    }

    /// Start recognizing `boxes` on `frame` in the background.
    ///
    /// `ids` are the tracked objects the boxes belong to, in the same
    /// order. Any outstanding task is superseded: it runs to completion
    /// but its result is dropped. Returns the new generation.
    pub fn submit<F>(
        &mut self,
        recognizer: Arc<dyn Recognizer<F>>,
        frame: F,
        boxes: Vec<Rect>,
        ids: Vec<u64>,
        scope: RecognitionScope,
    ) -> u64
    where
        F: Send + 'static,
    {
        if let Some(old) = self.pending.take() {
            self.superseded += 1;
            info!(
                generation = old.generation,
                age_ms = old.started.elapsed().as_millis() as u64,
                in_flight = self.in_flight(),
                "superseding outstanding recognition task"
            );
        }

        self.generation += 1;
        let generation = self.generation;
        let sender = self.sender.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        self.workers.spawn(move || {
            let result =
                panic::catch_unwind(AssertUnwindSafe(|| recognizer.recognize(&frame, &boxes)))
                    .unwrap_or(Err(RecognitionError::Panicked));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            // The slot may be gone already.
            let _ = sender.send(Delivery { generation, result });
        });

        debug!(generation, objects = ids.len(), ?scope, "recognition submitted");
        self.pending = Some(Pending {
            generation,
            scope,
            ids,
            started: Instant::now(),
            overdue_reported: false,
        });
        generation
    }

    /// Forget the outstanding task. Its result is discarded on arrival.
    pub fn abandon(&mut self) {
        if let Some(old) = self.pending.take() {
            debug!(generation = old.generation, "recognition task abandoned");
        }
    }

    /// Collect the outstanding result without blocking.
    ///
    /// Returns `None` while nothing is ready. A finished task yields
    /// either a validated outcome or the reason it was rejected; in both
    /// cases the slot is free again. Results of superseded or abandoned
    /// tasks are drained and dropped.
    pub fn poll(&mut self) -> Option<Result<RecognitionOutcome, RecognitionError>> {
        let current = self.pending.as_ref().map(|p| p.generation);

        let delivery = loop {
            match self.results.try_recv() {
                Ok(delivery) if Some(delivery.generation) == current => break delivery,
                Ok(delivery) => {
                    self.discarded += 1;
                    debug!(
                        generation = delivery.generation,
                        latest = self.generation,
                        "ignoring stale recognition result"
                    );
                }
                // The slot holds a sender, so the channel never disconnects.
                Err(_) => {
                    self.report_overdue();
                    return None;
                }
            }
        };

        let pending = self.pending.take()?;
        let labels = match delivery.result {
            Ok(labels) => labels,
            Err(err) => return Some(Err(err)),
        };
        if let Err(err) = validate_labels(&labels, pending.ids.len()) {
            return Some(Err(err));
        }

        Some(Ok(RecognitionOutcome {
            generation: pending.generation,
            scope: pending.scope,
            ids: pending.ids,
            labels,
            elapsed: pending.started.elapsed(),
        }))
    }

    fn report_overdue(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let age = pending.started.elapsed();
        if age > self.deadline && !pending.overdue_reported {
            pending.overdue_reported = true;
            warn!(
                generation = pending.generation,
                age_ms = age.as_millis() as u64,
                "recognition is overdue, still waiting"
            );
        }
    }
}

fn validate_labels(labels: &[String], expected: usize) -> Result<(), RecognitionError> {
    if labels.len() != expected {
        return Err(RecognitionError::LabelCount {
            expected,
            got: labels.len(),
        });
    }
    if let Some(index) = labels.iter().position(|l| l.trim().is_empty()) {
        return Err(RecognitionError::EmptyLabel { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crossbeam_channel::bounded;

    fn slot() -> RecognitionSlot {
        RecognitionSlot::new(Duration::from_secs(1), 4).unwrap()
    }

    fn wait_for(slot: &mut RecognitionSlot) -> Result<RecognitionOutcome, RecognitionError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = slot.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "recognition never finished");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "condition never held");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn fixed(labels: &'static [&'static str]) -> Arc<dyn Recognizer<()>> {
        Arc::new(
            move |_: &(), _: &[Rect]| -> Result<Vec<String>, RecognitionError> {
                Ok(labels.iter().map(|l| l.to_string()).collect())
            },
        )
    }

    /// Recognizer that blocks until the test releases it.
    fn gated(label: &'static str) -> (Arc<dyn Recognizer<()>>, Sender<()>) {
        let (release, gate) = bounded::<()>(1);
        let recognizer = move |_: &(), boxes: &[Rect]| -> Result<Vec<String>, RecognitionError> {
            let _ = gate.recv();
            Ok(vec![label.to_string(); boxes.len()])
        };
        (Arc::new(recognizer), release)
    }

    fn one_box() -> Vec<Rect> {
        vec![Rect::new(0.0, 0.0, 10.0, 10.0)]
    }

    #[test]
    fn test_poll_without_task() {
        let mut slot = slot();
        assert!(slot.poll().is_none());
        assert!(!slot.is_pending());
        assert_eq!(slot.in_flight(), 0);
        assert_eq!(slot.workers(), 4);
    }

    #[test]
    fn test_result_is_index_aligned() {
        let mut slot = slot();
        let boxes = vec![Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(20.0, 0.0, 10.0, 10.0)];
        let generation = slot.submit(
            fixed(&["Alice", "Unknown"]),
            (),
            boxes,
            vec![3, 4],
            RecognitionScope::Multiple,
        );
        assert_eq!(generation, 1);

        let outcome = wait_for(&mut slot).unwrap();
        assert_eq!(outcome.ids, vec![3, 4]);
        assert_eq!(outcome.labels, vec!["Alice".to_string(), "Unknown".to_string()]);
        assert_eq!(outcome.scope, RecognitionScope::Multiple);
        assert!(!slot.is_pending());
    }

    #[test]
    fn test_poll_does_not_block() {
        let mut slot = slot();
        let (recognizer, release) = gated("Alice");
        slot.submit(recognizer, (), one_box(), vec![1], RecognitionScope::Single);

        assert!(slot.poll().is_none());
        assert!(slot.is_pending());
        assert_eq!(slot.in_flight(), 1);

        release.send(()).unwrap();
        assert_eq!(wait_for(&mut slot).unwrap().labels, vec!["Alice".to_string()]);
        assert_eq!(slot.in_flight(), 0);
    }

    #[test]
    fn test_superseded_result_is_never_applied() {
        let mut slot = slot();
        let (first, release_first) = gated("Old");
        let (second, release_second) = gated("New");

        slot.submit(first, (), one_box(), vec![1], RecognitionScope::Single);
        slot.submit(second, (), one_box(), vec![1], RecognitionScope::Appended);
        assert_eq!(slot.superseded(), 1);
        assert_eq!(slot.scope(), Some(RecognitionScope::Appended));

        // The superseded worker finishes first and reports on the shared
        // channel; its result must be dropped, not applied.
        release_first.send(()).unwrap();
        wait_until(|| slot.poll().is_none() && slot.discarded() == 1);
        assert!(slot.is_pending());
        assert_eq!(slot.in_flight(), 1);

        release_second.send(()).unwrap();
        let outcome = wait_for(&mut slot).unwrap();
        assert_eq!(outcome.generation, 2);
        assert_eq!(outcome.labels, vec!["New".to_string()]);
    }

    #[test]
    fn test_abandoned_result_is_dropped() {
        let mut slot = slot();
        let (recognizer, release) = gated("Gone");
        slot.submit(recognizer, (), one_box(), vec![1], RecognitionScope::Single);
        slot.abandon();
        assert!(!slot.is_pending());

        release.send(()).unwrap();
        wait_until(|| slot.poll().is_none() && slot.discarded() == 1);
        assert_eq!(slot.in_flight(), 0);
    }

    #[test]
    fn test_concurrent_workers_are_capped() {
        let mut slot = RecognitionSlot::new(Duration::from_secs(1), 2).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let recognizer: Arc<dyn Recognizer<()>> = {
            let (active, peak) = (Arc::clone(&active), Arc::clone(&peak));
            Arc::new(
                move |_: &(), boxes: &[Rect]| -> Result<Vec<String>, RecognitionError> {
                    let running = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(running, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(vec!["Busy".to_string(); boxes.len()])
                },
            )
        };

        for _ in 0..12 {
            let recognizer = Arc::clone(&recognizer);
            slot.submit(recognizer, (), one_box(), vec![1], RecognitionScope::Single);
        }
        assert_eq!(slot.superseded(), 11);
        assert!(slot.in_flight() > 2);

        let outcome = wait_for(&mut slot).unwrap();
        assert_eq!(outcome.generation, 12);
        wait_until(|| slot.in_flight() == 0);

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(peak <= 2, "{peak} recognizers ran at once");
    }

    #[test]
    fn test_panicking_recognizer_is_rejected() {
        let mut slot = slot();
        let panicking: Arc<dyn Recognizer<()>> = Arc::new(
            |_: &(), _: &[Rect]| -> Result<Vec<String>, RecognitionError> {
                panic!("model crashed")
            },
        );
        slot.submit(panicking, (), one_box(), vec![1], RecognitionScope::Single);
        assert_eq!(wait_for(&mut slot), Err(RecognitionError::Panicked));
        assert_eq!(slot.in_flight(), 0);
    }

    #[test]
    fn test_label_count_mismatch_rejected() {
        let mut slot = slot();
        slot.submit(fixed(&["Alice"]), (), one_box(), vec![1, 2], RecognitionScope::Multiple);
        assert_eq!(
            wait_for(&mut slot),
            Err(RecognitionError::LabelCount {
                expected: 2,
                got: 1
            })
        );
        assert!(!slot.is_pending());
    }

    #[test]
    fn test_empty_label_rejected() {
        let mut slot = slot();
        slot.submit(fixed(&["Alice", " "]), (), one_box(), vec![1, 2], RecognitionScope::Multiple);
        assert_eq!(wait_for(&mut slot), Err(RecognitionError::EmptyLabel { index: 1 }));
    }

    #[test]
    fn test_recognizer_error_surfaces() {
        let mut slot = slot();
        let failing: Arc<dyn Recognizer<()>> = Arc::new(
            |_: &(), _: &[Rect]| -> Result<Vec<String>, RecognitionError> {
                Err(RecognitionError::Recognizer("no reference faces".to_string()))
            },
        );
        slot.submit(failing, (), one_box(), vec![1], RecognitionScope::Single);
        assert!(matches!(wait_for(&mut slot), Err(RecognitionError::Recognizer(_))));
    }

    #[test]
    fn test_overdue_task_keeps_running() {
        let mut slot = RecognitionSlot::new(Duration::from_millis(1), 1).unwrap();
        let (recognizer, release) = gated("Late");
        slot.submit(recognizer, (), one_box(), vec![1], RecognitionScope::Single);

        thread::sleep(Duration::from_millis(10));
        assert!(slot.poll().is_none());
        assert!(slot.is_pending());

        release.send(()).unwrap();
        assert_eq!(wait_for(&mut slot).unwrap().labels, vec!["Late".to_string()]);
    }

    #[test]
    fn test_scope_for_fresh() {
        assert_eq!(RecognitionScope::for_fresh(1), RecognitionScope::Single);
        assert_eq!(RecognitionScope::for_fresh(3), RecognitionScope::Multiple);
    }
}
