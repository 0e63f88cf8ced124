//! Controller driving detection, tracking, association and recognition.

use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::pacing::{FramePacer, Pacing};
use crate::tracker::{Color, Match, Rect, TrackedObject, TrackerFactory, TrackerPool, associate};

use super::recognition::{RecognitionScope, RecognitionSlot, Recognizer};
use super::{Detector, RenderFlow, Renderer};

/// The controller's current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Looking for objects on detection frames; nothing is tracked.
    #[default]
    Detecting,
    /// Following objects every frame, detecting newcomers periodically.
    Tracking,
}

/// Everything the renderer needs to know about one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Mode after processing this frame
    pub mode: Mode,
    /// Whether the detector ran on this frame
    pub detected: bool,
    /// Raw detector output, empty when the detector did not run
    pub detections: Vec<Rect>,
    /// Detections confirming already tracked objects. `slot` indexes
    /// `objects`.
    pub duplicates: Vec<Match>,
    /// Objects newly appended to tracking on this frame
    pub appended: usize,
    /// Tracking was lost on this frame and the controller fell back to
    /// detection
    pub tracking_failed: bool,
    /// Objects whose tracker failed on this frame, with their last box.
    /// They are gone from `objects`.
    pub lost: Vec<TrackedObject>,
    /// Tracked objects in slot order
    pub objects: Vec<TrackedObject>,
    /// Objects relabelled by a recognition result on this frame
    pub labels_applied: usize,
    pub recognition_pending: bool,
    /// What the latest recognition submission covered
    pub recognition_scope: Option<RecognitionScope>,
    /// Recognition tasks still queued or running, superseded ones included
    pub recognition_in_flight: usize,
}

impl FrameReport {
    fn new(frame_index: u64, mode: Mode) -> Self {
        Self {
            frame_index,
            mode,
            detected: false,
            detections: Vec::new(),
            duplicates: Vec::new(),
            appended: 0,
            tracking_failed: false,
            lost: Vec::new(),
            objects: Vec::new(),
            labels_applied: 0,
            recognition_pending: false,
            recognition_scope: None,
            recognition_in_flight: 0,
        }
    }
}

/// Result of [`Controller::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub mean_fps: Option<f64>,
}

/// Detect, track and recognize loop over a stream of frames.
///
/// All state is owned here and mutated only from the calling thread; the
/// recognizer is the only part that runs elsewhere.
pub struct Controller<F, D, K>
where
    K: TrackerFactory<F>,
{
    config: ControllerConfig,
    mode: Mode,
    frame_index: u64,
    detector: D,
    pool: TrackerPool<F, K>,
    recognizer: Arc<dyn Recognizer<F>>,
    recognition: RecognitionSlot,
    scope: Option<RecognitionScope>,
    rng: StdRng,
}

impl<F, D, K> Controller<F, D, K>
where
    F: Clone + Send + 'static,
    D: Detector<F>,
    K: TrackerFactory<F>,
{
    /// Create a controller from a validated configuration.
    pub fn new<R>(config: ControllerConfig, detector: D, factory: K, recognizer: R) -> Result<Self>
    where
        R: Recognizer<F>,
    {
        config.validate()?;

        let rng = match config.color_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let recognition =
            RecognitionSlot::new(config.recognition_deadline, config.recognition_workers)?;

        Ok(Self {
            pool: TrackerPool::new(factory, config.failure_policy),
            recognition,
            recognizer: Arc::new(recognizer),
            config,
            mode: Mode::Detecting,
            frame_index: 0,
            detector,
            scope: None,
            rng,
        })
    }

    /// Create a controller with the default configuration.
    pub fn with_default_config<R>(detector: D, factory: K, recognizer: R) -> Result<Self>
    where
        R: Recognizer<F>,
    {
        Self::new(ControllerConfig::default(), detector, factory, recognizer)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Index the next processed frame will get.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn pool(&self) -> &TrackerPool<F, K> {
        &self.pool
    }

    pub fn objects(&self) -> Vec<TrackedObject> {
        self.pool.objects()
    }

    pub fn is_recognition_pending(&self) -> bool {
        self.recognition.is_pending()
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get a mutable reference to the underlying detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Back to `Detecting` with an empty pool and frame index 0. An
    /// outstanding recognition result will not be collected.
    pub fn reset(&mut self) {
        self.pool.reset();
        self.mode = Mode::Detecting;
        self.frame_index = 0;
        self.recognition.abandon();
        self.scope = None;
    }

    /// Process one frame and report what happened.
    ///
    /// Never fails: detector errors count as "nothing found", lost tracking
    /// falls back to detection and bad recognition results are dropped.
    pub fn process_frame(&mut self, frame: &F) -> FrameReport {
        let index = self.frame_index;
        let detection_due = index % self.config.detection_stride == 0;
        let mut report = FrameReport::new(index, self.mode);

        match self.mode {
            Mode::Detecting => {
                if detection_due {
                    let boxes = self.detect(frame, &mut report);
                    self.start_tracking(frame, &boxes);
                }
            }
            Mode::Tracking => {
                let update = self.pool.update(frame);
                report.lost = update.lost;
                if !update.ok {
                    warn!(
                        frame = index,
                        lost = report.lost.len(),
                        "tracking failure, back to detection"
                    );
                    self.pool.reset();
                    self.mode = Mode::Detecting;
                    report.tracking_failed = true;
                } else if detection_due {
                    let boxes = self.detect(frame, &mut report);
                    self.reconcile(frame, &boxes, &mut report);
                }
            }
        }

        self.collect_recognition(&mut report);

        report.mode = self.mode;
        report.objects = self.pool.objects();
        report.recognition_pending = self.recognition.is_pending();
        report.recognition_scope = self.scope;
        report.recognition_in_flight = self.recognition.in_flight();
        self.frame_index += 1;
        report
    }

    /// Run the display loop until frames run out or the renderer stops it.
    pub fn run<I, R>(&mut self, frames: I, renderer: &mut R) -> RunSummary
    where
        I: IntoIterator<Item = F>,
        R: Renderer<F>,
    {
        let mut pacer = FramePacer::new(self.config.frame_budget);
        let mut processed = 0;

        for frame in frames {
            let started = Instant::now();
            let report = self.process_frame(&frame);
            processed += 1;

            let pacing = Pacing {
                wait: pacer.wait(),
                fps: pacer.fps(),
                processing: started.elapsed(),
            };
            let flow = renderer.render(&frame, &report, &pacing);
            pacer.record(started.elapsed());

            if flow == RenderFlow::Stop {
                info!(frames = processed, "stopped by renderer");
                break;
            }
        }

        info!(frames = processed, fps = ?pacer.fps(), "frame loop finished");
        RunSummary {
            frames: processed,
            mean_fps: pacer.fps(),
        }
    }

    fn detect(&mut self, frame: &F, report: &mut FrameReport) -> Vec<Rect> {
        report.detected = true;
        let boxes = match self.detector.detect(frame) {
            Ok(boxes) => boxes,
            Err(err) => {
                warn!(frame = report.frame_index, error = %err, "detector failed");
                Vec::new()
            }
        };
        report.detections = boxes.clone();
        boxes
    }

    fn start_tracking(&mut self, frame: &F, boxes: &[Rect]) {
        self.pool.reset();
        for bbox in boxes {
            let color = Color::random(&mut self.rng);
            self.pool.add(frame, *bbox, color);
        }

        if self.pool.is_empty() {
            return;
        }

        self.mode = Mode::Tracking;
        info!(
            frame = self.frame_index,
            objects = self.pool.len(),
            "tracking started"
        );
        self.submit_recognition(frame, RecognitionScope::for_fresh(self.pool.len()));
    }

    /// Append detections that overlap nothing tracked; leave the rest.
    fn reconcile(&mut self, frame: &F, boxes: &[Rect], report: &mut FrameReport) {
        let association = associate(&self.pool.boxes(), boxes, &self.config.thresholds);
        let has_new = association.has_new();
        report.duplicates = association.duplicates;
        if !has_new {
            return;
        }

        self.pool.reseed(frame);

        for &candidate in &association.new {
            let color = Color::random(&mut self.rng);
            if self.pool.add(frame, boxes[candidate], color).is_some() {
                report.appended += 1;
            }
        }

        info!(
            frame = report.frame_index,
            appended = report.appended,
            objects = self.pool.len(),
            "new objects joined tracking"
        );
        self.submit_recognition(frame, RecognitionScope::Appended);
    }

    fn submit_recognition(&mut self, frame: &F, scope: RecognitionScope) {
        self.recognition.submit(
            Arc::clone(&self.recognizer),
            frame.clone(),
            self.pool.boxes(),
            self.pool.ids(),
            scope,
        );
        self.scope = Some(scope);
    }

    fn collect_recognition(&mut self, report: &mut FrameReport) {
        match self.recognition.poll() {
            Some(Ok(outcome)) => {
                let applied =
                    self.pool
                        .apply_labels(&outcome.ids, &outcome.labels, &self.config.palette);
                debug!(
                    generation = outcome.generation,
                    applied,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "recognition labels applied"
                );
                report.labels_applied = applied;
            }
            Some(Err(err)) => {
                warn!(error = %err, "rejecting recognition result, keeping previous labels");
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::tracker::SingleObjectTracker;

    struct MockDetector {
        boxes: Vec<Rect>,
        calls: Vec<u64>,
    }

    impl Detector<u64> for MockDetector {
        type Error = std::convert::Infallible;

        fn detect(&mut self, frame: &u64) -> std::result::Result<Vec<Rect>, Self::Error> {
            self.calls.push(*frame);
            Ok(self.boxes.clone())
        }
    }

    struct StillTracker(Option<Rect>);

    impl SingleObjectTracker<u64> for StillTracker {
        fn init(&mut self, _frame: &u64, bbox: Rect) {
            self.0 = Some(bbox);
        }

        fn update(&mut self, _frame: &u64) -> Option<Rect> {
            self.0
        }
    }

    fn unknowns(_: &u64, boxes: &[Rect]) -> std::result::Result<Vec<String>, RecognitionError> {
        Ok(vec![crate::tracker::UNKNOWN_LABEL.to_string(); boxes.len()])
    }

    #[test]
    fn test_controller_pipeline() {
        let detector = MockDetector {
            boxes: vec![Rect::new(10.0, 20.0, 40.0, 60.0)],
            calls: Vec::new(),
        };

        let mut controller =
            Controller::with_default_config(detector, || StillTracker(None), unknowns).unwrap();
        assert_eq!(controller.mode(), Mode::Detecting);

        let report = controller.process_frame(&0);
        assert!(report.detected);
        assert_eq!(report.mode, Mode::Tracking);
        assert_eq!(report.objects.len(), 1);
        assert_eq!(report.recognition_scope, Some(RecognitionScope::Single));
    }

    #[test]
    fn test_detector_errors_count_as_empty() {
        struct Broken;

        impl Detector<u64> for Broken {
            type Error = String;

            fn detect(&mut self, _frame: &u64) -> std::result::Result<Vec<Rect>, String> {
                Err("model not loaded".to_string())
            }
        }

        let mut controller =
            Controller::with_default_config(Broken, || StillTracker(None), unknowns).unwrap();
        let report = controller.process_frame(&0);
        assert!(report.detected);
        assert!(report.detections.is_empty());
        assert_eq!(report.mode, Mode::Detecting);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ControllerConfig {
            detection_stride: 0,
            ..Default::default()
        };
        let detector = MockDetector {
            boxes: Vec::new(),
            calls: Vec::new(),
        };
        assert!(Controller::new(config, detector, || StillTracker(None), unknowns).is_err());
    }
}
