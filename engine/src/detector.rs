//! Landmark stream adapter: camera acquisition and per-frame detection.
//!
//! The camera and the detector are external.  [`CameraEnvironment`] opens
//! the camera (or reports why it cannot), [`CameraHandle`] yields frames and
//! [`LandmarkDetector`] turns a frame into at most one hand set and one pose
//! set.  [`LandmarkStream`] ties them together and is polled once per tick;
//! a tick without a fresh result is skipped, never queued.
//!
//! The `Scripted*` implementations stand in for the browser camera during
//! replay and tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::landmarks::Keypoint;
use crate::sexp::{bool_sexp, quote};

// ── Errors ─────────────────────────────────────────────────

/// Why gesture input could not start (or stopped).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Camera access needs a secure context.
    #[error("camera access requires a secure context")]
    InsecureContext,

    #[error("no camera found")]
    NoCamera,

    #[error("camera permission denied")]
    PermissionDenied,

    /// Another application holds the camera.
    #[error("camera already in use")]
    CameraInUse,

    /// Detector failed to load or failed mid-stream.
    #[error("landmark detector unavailable: {0}")]
    DetectorUnavailable(String),
}

impl CameraError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsecureContext => "insecure-context",
            Self::NoCamera => "no-camera",
            Self::PermissionDenied => "permission-denied",
            Self::CameraInUse => "camera-in-use",
            Self::DetectorUnavailable(_) => "detector-unavailable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "insecure-context" => Some(Self::InsecureContext),
            "no-camera" => Some(Self::NoCamera),
            "permission-denied" => Some(Self::PermissionDenied),
            "camera-in-use" => Some(Self::CameraInUse),
            "detector-unavailable" => Some(Self::DetectorUnavailable("unavailable".to_string())),
            _ => None,
        }
    }
}

// ── Contracts ──────────────────────────────────────────────

/// One camera frame, identified by a monotonically increasing sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHandle {
    pub sequence: u64,
    pub timestamp_ms: f64,
}

/// Landmarks found in one frame.  Either set may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// 21 hand landmarks.
    pub hand: Option<Vec<Keypoint>>,
    /// 33 pose landmarks.
    pub pose: Option<Vec<Keypoint>>,
}

/// A detection stamped with the camera time of its frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub detection: Detection,
    pub timestamp_ms: f64,
    /// Camera time since the previous detected frame; `None` for the first
    /// frame after a start.  Frames skipped in between are included.
    pub interval_ms: Option<f64>,
}

/// Result of asking the detector about a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorPoll {
    /// Detector still busy; skip this tick.
    NotReady,
    Frame(Detection),
    /// Detector broke; gesture input must stop.
    Failed(String),
}

/// Host environment that grants camera access.
pub trait CameraEnvironment {
    fn is_secure_context(&self) -> bool;

    fn open_camera(&mut self) -> Result<Box<dyn CameraHandle>, CameraError>;
}

/// An open camera stream.
pub trait CameraHandle {
    /// Latest frame, or `None` when no new frame is available.
    fn next_frame(&mut self) -> Option<FrameHandle>;

    /// Stop the stream; further frames are `None`.
    fn release(&mut self);
}

/// Hand/pose landmark detector.
pub trait LandmarkDetector {
    /// Load the model.  Called once per start.
    fn init(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn detect(&mut self, frame: &FrameHandle) -> DetectorPoll;
}

// ── Stream ─────────────────────────────────────────────────

/// Camera plus detector, polled once per tick.
pub struct LandmarkStream {
    environment: Box<dyn CameraEnvironment>,
    detector: Box<dyn LandmarkDetector>,
    camera: Option<Box<dyn CameraHandle>>,
    last_sequence: Option<u64>,
    /// Timestamp of the last frame that produced a detection.
    last_detected_ms: Option<f64>,
    /// Frames that produced a detection.
    frames: u64,
    /// Ticks skipped (no frame, stale frame, detector busy).
    dropped: u64,
}

impl LandmarkStream {
    pub fn new(environment: Box<dyn CameraEnvironment>, detector: Box<dyn LandmarkDetector>) -> Self {
        Self {
            environment,
            detector,
            camera: None,
            last_sequence: None,
            last_detected_ms: None,
            frames: 0,
            dropped: 0,
        }
    }

    /// Open the camera and load the detector.  Failures are returned as-is
    /// and leave the stream stopped.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.camera.is_some() {
            return Ok(());
        }
        if !self.environment.is_secure_context() {
            return Err(CameraError::InsecureContext);
        }
        self.detector.init()?;
        let camera = self.environment.open_camera()?;
        self.camera = Some(camera);
        self.last_sequence = None;
        self.last_detected_ms = None;
        info!("landmark stream started");
        Ok(())
    }

    /// Release the camera.  No-op when stopped.
    pub fn stop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.release();
            info!(
                "landmark stream stopped ({} frames, {} dropped)",
                self.frames, self.dropped
            );
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.camera.is_some()
    }

    /// Poll one tick.  `Ok(None)` means nothing new this tick.  A detector
    /// failure stops the stream and is returned.
    pub fn tick(&mut self) -> Result<Option<Sample>, CameraError> {
        let camera = match self.camera.as_mut() {
            Some(c) => c,
            None => return Ok(None),
        };
        let frame = match camera.next_frame() {
            Some(f) => f,
            None => {
                self.dropped += 1;
                return Ok(None);
            }
        };
        if self.last_sequence.map_or(false, |last| frame.sequence <= last) {
            trace!("stale frame {} dropped", frame.sequence);
            self.dropped += 1;
            return Ok(None);
        }
        self.last_sequence = Some(frame.sequence);

        match self.detector.detect(&frame) {
            DetectorPoll::NotReady => {
                self.dropped += 1;
                Ok(None)
            }
            DetectorPoll::Frame(detection) => {
                self.frames += 1;
                let interval_ms = self
                    .last_detected_ms
                    .map(|last| (frame.timestamp_ms - last).max(0.0));
                self.last_detected_ms = Some(frame.timestamp_ms);
                Ok(Some(Sample {
                    detection,
                    timestamp_ms: frame.timestamp_ms,
                    interval_ms,
                }))
            }
            DetectorPoll::Failed(reason) => {
                warn!("detector failed mid-stream: {}", reason);
                self.stop();
                Err(CameraError::DetectorUnavailable(reason))
            }
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:streaming {} :frames {} :dropped {})",
            bool_sexp(self.is_streaming()),
            self.frames,
            self.dropped
        )
    }
}

// ── Scripted implementations ───────────────────────────────

/// Shared detection feed for the scripted detector.  One-shot polls are
/// consumed first; otherwise the current detection repeats every frame.
#[derive(Debug, Default)]
pub struct FeedState {
    queued: VecDeque<DetectorPoll>,
    current: Option<Detection>,
}

/// Handle used by a driver to steer a [`ScriptedDetector`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    state: Rc<RefCell<FeedState>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detection returned on every frame from now on.
    pub fn set(&self, detection: Detection) {
        self.state.borrow_mut().current = Some(detection);
    }

    /// Nothing in view from now on.
    pub fn clear(&self) {
        self.state.borrow_mut().current = None;
    }

    /// Poll returned once, ahead of the current detection.
    pub fn push(&self, poll: DetectorPoll) {
        self.state.borrow_mut().queued.push_back(poll);
    }

    fn next(&self) -> DetectorPoll {
        let mut state = self.state.borrow_mut();
        if let Some(poll) = state.queued.pop_front() {
            return poll;
        }
        DetectorPoll::Frame(state.current.clone().unwrap_or_default())
    }
}

/// Detector answering from a [`ScriptedFeed`].
#[derive(Debug)]
pub struct ScriptedDetector {
    feed: ScriptedFeed,
    init_error: Option<CameraError>,
}

impl ScriptedDetector {
    pub fn new(feed: ScriptedFeed) -> Self {
        Self { feed, init_error: None }
    }

    /// Detector whose model never loads.
    pub fn failing(feed: ScriptedFeed, reason: &str) -> Self {
        Self {
            feed,
            init_error: Some(CameraError::DetectorUnavailable(reason.to_string())),
        }
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn init(&mut self) -> Result<(), CameraError> {
        match &self.init_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn detect(&mut self, _frame: &FrameHandle) -> DetectorPoll {
        self.feed.next()
    }
}

/// Environment with a configurable outcome for `open_camera`.
#[derive(Debug, Clone)]
pub struct ScriptedEnvironment {
    pub secure: bool,
    /// Error returned by `open_camera`, if any.
    pub failure: Option<CameraError>,
    /// Frame interval reported in timestamps (ms).
    pub frame_interval_ms: f64,
    opened: Rc<RefCell<u32>>,
}

impl Default for ScriptedEnvironment {
    fn default() -> Self {
        Self {
            secure: true,
            failure: None,
            frame_interval_ms: 16.0,
            opened: Rc::new(RefCell::new(0)),
        }
    }
}

impl ScriptedEnvironment {
    pub fn failing(error: CameraError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Number of cameras currently open.
    pub fn open_cameras(&self) -> u32 {
        *self.opened.borrow()
    }
}

impl CameraEnvironment for ScriptedEnvironment {
    fn is_secure_context(&self) -> bool {
        self.secure
    }

    fn open_camera(&mut self) -> Result<Box<dyn CameraHandle>, CameraError> {
        if let Some(e) = &self.failure {
            debug!("camera open refused: {}", e);
            return Err(e.clone());
        }
        *self.opened.borrow_mut() += 1;
        Ok(Box::new(ScriptedCamera {
            sequence: 0,
            interval_ms: self.frame_interval_ms,
            opened: Some(self.opened.clone()),
        }))
    }
}

/// Camera producing a new frame on every poll.
#[derive(Debug)]
pub struct ScriptedCamera {
    sequence: u64,
    interval_ms: f64,
    opened: Option<Rc<RefCell<u32>>>,
}

impl CameraHandle for ScriptedCamera {
    fn next_frame(&mut self) -> Option<FrameHandle> {
        self.opened.as_ref()?;
        self.sequence += 1;
        Some(FrameHandle {
            sequence: self.sequence,
            timestamp_ms: self.sequence as f64 * self.interval_ms,
        })
    }

    fn release(&mut self) {
        if let Some(opened) = self.opened.take() {
            let mut count = opened.borrow_mut();
            *count = count.saturating_sub(1);
        }
    }
}

/// Describe a camera error for event output.
pub fn error_sexp(error: &CameraError) -> String {
    format!("(:reason :{} :message {})", error.as_str(), quote(&error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(env: ScriptedEnvironment, feed: &ScriptedFeed) -> LandmarkStream {
        LandmarkStream::new(Box::new(env), Box::new(ScriptedDetector::new(feed.clone())))
    }

    #[test]
    fn test_start_and_stop_release_camera() {
        let env = ScriptedEnvironment::default();
        let feed = ScriptedFeed::new();
        let mut s = stream(env.clone(), &feed);
        s.start().unwrap();
        assert!(s.is_streaming());
        assert_eq!(env.open_cameras(), 1);
        s.stop();
        assert!(!s.is_streaming());
        assert_eq!(env.open_cameras(), 0);
    }

    #[test]
    fn test_environment_errors_are_distinct() {
        let feed = ScriptedFeed::new();
        let mut insecure = ScriptedEnvironment::default();
        insecure.secure = false;
        assert_eq!(stream(insecure, &feed).start(), Err(CameraError::InsecureContext));
        for e in [CameraError::NoCamera, CameraError::PermissionDenied, CameraError::CameraInUse] {
            let mut s = stream(ScriptedEnvironment::failing(e.clone()), &feed);
            assert_eq!(s.start(), Err(e));
            assert!(!s.is_streaming());
        }
    }

    #[test]
    fn test_detector_init_failure() {
        let feed = ScriptedFeed::new();
        let mut s = LandmarkStream::new(
            Box::new(ScriptedEnvironment::default()),
            Box::new(ScriptedDetector::failing(feed, "model missing")),
        );
        assert!(matches!(s.start(), Err(CameraError::DetectorUnavailable(_))));
        assert!(!s.is_streaming());
    }

    #[test]
    fn test_tick_yields_current_detection() {
        let feed = ScriptedFeed::new();
        let mut s = stream(ScriptedEnvironment::default(), &feed);
        assert_eq!(s.tick(), Ok(None));
        s.start().unwrap();
        assert_eq!(s.tick().unwrap().unwrap().detection, Detection::default());
        feed.set(Detection {
            hand: Some(vec![Keypoint::new(0.1, 0.2, 0.9)]),
            pose: None,
        });
        let d = s.tick().unwrap().unwrap().detection;
        assert_eq!(d.hand.map(|h| h.len()), Some(1));
    }

    #[test]
    fn test_not_ready_is_dropped() {
        let feed = ScriptedFeed::new();
        let mut s = stream(ScriptedEnvironment::default(), &feed);
        s.start().unwrap();
        feed.push(DetectorPoll::NotReady);
        assert_eq!(s.tick(), Ok(None));
        assert_eq!(s.dropped_count(), 1);
        assert!(s.tick().unwrap().is_some());
        assert_eq!(s.frame_count(), 1);
    }

    #[test]
    fn test_interval_spans_skipped_frames() {
        let feed = ScriptedFeed::new();
        let mut s = stream(ScriptedEnvironment::default(), &feed);
        s.start().unwrap();
        let first = s.tick().unwrap().unwrap();
        assert_eq!(first.timestamp_ms, 16.0);
        assert_eq!(first.interval_ms, None);
        feed.push(DetectorPoll::NotReady);
        feed.push(DetectorPoll::NotReady);
        assert_eq!(s.tick(), Ok(None));
        assert_eq!(s.tick(), Ok(None));
        let next = s.tick().unwrap().unwrap();
        assert_eq!(next.interval_ms, Some(48.0));

        // A restart forgets the previous frame.
        s.stop();
        s.start().unwrap();
        assert_eq!(s.tick().unwrap().unwrap().interval_ms, None);
    }

    #[test]
    fn test_mid_stream_failure_stops() {
        let env = ScriptedEnvironment::default();
        let feed = ScriptedFeed::new();
        let mut s = stream(env.clone(), &feed);
        s.start().unwrap();
        feed.push(DetectorPoll::Failed("gpu lost".to_string()));
        assert_eq!(s.tick(), Err(CameraError::DetectorUnavailable("gpu lost".to_string())));
        assert!(!s.is_streaming());
        assert_eq!(env.open_cameras(), 0);
    }

    #[test]
    fn test_error_names() {
        assert_eq!(CameraError::from_str("permission-denied"), Some(CameraError::PermissionDenied));
        assert!(error_sexp(&CameraError::NoCamera).contains(":reason :no-camera"));
    }
}
