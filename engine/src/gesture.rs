//! Gesture recognition from hand landmark sets.
//!
//! Smooths the index fingertip into a screen-space cursor, thresholds the
//! thumb-to-index distance into a pinch, and emits discrete events.
//! A frame whose designated keypoints fall below the visibility threshold
//! counts as "no hand" for that frame.

use tracing::debug;

use crate::geometry::Point;
use crate::landmarks::{HandLandmark, Keypoint};
use crate::sexp::{bool_sexp, format_event};

// ── Pinch state ────────────────────────────────────────────

/// Pinch state of the tracked hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinchState {
    #[default]
    Open,
    Pinched,
}

impl PinchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pinched => "pinched",
        }
    }
}

// ── Events ─────────────────────────────────────────────────

/// Events emitted by gesture recognition, in per-frame order:
/// `HandDetected`, then any pinch transition, then `HandMove`.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    /// First usable frame after a gap.
    HandDetected,
    /// First unusable frame after the hand was detected.
    HandLost,
    /// Open → Pinched.
    PinchStart { pos: Point },
    /// Pinched → Open.
    PinchEnd { pos: Point },
    /// Every usable frame.
    HandMove { pos: Point, is_pinching: bool },
}

impl GestureEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandDetected => "hand-detected",
            Self::HandLost => "hand-lost",
            Self::PinchStart { .. } => "pinch-start",
            Self::PinchEnd { .. } => "pinch-end",
            Self::HandMove { .. } => "hand-move",
        }
    }

    pub fn to_sexp(&self) -> String {
        match self {
            Self::HandDetected | Self::HandLost => format_event(self.as_str(), &[]),
            Self::PinchStart { pos } | Self::PinchEnd { pos } => format_event(
                self.as_str(),
                &[("x", &format!("{:.1}", pos.x)), ("y", &format!("{:.1}", pos.y))],
            ),
            Self::HandMove { pos, is_pinching } => format_event(
                self.as_str(),
                &[
                    ("x", &format!("{:.1}", pos.x)),
                    ("y", &format!("{:.1}", pos.y)),
                    ("pinching", bool_sexp(*is_pinching)),
                ],
            ),
        }
    }
}

// ── Config ─────────────────────────────────────────────────

/// Configuration for cursor smoothing and pinch thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Enable gesture recognition.
    pub enabled: bool,
    /// EMA smoothing factor α in (0, 1]; 1.0 disables smoothing.
    pub smoothing: f32,
    /// Normalized thumb-to-index distance below which the hand pinches.
    pub pinch_threshold: f32,
    /// Normalized distance at or above which a pinch releases.
    /// `None` reuses `pinch_threshold` (single symmetric threshold).
    pub release_threshold: Option<f32>,
    /// Minimum keypoint confidence for a usable frame.
    pub visibility_threshold: f32,
    /// Include `z` in the pinch distance when both keypoints carry it.
    pub use_depth: bool,
    /// Mirror x for a selfie-facing camera.
    pub mirror_x: bool,
    /// Screen width the normalized cursor maps to.
    pub viewport_width: f32,
    /// Screen height the normalized cursor maps to.
    pub viewport_height: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smoothing: 0.3,
            pinch_threshold: 0.08,
            release_threshold: None,
            visibility_threshold: 0.5,
            use_depth: true,
            mirror_x: true,
            viewport_width: 1280.0,
            viewport_height: 720.0,
        }
    }
}

impl GestureConfig {
    /// Effective release threshold.
    pub fn release_threshold(&self) -> f32 {
        self.release_threshold.unwrap_or(self.pinch_threshold)
    }

    pub fn config_sexp(&self) -> String {
        format!(
            "(:enabled {} :smoothing {:.2} :pinch-threshold {:.3} :release-threshold {:.3} :visibility-threshold {:.2} :use-depth {} :mirror-x {} :viewport ({:.0} {:.0}))",
            bool_sexp(self.enabled),
            self.smoothing,
            self.pinch_threshold,
            self.release_threshold(),
            self.visibility_threshold,
            bool_sexp(self.use_depth),
            bool_sexp(self.mirror_x),
            self.viewport_width,
            self.viewport_height,
        )
    }
}

// ── Tracked point ──────────────────────────────────────────

/// Exponentially smoothed screen-space position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackedPoint {
    smoothed: Option<Point>,
}

impl TrackedPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a raw sample in: `smoothed += α·(raw − smoothed)`.
    /// The first sample after a reset seeds the point directly.
    pub fn update(&mut self, raw: Point, alpha: f32) -> Point {
        let next = match self.smoothed {
            Some(s) => Point::new(s.x + alpha * (raw.x - s.x), s.y + alpha * (raw.y - s.y)),
            None => raw,
        };
        self.smoothed = Some(next);
        next
    }

    pub fn position(&self) -> Option<Point> {
        self.smoothed
    }

    pub fn reset(&mut self) {
        self.smoothed = None;
    }
}

// ── Recognizer ─────────────────────────────────────────────

/// Single-hand gesture recognizer.
pub struct GestureRecognizer {
    /// Configuration.
    pub config: GestureConfig,
    /// Smoothed index fingertip.
    tracked: TrackedPoint,
    /// Current pinch state; survives detection gaps.
    pinch: PinchState,
    /// Recognizer clock (ms) at the last Open → Pinched transition.
    pinch_start_ms: f64,
    /// Accumulated recognizer time (ms).
    clock_ms: f64,
    /// Whether the previous frame had a usable hand.
    hand_present: bool,
    /// Last computed pinch distance.
    last_distance: Option<f32>,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            tracked: TrackedPoint::new(),
            pinch: PinchState::Open,
            pinch_start_ms: 0.0,
            clock_ms: 0.0,
            hand_present: false,
            last_distance: None,
        }
    }

    /// Process one frame's hand set (or `None` when the detector found no
    /// hand) and return the resulting events.
    pub fn update(&mut self, hand: Option<&[Keypoint]>, dt_ms: f64) -> Vec<GestureEvent> {
        self.clock_ms += dt_ms.max(0.0);
        let mut events = Vec::new();
        if !self.config.enabled {
            return events;
        }

        let (index_tip, thumb_tip) = match hand.and_then(|set| self.usable_points(set)) {
            Some(points) => points,
            None => {
                self.tracked.reset();
                self.last_distance = None;
                if self.hand_present {
                    self.hand_present = false;
                    debug!("hand lost (pinch state {} kept)", self.pinch.as_str());
                    events.push(GestureEvent::HandLost);
                }
                return events;
            }
        };

        if !self.hand_present {
            self.hand_present = true;
            debug!("hand detected");
            events.push(GestureEvent::HandDetected);
        }

        let pos = self.tracked.update(self.to_screen(&index_tip), self.config.smoothing);

        let distance = if self.config.use_depth {
            thumb_tip.distance_3d(&index_tip)
        } else {
            thumb_tip.distance_2d(&index_tip)
        };
        self.last_distance = Some(distance);

        match self.pinch {
            PinchState::Open if distance < self.config.pinch_threshold => {
                self.pinch = PinchState::Pinched;
                self.pinch_start_ms = self.clock_ms;
                debug!("pinch start at ({:.1}, {:.1}) d={:.3}", pos.x, pos.y, distance);
                events.push(GestureEvent::PinchStart { pos });
            }
            PinchState::Pinched if distance >= self.config.release_threshold() => {
                self.pinch = PinchState::Open;
                debug!(
                    "pinch end at ({:.1}, {:.1}) after {:.0}ms",
                    pos.x,
                    pos.y,
                    self.clock_ms - self.pinch_start_ms
                );
                events.push(GestureEvent::PinchEnd { pos });
            }
            _ => {}
        }

        events.push(GestureEvent::HandMove {
            pos,
            is_pinching: self.pinch == PinchState::Pinched,
        });
        events
    }

    /// Index and thumb tips when both clear the visibility threshold.
    fn usable_points(&self, set: &[Keypoint]) -> Option<(Keypoint, Keypoint)> {
        let index_tip = *set.get(HandLandmark::IndexTip.index())?;
        let thumb_tip = *set.get(HandLandmark::ThumbTip.index())?;
        let threshold = self.config.visibility_threshold;
        if index_tip.is_visible(threshold) && thumb_tip.is_visible(threshold) {
            Some((index_tip, thumb_tip))
        } else {
            None
        }
    }

    /// Map a normalized keypoint to screen space.
    fn to_screen(&self, k: &Keypoint) -> Point {
        let nx = if self.config.mirror_x { 1.0 - k.x } else { k.x };
        Point::new(nx * self.config.viewport_width, k.y * self.config.viewport_height)
    }

    pub fn pinch_state(&self) -> PinchState {
        self.pinch
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch == PinchState::Pinched
    }

    pub fn hand_present(&self) -> bool {
        self.hand_present
    }

    /// Last smoothed cursor position, if the hand is tracked.
    pub fn position(&self) -> Option<Point> {
        self.tracked.position()
    }

    /// How long the current pinch has been held (0 when open).
    pub fn pinch_hold_ms(&self) -> f64 {
        match self.pinch {
            PinchState::Pinched => self.clock_ms - self.pinch_start_ms,
            PinchState::Open => 0.0,
        }
    }

    /// Reset all gesture state.
    pub fn reset(&mut self) {
        self.tracked.reset();
        self.pinch = PinchState::Open;
        self.pinch_start_ms = 0.0;
        self.hand_present = false;
        self.last_distance = None;
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        let pos = self
            .tracked
            .position()
            .map(|p| p.to_sexp())
            .unwrap_or_else(|| "nil".to_string());
        let distance = self
            .last_distance
            .map(|d| format!("{:.3}", d))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:enabled {} :hand {} :pinch :{} :hold-ms {:.0} :distance {} :pos {})",
            bool_sexp(self.config.enabled),
            bool_sexp(self.hand_present),
            self.pinch.as_str(),
            self.pinch_hold_ms(),
            distance,
            pos,
        )
    }

    /// Generate s-expression for the active configuration.
    pub fn config_sexp(&self) -> String {
        self.config.config_sexp()
    }
}

// ── Test helpers ───────────────────────────────────────────

/// A full 21-point hand with the index tip at (x, y) and the thumb tip
/// `gap` to its right, all at the given confidence.
#[cfg(test)]
pub(crate) fn make_hand(x: f32, y: f32, gap: f32, confidence: f32) -> Vec<Keypoint> {
    use crate::landmarks::HAND_LANDMARK_COUNT;

    let mut set = vec![Keypoint::new(0.5, 0.8, confidence); HAND_LANDMARK_COUNT];
    set[HandLandmark::IndexTip.index()] = Keypoint::new(x, y, confidence).with_z(0.0);
    set[HandLandmark::ThumbTip.index()] = Keypoint::new(x + gap, y, confidence).with_z(0.0);
    set
}

// ── Tests ──────────────────────────────────────────────────
