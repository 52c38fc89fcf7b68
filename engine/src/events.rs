//! Engine output events and the subscriber interface.

use crate::drag::{DropAttempt, HoverChange};
use crate::geometry::Point;
use crate::matching::MatchResult;
use crate::scoring::GameResult;
use crate::sexp::{bool_sexp, format_event, quote};

/// Everything the engine reports outward, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    HandDetected,
    HandLost,
    PinchStart { pos: Point },
    PinchEnd { pos: Point },
    HandMove { pos: Point, is_pinching: bool },
    /// A dragged entity entered or left a zone.
    HoverChange(HoverChange),
    /// A drag session closed.
    DropAttempt(DropAttempt),
    /// A card turned face-up.
    Revealed { entity_id: String },
    MatchResult(MatchResult),
    PoseProgress { target: String, held_ms: f64, required_ms: f64 },
    PoseConfirmed { target: String, index: usize },
    /// Gesture input stopped; `reason` says why (pause, toggle, failure).
    GestureStopped { reason: String },
    /// Level finished; emitted once.
    Complete(GameResult),
}

impl EngineEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandDetected => "hand-detected",
            Self::HandLost => "hand-lost",
            Self::PinchStart { .. } => "pinch-start",
            Self::PinchEnd { .. } => "pinch-end",
            Self::HandMove { .. } => "hand-move",
            Self::HoverChange(_) => "hover-change",
            Self::DropAttempt(_) => "drop-attempt",
            Self::Revealed { .. } => "revealed",
            Self::MatchResult(_) => "match-result",
            Self::PoseProgress { .. } => "pose-progress",
            Self::PoseConfirmed { .. } => "pose-confirmed",
            Self::GestureStopped { .. } => "gesture-stopped",
            Self::Complete(_) => "complete",
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
            Self::HoverChange(h) => h.to_sexp(),
            Self::DropAttempt(d) => d.to_sexp(),
            Self::Revealed { entity_id } => format_event(self.as_str(), &[("entity", &quote(entity_id))]),
            Self::MatchResult(r) => r.to_sexp(),
            Self::PoseProgress {
                target,
                held_ms,
                required_ms,
            } => format_event(
                self.as_str(),
                &[
                    ("target", &quote(target)),
                    ("held-ms", &format!("{:.0}", held_ms)),
                    ("required-ms", &format!("{:.0}", required_ms)),
                ],
            ),
            Self::PoseConfirmed { target, index } => format_event(
                self.as_str(),
                &[("target", &quote(target)), ("index", &index.to_string())],
            ),
            Self::GestureStopped { reason } => format_event(self.as_str(), &[("reason", &quote(reason))]),
            Self::Complete(r) => r.to_sexp(),
        }
    }
}

/// Subscriber for one running game.  Every method defaults to a no-op so
/// a variant only implements what it listens to.  An engine holds at most
/// one handler; registering another replaces it.
pub trait EngineHandler {
    fn on_hand_detected(&mut self) {}
    fn on_hand_lost(&mut self) {}
    fn on_pinch_start(&mut self, _pos: Point) {}
    fn on_pinch_end(&mut self, _pos: Point) {}
    fn on_hand_move(&mut self, _pos: Point, _is_pinching: bool) {}
    fn on_hover_change(&mut self, _change: &HoverChange) {}
    fn on_drop_attempt(&mut self, _attempt: &DropAttempt) {}
    fn on_match_result(&mut self, _result: &MatchResult) {}
    fn on_pose_confirmed(&mut self, _target: &str, _index: usize) {}
    fn on_complete(&mut self, _result: &GameResult) {}
}

/// Route one event to the matching handler method.
pub fn dispatch(handler: &mut dyn EngineHandler, event: &EngineEvent) {
    match event {
        EngineEvent::HandDetected => handler.on_hand_detected(),
        EngineEvent::HandLost => handler.on_hand_lost(),
        EngineEvent::PinchStart { pos } => handler.on_pinch_start(*pos),
        EngineEvent::PinchEnd { pos } => handler.on_pinch_end(*pos),
        EngineEvent::HandMove { pos, is_pinching } => handler.on_hand_move(*pos, *is_pinching),
        EngineEvent::HoverChange(h) => handler.on_hover_change(h),
        EngineEvent::DropAttempt(d) => handler.on_drop_attempt(d),
        EngineEvent::MatchResult(r) => handler.on_match_result(r),
        EngineEvent::PoseConfirmed { target, index } => handler.on_pose_confirmed(target, *index),
        EngineEvent::Complete(r) => handler.on_complete(r),
        EngineEvent::Revealed { .. } | EngineEvent::PoseProgress { .. } | EngineEvent::GestureStopped { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        pinches: u32,
        completes: u32,
    }

    impl EngineHandler for Counter {
        fn on_pinch_start(&mut self, _pos: Point) {
            self.pinches += 1;
        }

        fn on_complete(&mut self, _result: &GameResult) {
            self.completes += 1;
        }
    }

    #[test]
    fn test_dispatch_routes_and_defaults() {
        let mut c = Counter::default();
        dispatch(&mut c, &EngineEvent::PinchStart { pos: Point::new(1.0, 1.0) });
        dispatch(&mut c, &EngineEvent::HandLost);
        dispatch(
            &mut c,
            &EngineEvent::Complete(GameResult {
                score: 1,
                stars: 1,
                elapsed_ms: 0,
                mistakes: 0,
                accuracy: 1.0,
            }),
        );
        assert_eq!(c.pinches, 1);
        assert_eq!(c.completes, 1);
    }

    #[test]
    fn test_event_sexp() {
        let e = EngineEvent::PoseConfirmed {
            target: "nose".to_string(),
            index: 2,
        };
        assert_eq!(
            e.to_sexp(),
            "(:type :event :event :pose-confirmed :target \"nose\" :index 2)"
        );
        let e = EngineEvent::GestureStopped {
            reason: "pause".to_string(),
        };
        assert!(e.to_sexp().contains(":reason \"pause\""));
    }
}
