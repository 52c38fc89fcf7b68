//! Pointer unification: mouse, touch and gesture input normalized into a
//! single Acquire → Move* → Release stream per source.
//!
//! Malformed sequences are absorbed here: a release with nothing open is
//! dropped, a second acquire synthesizes a release first, and a move with
//! nothing open is hover and never reaches drag handling.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, trace};

use crate::geometry::Point;
use crate::gesture::GestureEvent;
use crate::sexp::format_event;

// ── Sources ────────────────────────────────────────────────

/// Input origin of a pointer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointerSource {
    Mouse,
    /// Touch contact keyed by the platform's touch identifier.
    Touch(u64),
    /// Tracked hand; single-hand tracking only ever uses index 0.
    Gesture(u8),
}

impl PointerSource {
    pub fn is_gesture(&self) -> bool {
        matches!(self, Self::Gesture(_))
    }

    /// Parse `mouse`, `touch:<id>` or `gesture:<hand>`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.split_once(':') {
            None if s == "mouse" => Some(Self::Mouse),
            Some(("touch", id)) => id.parse().ok().map(Self::Touch),
            Some(("gesture", hand)) => hand.parse().ok().map(Self::Gesture),
            _ => None,
        }
    }
}

impl fmt::Display for PointerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mouse => write!(f, "mouse"),
            Self::Touch(id) => write!(f, "touch:{}", id),
            Self::Gesture(hand) => write!(f, "gesture:{}", hand),
        }
    }
}

// ── Raw input ──────────────────────────────────────────────

/// Input as delivered by the host, before unification.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    MouseDown(Point),
    MouseMove(Point),
    MouseUp(Point),
    TouchStart { id: u64, pos: Point },
    TouchMove { id: u64, pos: Point },
    TouchEnd { id: u64, pos: Point },
    /// Contact cancelled by the platform; released at its last position.
    TouchCancel { id: u64 },
    Gesture(GestureEvent),
}

// ── Unified events ─────────────────────────────────────────

/// Canonical pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Acquire { source: PointerSource, pos: Point },
    Move { source: PointerSource, pos: Point },
    Release { source: PointerSource, pos: Point },
}

impl PointerEvent {
    pub fn source(&self) -> PointerSource {
        match self {
            Self::Acquire { source, .. } | Self::Move { source, .. } | Self::Release { source, .. } => {
                *source
            }
        }
    }

    pub fn pos(&self) -> Point {
        match self {
            Self::Acquire { pos, .. } | Self::Move { pos, .. } | Self::Release { pos, .. } => *pos,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquire { .. } => "pointer-acquire",
            Self::Move { .. } => "pointer-move",
            Self::Release { .. } => "pointer-release",
        }
    }

    pub fn to_sexp(&self) -> String {
        let pos = self.pos();
        format_event(
            self.as_str(),
            &[
                ("source", &format!("\"{}\"", self.source())),
                ("x", &format!("{:.1}", pos.x)),
                ("y", &format!("{:.1}", pos.y)),
            ],
        )
    }
}

// ── Unifier ────────────────────────────────────────────────

/// Per-source acquisition tracker.
pub struct PointerUnifier {
    /// Open sources and their last known position.
    open: BTreeMap<PointerSource, Point>,
    /// Hand index used for gesture events.
    hand_index: u8,
    /// Malformed events absorbed (orphan releases, duplicate acquires).
    absorbed: u64,
}

impl Default for PointerUnifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerUnifier {
    pub fn new() -> Self {
        Self {
            open: BTreeMap::new(),
            hand_index: 0,
            absorbed: 0,
        }
    }

    /// Translate one raw input into zero or more unified events.
    pub fn handle(&mut self, input: &RawInput) -> Vec<PointerEvent> {
        match *input {
            RawInput::MouseDown(pos) => self.acquire(PointerSource::Mouse, pos),
            RawInput::MouseMove(pos) => self.move_to(PointerSource::Mouse, pos),
            RawInput::MouseUp(pos) => self.release(PointerSource::Mouse, pos),
            RawInput::TouchStart { id, pos } => self.acquire(PointerSource::Touch(id), pos),
            RawInput::TouchMove { id, pos } => self.move_to(PointerSource::Touch(id), pos),
            RawInput::TouchEnd { id, pos } => self.release(PointerSource::Touch(id), pos),
            RawInput::TouchCancel { id } => {
                let source = PointerSource::Touch(id);
                self.release_where(|s| *s == source)
            }
            RawInput::Gesture(ref event) => self.handle_gesture(event),
        }
    }

    fn handle_gesture(&mut self, event: &GestureEvent) -> Vec<PointerEvent> {
        let source = PointerSource::Gesture(self.hand_index);
        match *event {
            GestureEvent::PinchStart { pos } => self.acquire(source, pos),
            GestureEvent::HandMove { pos, .. } => self.move_to(source, pos),
            GestureEvent::PinchEnd { pos } => self.release(source, pos),
            GestureEvent::HandDetected | GestureEvent::HandLost => Vec::new(),
        }
    }

    /// Open `source`, synthesizing a release first if it is already open.
    pub fn acquire(&mut self, source: PointerSource, pos: Point) -> Vec<PointerEvent> {
        let mut events = Vec::with_capacity(2);
        if let Some(old) = self.open.insert(source, pos) {
            self.absorbed += 1;
            debug!("{}: acquire while open, synthesizing release at ({:.1}, {:.1})", source, old.x, old.y);
            events.push(PointerEvent::Release { source, pos: old });
        }
        events.push(PointerEvent::Acquire { source, pos });
        events
    }

    /// Move an open source; hover moves are dropped.
    pub fn move_to(&mut self, source: PointerSource, pos: Point) -> Vec<PointerEvent> {
        match self.open.get_mut(&source) {
            Some(last) => {
                *last = pos;
                vec![PointerEvent::Move { source, pos }]
            }
            None => Vec::new(),
        }
    }

    /// Close an open source; orphan releases are dropped.
    pub fn release(&mut self, source: PointerSource, pos: Point) -> Vec<PointerEvent> {
        if self.open.remove(&source).is_some() {
            vec![PointerEvent::Release { source, pos }]
        } else {
            self.absorbed += 1;
            trace!("{}: release without acquire dropped", source);
            Vec::new()
        }
    }

    /// Release every open source matching `filter` at its last known
    /// position.
    pub fn release_where<F>(&mut self, filter: F) -> Vec<PointerEvent>
    where
        F: Fn(&PointerSource) -> bool,
    {
        let sources: Vec<PointerSource> = self.open.keys().copied().filter(|s| filter(s)).collect();
        sources
            .into_iter()
            .filter_map(|source| {
                self.open
                    .remove(&source)
                    .map(|pos| PointerEvent::Release { source, pos })
            })
            .collect()
    }

    pub fn is_open(&self, source: PointerSource) -> bool {
        self.open.contains_key(&source)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn last_position(&self, source: PointerSource) -> Option<Point> {
        self.open.get(&source).copied()
    }

    pub fn absorbed_count(&self) -> u64 {
        self.absorbed
    }

    /// Forget all open sources without emitting releases.
    pub fn reset(&mut self) {
        self.open.clear();
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        let open: Vec<String> = self.open.keys().map(|s| format!("\"{}\"", s)).collect();
        format!(
            "(:open ({}) :absorbed {})",
            open.join(" "),
            self.absorbed
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
