//! The engine: one running game fed by mouse, touch and camera input.
//!
//! A single `Engine` owns the whole pipeline: landmark stream, gesture
//! recognizer, pointer unifier, drag sessions and the active
//! [`GameVariant`].  It is the only writer of sessions, scene flags, match
//! state and pose targets; callers read through accessors.
//!
//! Every public entry point returns the events it produced, in order, and
//! hands each one to the registered [`EngineHandler`] first.

use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::content::LevelContent;
use crate::detector::{CameraError, Detection, LandmarkStream};
use crate::drag::{DragEvent, DragSessionManager, Scene};
use crate::events::{dispatch, EngineEvent, EngineHandler};
use crate::games::GameRegistry;
use crate::gesture::{GestureEvent, GestureRecognizer};
use crate::pointer::{PointerEvent, PointerUnifier, RawInput};
use crate::pose::PoseEvent;
use crate::scoring::{evaluate, rewards, GameResult, Rewards};
use crate::sexp::bool_sexp;
use crate::variant::{GameVariant, Hint, InteractionKind, VariantInput, VariantOutput};

pub struct Engine {
    config: EngineConfig,
    registry: GameRegistry,
    stream: Option<LandmarkStream>,
    recognizer: GestureRecognizer,
    unifier: PointerUnifier,
    drags: DragSessionManager,
    variant: Option<Box<dyn GameVariant>>,
    handler: Option<Box<dyn EngineHandler>>,
    paused: bool,
    /// Gesture input was on when the game paused.
    resume_gesture: bool,
    /// Unpaused play time of the current level (ms).
    elapsed_ms: f64,
    /// Set once when the level completes.
    result: Option<GameResult>,
    rewards: Option<Rewards>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let recognizer = GestureRecognizer::new(config.gesture.clone());
        Self {
            config,
            registry: GameRegistry::with_builtin(),
            stream: None,
            recognizer,
            unifier: PointerUnifier::new(),
            drags: DragSessionManager::new(),
            variant: None,
            handler: None,
            paused: false,
            resume_gesture: false,
            elapsed_ms: 0.0,
            result: None,
            rewards: None,
        }
    }

    /// Replace the variant registry.
    pub fn with_registry(mut self, registry: GameRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Attach the camera/detector pair.  Any previous stream is stopped.
    pub fn attach_stream(&mut self, stream: LandmarkStream) {
        if let Some(mut old) = self.stream.take() {
            old.stop();
        }
        self.stream = Some(stream);
    }

    /// Install the subscriber, replacing any previous one.
    pub fn register_handler(&mut self, handler: Box<dyn EngineHandler>) {
        if self.handler.replace(handler).is_some() {
            debug!("engine handler replaced");
        }
    }

    pub fn clear_handler(&mut self) {
        self.handler = None;
    }

    // ── Level lifecycle ──────────────────────────────────────

    /// Start a level.  The previous level, if any, is exited first (which
    /// stops gesture input).
    pub fn load_variant(&mut self, name: &str, content: LevelContent) -> anyhow::Result<Vec<EngineEvent>> {
        let mut variant = self.registry.create(name, content)?;
        let kind = variant.kind();
        variant.init(&self.config.variant(kind));

        let events = self.leave_level();
        self.recognizer = GestureRecognizer::new(self.config.gesture_for(kind));
        info!(
            "level started: {} ({} units, {} entities)",
            kind,
            variant.total_units(),
            variant.scene().entities.len()
        );
        self.variant = Some(variant);
        Ok(self.publish(events))
    }

    /// Leave the current level: gesture input stops and every open drag
    /// returns home.
    pub fn exit_level(&mut self) -> Vec<EngineEvent> {
        let events = self.leave_level();
        self.publish(events)
    }

    fn leave_level(&mut self) -> Vec<EngineEvent> {
        let mut events = self.halt_gesture("level-exit");
        if let Some(variant) = self.variant.as_mut() {
            events.extend(
                self.drags
                    .clear(variant.scene_mut())
                    .into_iter()
                    .map(EngineEvent::DropAttempt),
            );
            info!("level exited: {}", variant.kind());
        }
        self.variant = None;
        self.unifier.reset();
        self.paused = false;
        self.resume_gesture = false;
        self.elapsed_ms = 0.0;
        self.result = None;
        self.rewards = None;
        events
    }

    /// Restart the current level from scratch.  Gesture input keeps its
    /// state (and restarts if it was on before a pause).
    pub fn reset(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if let Some(variant) = self.variant.as_mut() {
            events.extend(
                self.drags
                    .clear(variant.scene_mut())
                    .into_iter()
                    .map(EngineEvent::DropAttempt),
            );
            let kind = variant.kind();
            variant.init(&self.config.variant(kind));
            info!("level reset: {}", kind);
        }
        self.unifier.reset();
        self.recognizer.reset();
        self.paused = false;
        self.elapsed_ms = 0.0;
        self.result = None;
        self.rewards = None;
        if std::mem::take(&mut self.resume_gesture) {
            if let Err(e) = self.start_gesture_input() {
                events.push(EngineEvent::GestureStopped {
                    reason: e.as_str().to_string(),
                });
            }
        }
        self.publish(events)
    }

    // ── Gesture input ────────────────────────────────────────

    /// Open the camera and start detection.  On failure the error is
    /// returned and the engine carries on with mouse and touch only.
    pub fn start_gesture_input(&mut self) -> Result<(), CameraError> {
        if self.paused {
            // Started on resume.
            self.resume_gesture = true;
            return Ok(());
        }
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => {
                let e = CameraError::DetectorUnavailable("no landmark detector attached".to_string());
                warn!("gesture input unavailable ({}), using mouse and touch", e);
                return Err(e);
            }
        };
        match stream.start() {
            Ok(()) => {
                self.recognizer.reset();
                info!("gesture input started");
                Ok(())
            }
            Err(e) => {
                warn!("gesture input unavailable ({}), using mouse and touch", e);
                Err(e)
            }
        }
    }

    /// Stop detection, release the camera and close any gesture drag.
    pub fn stop_gesture_input(&mut self, reason: &str) -> Vec<EngineEvent> {
        self.resume_gesture = false;
        let events = self.halt_gesture(reason);
        self.publish(events)
    }

    pub fn is_gesture_active(&self) -> bool {
        self.stream.as_ref().map_or(false, |s| s.is_streaming())
    }

    fn halt_gesture(&mut self, reason: &str) -> Vec<EngineEvent> {
        let was_streaming = self.is_gesture_active();
        self.halt_gesture_reporting(reason, was_streaming)
    }

    /// Stop gesture input, emitting `GestureStopped` when `report` is set.
    fn halt_gesture_reporting(&mut self, reason: &str, report: bool) -> Vec<EngineEvent> {
        if let Some(stream) = self.stream.as_mut() {
            stream.stop();
        }
        let mut events = self.cancel_gesture_sessions();
        if self.recognizer.hand_present() {
            events.push(EngineEvent::HandLost);
        }
        self.recognizer.reset();
        if report {
            info!("gesture input stopped: {}", reason);
            events.push(EngineEvent::GestureStopped {
                reason: reason.to_string(),
            });
        }
        events
    }

    /// Close gesture-owned pointers and drags at their last position,
    /// outside any zone.  Cancelled drops are reported but never judged.
    fn cancel_gesture_sessions(&mut self) -> Vec<EngineEvent> {
        let released = self.unifier.release_where(|s| s.is_gesture());
        let variant = match self.variant.as_mut() {
            Some(v) => v,
            None => return Vec::new(),
        };
        let cancelled = self.drags.cancel_where(variant.scene_mut(), |s| s.is_gesture());
        if !released.is_empty() || !cancelled.is_empty() {
            debug!(
                "gesture sessions cancelled: {} pointers, {} drags",
                released.len(),
                cancelled.len()
            );
        }
        cancelled.into_iter().map(EngineEvent::DropAttempt).collect()
    }

    // ── Pause ────────────────────────────────────────────────

    /// Freeze matching, pose holds and reveal timers, and stop gesture
    /// input.  Mouse and touch keep being tracked.
    pub fn pause(&mut self) -> Vec<EngineEvent> {
        if self.paused {
            return Vec::new();
        }
        self.paused = true;
        if let Some(variant) = self.variant.as_mut() {
            variant.pause();
        }
        self.resume_gesture = self.is_gesture_active();
        info!("game paused");
        let events = self.halt_gesture("pause");
        self.publish(events)
    }

    /// Unfreeze, restarting gesture input if it was on before the pause.
    pub fn resume(&mut self) -> Vec<EngineEvent> {
        if !self.paused {
            return Vec::new();
        }
        self.paused = false;
        if let Some(variant) = self.variant.as_mut() {
            variant.resume();
        }
        info!("game resumed");
        let mut events = Vec::new();
        if std::mem::take(&mut self.resume_gesture) {
            if let Err(e) = self.start_gesture_input() {
                events.push(EngineEvent::GestureStopped {
                    reason: e.as_str().to_string(),
                });
            }
        }
        self.publish(events)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ── Input ────────────────────────────────────────────────

    /// One detection tick: poll the stream, feed what it found through the
    /// pipeline and advance the game clock by `dt_ms`.  Detections are
    /// timed by the camera interval since the previous detected frame, so
    /// ticks the detector skipped still count toward pose holds.
    pub fn tick(&mut self, dt_ms: f64) -> Vec<EngineEvent> {
        let dt_ms = dt_ms.max(0.0);
        if self.variant.is_some() && !self.paused && self.result.is_none() {
            self.elapsed_ms += dt_ms;
        }

        let mut events = Vec::new();
        let polled = match self.stream.as_mut() {
            Some(stream) => stream.tick(),
            None => Ok(None),
        };
        match polled {
            Ok(Some(sample)) => {
                let interval_ms = sample.interval_ms.unwrap_or(dt_ms);
                events.extend(self.route_detection(&sample.detection, interval_ms));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("gesture input lost: {}", e);
                self.resume_gesture = false;
                // The stream has already stopped itself.
                events.extend(self.halt_gesture_reporting(e.as_str(), true));
            }
        }

        let outputs = match self.variant.as_mut() {
            Some(variant) if !self.paused => variant.on_input(VariantInput::Tick { dt_ms }),
            _ => Vec::new(),
        };
        events.extend(outputs.into_iter().filter_map(output_event));
        events.extend(self.check_complete());
        self.publish(events)
    }

    /// Feed one detection directly, bypassing the stream.
    pub fn process_detection(&mut self, detection: &Detection, dt_ms: f64) -> Vec<EngineEvent> {
        let mut events = self.route_detection(detection, dt_ms.max(0.0));
        events.extend(self.check_complete());
        self.publish(events)
    }

    /// Feed one mouse, touch or gesture input.
    pub fn handle_input(&mut self, input: &RawInput) -> Vec<EngineEvent> {
        let mut events = self.route_raw(input);
        events.extend(self.check_complete());
        self.publish(events)
    }

    fn route_detection(&mut self, detection: &Detection, dt_ms: f64) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for gesture in self.recognizer.update(detection.hand.as_deref(), dt_ms) {
            events.push(gesture_event(&gesture));
            events.extend(self.route_raw(&RawInput::Gesture(gesture)));
        }

        if self.paused {
            return events;
        }
        if let Some(variant) = self.variant.as_mut() {
            if variant.interaction() == InteractionKind::Pose {
                let outputs = variant.on_input(VariantInput::Pose {
                    keypoints: detection.pose.as_deref(),
                    dt_ms,
                });
                events.extend(outputs.into_iter().filter_map(output_event));
            }
        }
        events
    }

    fn route_raw(&mut self, input: &RawInput) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for pointer in self.unifier.handle(input) {
            events.extend(self.route_pointer(pointer));
        }
        events
    }

    fn route_pointer(&mut self, pointer: PointerEvent) -> Vec<EngineEvent> {
        let paused = self.paused;
        let variant = match self.variant.as_mut() {
            Some(v) => v,
            None => return Vec::new(),
        };
        let mut events = Vec::new();
        match variant.interaction() {
            InteractionKind::Drag => {
                if paused && matches!(pointer, PointerEvent::Acquire { .. }) {
                    trace!("{}: acquire ignored while paused", pointer.source());
                    return events;
                }
                match self.drags.handle(variant.scene_mut(), &pointer) {
                    Some(DragEvent::Hover(change)) => events.push(EngineEvent::HoverChange(change)),
                    Some(DragEvent::Drop(attempt)) => {
                        events.push(EngineEvent::DropAttempt(attempt.clone()));
                        if paused {
                            variant.scene_mut().return_to_origin(&attempt.entity_id);
                        } else {
                            let outputs = variant.on_input(VariantInput::Drop(&attempt));
                            events.extend(outputs.into_iter().filter_map(output_event));
                        }
                    }
                    None => {}
                }
            }
            InteractionKind::Reveal => {
                if let PointerEvent::Acquire { pos, .. } = pointer {
                    if paused {
                        return events;
                    }
                    let hit = variant.scene().entity_at(pos, false).map(|e| e.id.clone());
                    if let Some(entity_id) = hit {
                        let outputs = variant.on_input(VariantInput::Reveal { entity_id: &entity_id });
                        events.extend(outputs.into_iter().filter_map(output_event));
                    }
                }
            }
            InteractionKind::Pose => {}
        }
        events
    }

    /// Build the result the first time the level reports complete.
    fn check_complete(&mut self) -> Vec<EngineEvent> {
        if self.result.is_some() {
            return Vec::new();
        }
        let variant = match self.variant.as_ref() {
            Some(v) if v.is_complete() => v,
            _ => return Vec::new(),
        };
        let eval = evaluate(
            variant.mistakes(),
            variant.total_units(),
            self.elapsed_ms,
            variant.scoring(),
        );
        let result = GameResult::new(variant.score(), variant.mistakes(), self.elapsed_ms, &eval);
        let earned = rewards(result.stars, result.score, &variant.scoring().rewards);
        info!(
            "level complete: {} stars, score {}, {} mistakes in {}ms, {} coins, {} xp",
            result.stars, result.score, result.mistakes, result.elapsed_ms, earned.coins, earned.xp
        );
        self.result = Some(result.clone());
        self.rewards = Some(earned);
        vec![EngineEvent::Complete(result)]
    }

    fn publish(&mut self, events: Vec<EngineEvent>) -> Vec<EngineEvent> {
        for event in &events {
            trace!("event {}", event.as_str());
            if let Some(handler) = self.handler.as_mut() {
                dispatch(&mut **handler, event);
            }
        }
        events
    }

    // ── Accessors ────────────────────────────────────────────

    /// What to highlight for a stuck player.
    pub fn hint(&self) -> Option<Hint> {
        let hint = self.variant.as_ref()?.hint();
        debug!("hint requested: {:?}", hint.as_ref().and_then(|h| h.target.as_deref()));
        hint
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn variant(&self) -> Option<&dyn GameVariant> {
        self.variant.as_deref()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.variant.as_ref().map(|v| v.scene())
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    /// Coins and XP for the completed level.
    pub fn rewards(&self) -> Option<Rewards> {
        self.rewards
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn recognizer(&self) -> &GestureRecognizer {
        &self.recognizer
    }

    pub fn unifier(&self) -> &PointerUnifier {
        &self.unifier
    }

    pub fn drags(&self) -> &DragSessionManager {
        &self.drags
    }

    pub fn stream(&self) -> Option<&LandmarkStream> {
        self.stream.as_ref()
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:paused {} :gesture {} :elapsed-ms {:.0} :complete {} :variant {} :recognizer {} :pointer {} :drags {} :stream {})",
            bool_sexp(self.paused),
            bool_sexp(self.is_gesture_active()),
            self.elapsed_ms,
            bool_sexp(self.result.is_some()),
            self.variant
                .as_ref()
                .map(|v| v.status_sexp())
                .unwrap_or_else(|| "nil".to_string()),
            self.recognizer.status_sexp(),
            self.unifier.status_sexp(),
            self.drags.status_sexp(),
            self.stream
                .as_ref()
                .map(|s| s.status_sexp())
                .unwrap_or_else(|| "nil".to_string()),
        )
    }
}

fn gesture_event(event: &GestureEvent) -> EngineEvent {
    match *event {
        GestureEvent::HandDetected => EngineEvent::HandDetected,
        GestureEvent::HandLost => EngineEvent::HandLost,
        GestureEvent::PinchStart { pos } => EngineEvent::PinchStart { pos },
        GestureEvent::PinchEnd { pos } => EngineEvent::PinchEnd { pos },
        GestureEvent::HandMove { pos, is_pinching } => EngineEvent::HandMove { pos, is_pinching },
    }
}

/// Outward event for a variant outcome.  Hold resets and the checker's
/// own finish marker stay internal.
fn output_event(output: VariantOutput) -> Option<EngineEvent> {
    match output {
        VariantOutput::Match(result) => Some(EngineEvent::MatchResult(result)),
        VariantOutput::Revealed { entity_id } => Some(EngineEvent::Revealed { entity_id }),
        VariantOutput::Pose(PoseEvent::Progress {
            target,
            held_ms,
            required_ms,
        }) => Some(EngineEvent::PoseProgress {
            target,
            held_ms,
            required_ms,
        }),
        VariantOutput::Pose(PoseEvent::Confirmed { target, index }) => {
            Some(EngineEvent::PoseConfirmed { target, index })
        }
        VariantOutput::Pose(PoseEvent::HoldReset { .. }) | VariantOutput::Pose(PoseEvent::Finished) => None,
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::detector::{DetectorPoll, ScriptedDetector, ScriptedEnvironment, ScriptedFeed};
    use crate::drag::DropAttempt;
    use crate::geometry::Point;
    use crate::gesture::{make_hand, GestureConfig};
    use crate::matching::MatchResult;

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    /// Unsmoothed, unmirrored gesture settings on a 1000×1000 viewport.
    fn engine() -> Engine {
        let mut config = EngineConfig::default();
        config.gesture = GestureConfig {
            smoothing: 1.0,
            mirror_x: false,
            viewport_width: 1000.0,
            viewport_height: 1000.0,
            ..GestureConfig::default()
        };
        Engine::new(config)
    }

    fn with_stream(engine: &mut Engine) -> (ScriptedEnvironment, ScriptedFeed) {
        let env = ScriptedEnvironment::default();
        let feed = ScriptedFeed::new();
        engine.attach_stream(LandmarkStream::new(
            Box::new(env.clone()),
            Box::new(ScriptedDetector::new(feed.clone())),
        ));
        (env, feed)
    }

    fn hand(x: f32, y: f32, pinched: bool) -> Detection {
        Detection {
            hand: Some(make_hand(x, y, if pinched { 0.02 } else { 0.2 }, 0.9)),
            pose: None,
        }
    }

    fn matching_engine() -> Engine {
        let mut e = engine();
        e.load_variant("matching", LevelContent::matching(&["cat", "dog"])).unwrap();
        e
    }

    /// Centre of an entity's current bounds.
    fn centre(e: &Engine, id: &str) -> Point {
        e.scene().unwrap().entity(id).unwrap().bounds.center()
    }

    fn zone_centre(e: &Engine, id: &str) -> Point {
        e.scene().unwrap().zone(id).unwrap().bounds.center()
    }

    fn mouse_drag(e: &mut Engine, from: Point, to: Point) -> Vec<EngineEvent> {
        let mut events = e.handle_input(&RawInput::MouseDown(from));
        events.extend(e.handle_input(&RawInput::MouseMove(to)));
        events.extend(e.handle_input(&RawInput::MouseUp(to)));
        events
    }

    #[test]
    fn test_mouse_drag_matches_and_completes_once() {
        let mut e = matching_engine();
        let (cat, cat_zone) = (centre(&e, "item-cat"), zone_centre(&e, "zone-cat"));
        let events = mouse_drag(&mut e, cat, cat_zone);
        assert!(
            events.iter().any(|ev| matches!(ev, EngineEvent::MatchResult(r) if r.correct)),
            "events {:?}",
            events
        );
        let (dog, dog_zone) = (centre(&e, "item-dog"), zone_centre(&e, "zone-dog"));
        e.tick(1000.0);
        let events = mouse_drag(&mut e, dog, dog_zone);
        let completes = events.iter().filter(|ev| matches!(ev, EngineEvent::Complete(_))).count();
        assert_eq!(completes, 1);
        assert_eq!(e.result().unwrap().stars, 3);
        assert_eq!(e.result().unwrap().elapsed_ms, 1000);
        // 200 points + 598 time bonus; 10 + 3×15 + 79 coins.
        assert_eq!(e.result().unwrap().score, 798);
        assert_eq!(e.rewards().map(|r| (r.coins, r.xp)), Some((134, 50)));
        // Nothing more once complete.
        assert!(e.tick(16.0).iter().all(|ev| !matches!(ev, EngineEvent::Complete(_))));
    }

    #[test]
    fn test_hover_change_reported_while_dragging() {
        let mut e = matching_engine();
        let (cat, zone) = (centre(&e, "item-cat"), zone_centre(&e, "zone-dog"));
        e.handle_input(&RawInput::MouseDown(cat));
        let events = e.handle_input(&RawInput::MouseMove(zone));
        assert!(
            matches!(&events[..], [EngineEvent::HoverChange(h)] if h.zone_id.as_deref() == Some("zone-dog")),
            "events {:?}",
            events
        );
        let events = e.handle_input(&RawInput::MouseMove(p(400.0, 600.0)));
        assert!(matches!(&events[..], [EngineEvent::HoverChange(h)] if h.zone_id.is_none()));
        // No zone change, no event.
        assert!(e.handle_input(&RawInput::MouseMove(p(410.0, 600.0))).is_empty());
    }

    #[test]
    fn test_drop_outside_returns_home_without_result() {
        let mut e = matching_engine();
        let cat = centre(&e, "item-cat");
        let events = mouse_drag(&mut e, cat, p(400.0, 600.0));
        assert!(matches!(&events[..], [EngineEvent::DropAttempt(DropAttempt { zone_id: None, .. })]));
        let entity = e.scene().unwrap().entity("item-cat").unwrap();
        assert_eq!(entity.bounds, entity.home);
        assert!(!entity.lifted);
    }

    #[test]
    fn test_gesture_pinch_drag() {
        let mut e = matching_engine();
        let (_env, feed) = with_stream(&mut e);
        e.start_gesture_input().unwrap();

        let cat = centre(&e, "item-cat");
        let zone = zone_centre(&e, "zone-cat");
        feed.set(hand(cat.x / 1000.0, cat.y / 1000.0, false));
        let events = e.tick(16.0);
        assert!(matches!(events.first(), Some(EngineEvent::HandDetected)));
        feed.set(hand(cat.x / 1000.0, cat.y / 1000.0, true));
        e.tick(16.0);
        assert_eq!(e.drags().active_count(), 1);
        feed.set(hand(zone.x / 1000.0, zone.y / 1000.0, true));
        e.tick(16.0);
        feed.set(hand(zone.x / 1000.0, zone.y / 1000.0, false));
        let events = e.tick(16.0);
        assert!(
            events.iter().any(|ev| matches!(ev, EngineEvent::MatchResult(r) if r.correct)),
            "events {:?}",
            events
        );
    }

    #[test]
    fn test_camera_failure_falls_back() {
        let mut e = matching_engine();
        assert!(matches!(e.start_gesture_input(), Err(CameraError::DetectorUnavailable(_))));
        e.attach_stream(LandmarkStream::new(
            Box::new(ScriptedEnvironment::failing(CameraError::PermissionDenied)),
            Box::new(ScriptedDetector::new(ScriptedFeed::new())),
        ));
        assert_eq!(e.start_gesture_input(), Err(CameraError::PermissionDenied));
        assert!(!e.is_gesture_active());
        // Mouse still works.
        let (cat, zone) = (centre(&e, "item-cat"), zone_centre(&e, "zone-cat"));
        assert!(mouse_drag(&mut e, cat, zone)
            .iter()
            .any(|ev| matches!(ev, EngineEvent::MatchResult(_))));
    }

    #[test]
    fn test_detector_failure_stops_gesture_input() {
        let mut e = matching_engine();
        let (env, feed) = with_stream(&mut e);
        e.start_gesture_input().unwrap();
        let cat = centre(&e, "item-cat");
        feed.set(hand(cat.x / 1000.0, cat.y / 1000.0, true));
        e.tick(16.0);
        assert_eq!(e.drags().active_count(), 1);

        feed.push(DetectorPoll::Failed("context lost".to_string()));
        let events = e.tick(16.0);
        assert!(events
            .iter()
            .any(|ev| matches!(ev, EngineEvent::GestureStopped { reason } if reason == "detector-unavailable")));
        assert!(!e.is_gesture_active());
        assert_eq!(env.open_cameras(), 0);
        assert_eq!(e.drags().active_count(), 0);
        assert!(!e.scene().unwrap().entity("item-cat").unwrap().lifted);
    }

    #[test]
    fn test_pose_hold_counts_skipped_detector_ticks() {
        use crate::landmarks::PoseLandmark;
        use crate::pose::{body_part, make_pose, set_pose_point};

        let mut e = engine();
        let parts = vec![body_part("left-shoulder").unwrap()];
        e.load_variant("body-parts", LevelContent::body_parts(parts)).unwrap();
        let (_env, feed) = with_stream(&mut e);
        e.start_gesture_input().unwrap();

        let mut pose = make_pose();
        set_pose_point(&mut pose, PoseLandmark::RightWrist, 0.62, 0.42);
        feed.set(Detection {
            hand: None,
            pose: Some(pose),
        });

        // Camera at 16ms per frame, detector busy on every other tick.
        let mut confirmed_at = None;
        for i in 0..150 {
            if i % 2 == 1 {
                feed.push(DetectorPoll::NotReady);
            }
            let events = e.tick(16.0);
            if events.iter().any(|ev| matches!(ev, EngineEvent::PoseConfirmed { .. })) {
                confirmed_at = Some(i);
                break;
            }
        }
        // 16ms for the first frame, then 32ms per detected frame.
        assert_eq!(confirmed_at, Some(94));
        assert!(e.result().is_some());
    }

    #[test]
    fn test_pause_stops_and_resume_restarts_gesture() {
        let mut e = matching_engine();
        let (env, _feed) = with_stream(&mut e);
        e.start_gesture_input().unwrap();
        let events = e.pause();
        assert!(events
            .iter()
            .any(|ev| matches!(ev, EngineEvent::GestureStopped { reason } if reason == "pause")));
        assert_eq!(env.open_cameras(), 0);
        e.resume();
        assert!(e.is_gesture_active());
        assert_eq!(env.open_cameras(), 1);
    }

    #[test]
    fn test_paused_mouse_drop_not_judged() {
        let mut e = matching_engine();
        let (cat, zone) = (centre(&e, "item-cat"), zone_centre(&e, "zone-cat"));
        e.handle_input(&RawInput::MouseDown(cat));
        e.pause();
        e.handle_input(&RawInput::MouseMove(zone));
        let events = e.handle_input(&RawInput::MouseUp(zone));
        assert!(matches!(&events[..], [EngineEvent::DropAttempt(_)]));
        let entity = e.scene().unwrap().entity("item-cat").unwrap();
        assert!(!entity.inert);
        assert_eq!(entity.bounds, entity.home);
        // No new drags while paused.
        e.handle_input(&RawInput::MouseDown(cat));
        assert_eq!(e.drags().active_count(), 0);
    }

    #[test]
    fn test_paused_clock_frozen() {
        let mut e = matching_engine();
        e.tick(100.0);
        e.pause();
        e.tick(5000.0);
        e.resume();
        e.tick(100.0);
        assert_eq!(e.elapsed_ms(), 200.0);
    }

    #[test]
    fn test_memory_reveal_by_click() {
        let mut e = engine();
        e.load_variant("memory", LevelContent::memory(&["sun"])).unwrap();
        let a = centre(&e, "sun-1");
        let b = centre(&e, "sun-2");
        let events = e.handle_input(&RawInput::MouseDown(a));
        assert!(matches!(&events[..], [EngineEvent::Revealed { entity_id }] if entity_id == "sun-1"));
        e.handle_input(&RawInput::MouseUp(a));
        e.handle_input(&RawInput::MouseDown(b));
        let events = e.tick(800.0);
        assert!(events.iter().any(|ev| matches!(ev, EngineEvent::MatchResult(r) if r.correct)));
        assert!(events.iter().any(|ev| matches!(ev, EngineEvent::Complete(_))));
    }

    #[derive(Default)]
    struct Recorder {
        results: Rc<RefCell<Vec<bool>>>,
    }

    impl EngineHandler for Recorder {
        fn on_match_result(&mut self, result: &MatchResult) {
            self.results.borrow_mut().push(result.correct);
        }
    }

    #[test]
    fn test_handler_replaced() {
        let mut e = matching_engine();
        let first = Recorder::default();
        let first_log = first.results.clone();
        e.register_handler(Box::new(first));
        let second = Recorder::default();
        let second_log = second.results.clone();
        e.register_handler(Box::new(second));

        let (cat, zone) = (centre(&e, "item-cat"), zone_centre(&e, "zone-dog"));
        mouse_drag(&mut e, cat, zone);
        assert!(first_log.borrow().is_empty());
        assert_eq!(*second_log.borrow(), vec![false]);
    }

    #[test]
    fn test_reset_restarts_level() {
        let mut e = matching_engine();
        let (cat, zone) = (centre(&e, "item-cat"), zone_centre(&e, "zone-cat"));
        mouse_drag(&mut e, cat, zone);
        e.tick(500.0);
        e.reset();
        assert!(e.rewards().is_none());
        assert_eq!(e.variant().unwrap().score(), 0);
        assert_eq!(e.elapsed_ms(), 0.0);
        assert_eq!(e.hint().unwrap().target.as_deref(), Some("cat"));
    }

    #[test]
    fn test_load_rejects_unknown_variant() {
        let mut e = engine();
        assert!(e.load_variant("chess", LevelContent::matching(&["a"])).is_err());
        assert!(e.variant().is_none());
    }

    #[test]
    fn test_status_sexp() {
        let e = matching_engine();
        let s = e.status_sexp();
        assert!(s.starts_with("(:paused nil :gesture nil"));
        assert!(s.contains(":variant (:variant :matching"));
    }
}
