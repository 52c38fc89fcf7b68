//! Body-part hold detection from pose landmark sets.
//!
//! Each target names a body landmark.  While a visible wrist stays near it
//! the hold timer accumulates the measured frame interval; the first frame
//! it does not, the timer drops back to zero.  A target whose hold reaches
//! its requirement is confirmed once and retired, and the next target in
//! the queue becomes active.

use tracing::{debug, info};

use crate::landmarks::{Keypoint, PoseLandmark};
use crate::sexp::{format_event, quote};

// ── Body parts ─────────────────────────────────────────────

/// A nameable body part and the landmark that locates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyPart {
    pub name: &'static str,
    pub landmark: PoseLandmark,
    /// Head and face parts also accept a hand raised to head height.
    pub head: bool,
}

const fn part(name: &'static str, landmark: PoseLandmark, head: bool) -> BodyPart {
    BodyPart { name, landmark, head }
}

/// Every body part the game can ask for.
pub const BODY_PARTS: [BodyPart; 16] = [
    part("head", PoseLandmark::Nose, true),
    part("nose", PoseLandmark::Nose, true),
    part("left-eye", PoseLandmark::LeftEye, true),
    part("right-eye", PoseLandmark::RightEye, true),
    part("left-ear", PoseLandmark::LeftEar, true),
    part("right-ear", PoseLandmark::RightEar, true),
    part("left-shoulder", PoseLandmark::LeftShoulder, false),
    part("right-shoulder", PoseLandmark::RightShoulder, false),
    part("left-elbow", PoseLandmark::LeftElbow, false),
    part("right-elbow", PoseLandmark::RightElbow, false),
    part("left-wrist", PoseLandmark::LeftWrist, false),
    part("right-wrist", PoseLandmark::RightWrist, false),
    part("left-hip", PoseLandmark::LeftHip, false),
    part("right-hip", PoseLandmark::RightHip, false),
    part("left-knee", PoseLandmark::LeftKnee, false),
    part("right-knee", PoseLandmark::RightKnee, false),
];

/// Look up a body part by name (underscores accepted).
pub fn body_part(name: &str) -> Option<BodyPart> {
    let normalized = name.replace('_', "-");
    BODY_PARTS.iter().copied().find(|p| p.name == normalized)
}

/// Which body parts a level draws from, and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    /// Number of targets in a level.
    pub fn part_count(&self) -> usize {
        match self {
            Self::Easy => 4,
            Self::Medium => 6,
            Self::Hard => 8,
        }
    }

    /// Pick the level's parts.  `rotation` shifts the starting point in
    /// the candidate list so repeated levels vary.
    pub fn select_parts(&self, rotation: usize) -> Vec<BodyPart> {
        let mut candidates: Vec<BodyPart> = match self {
            Self::Easy => ["head", "nose", "left-shoulder", "right-shoulder", "left-knee", "right-knee"]
                .iter()
                .filter_map(|n| body_part(n))
                .collect(),
            Self::Medium => BODY_PARTS.iter().copied().filter(|p| !p.name.contains("hip")).collect(),
            Self::Hard => BODY_PARTS.to_vec(),
        };
        if !candidates.is_empty() {
            let len = candidates.len();
            candidates.rotate_left(rotation % len);
        }
        candidates.truncate(self.part_count());
        candidates
    }
}

// ── Config ─────────────────────────────────────────────────

/// Pose hold thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseConfig {
    /// Minimum landmark confidence to count as visible.
    pub visibility_threshold: f32,
    /// Normalized wrist-to-target distance that counts as touching.
    pub proximity_threshold: f32,
    /// A wrist above `nose.y + head_line_offset` is raised to the head.
    pub head_line_offset: f32,
    /// Distance accepted for a raised hand on head and face targets.
    pub head_relaxed_distance: f32,
    /// Hold time (ms) needed to confirm a target.
    pub required_hold_ms: f64,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.5,
            proximity_threshold: 0.15,
            head_line_offset: 0.1,
            head_relaxed_distance: 0.2,
            required_hold_ms: 1500.0,
        }
    }
}

impl PoseConfig {
    pub fn config_sexp(&self) -> String {
        format!(
            "(:visibility-threshold {:.2} :proximity-threshold {:.2} :head-line-offset {:.2} :head-relaxed-distance {:.2} :required-hold-ms {:.0})",
            self.visibility_threshold,
            self.proximity_threshold,
            self.head_line_offset,
            self.head_relaxed_distance,
            self.required_hold_ms,
        )
    }
}

// ── Targets ────────────────────────────────────────────────

/// One body part to hold, with its accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseTarget {
    pub name: String,
    pub landmark: PoseLandmark,
    pub required_hold_ms: f64,
    pub head_rule: bool,
    pub held_ms: f64,
}

impl PoseTarget {
    pub fn new(part: BodyPart, required_hold_ms: f64) -> Self {
        Self {
            name: part.name.to_string(),
            landmark: part.landmark,
            required_hold_ms,
            head_rule: part.head,
            held_ms: 0.0,
        }
    }

    /// Hold progress in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.required_hold_ms <= 0.0 {
            return 1.0;
        }
        (self.held_ms / self.required_hold_ms).clamp(0.0, 1.0)
    }
}

// ── Events ─────────────────────────────────────────────────

/// Events from the pose checker.
#[derive(Debug, Clone, PartialEq)]
pub enum PoseEvent {
    /// Hold accumulated on the active target.
    Progress { target: String, held_ms: f64, required_ms: f64 },
    /// Hold dropped back to zero.
    HoldReset { target: String },
    /// Hold requirement met; fired once per target.
    Confirmed { target: String, index: usize },
    /// Every target confirmed.
    Finished,
}

impl PoseEvent {
    pub fn to_sexp(&self) -> String {
        match self {
            Self::Progress {
                target,
                held_ms,
                required_ms,
            } => format_event(
                "pose-progress",
                &[
                    ("target", &quote(target)),
                    ("held-ms", &format!("{:.0}", held_ms)),
                    ("required-ms", &format!("{:.0}", required_ms)),
                ],
            ),
            Self::HoldReset { target } => format_event("pose-hold-reset", &[("target", &quote(target))]),
            Self::Confirmed { target, index } => format_event(
                "pose-confirmed",
                &[("target", &quote(target)), ("index", &index.to_string())],
            ),
            Self::Finished => format_event("pose-finished", &[]),
        }
    }
}

// ── Checker ────────────────────────────────────────────────

/// Queue of pose targets, worked through in order.
pub struct PoseTargetChecker {
    /// Configuration.
    pub config: PoseConfig,
    targets: Vec<PoseTarget>,
    /// Index of the active target; `targets.len()` when finished.
    current: usize,
}

impl PoseTargetChecker {
    pub fn new(config: PoseConfig, targets: Vec<PoseTarget>) -> Self {
        Self {
            config,
            targets,
            current: 0,
        }
    }

    /// Build a queue from body parts with the configured hold time.
    pub fn from_parts(config: PoseConfig, parts: &[BodyPart]) -> Self {
        let hold = config.required_hold_ms;
        let targets = parts.iter().map(|p| PoseTarget::new(*p, hold)).collect();
        Self::new(config, targets)
    }

    /// Evaluate one frame.  `pose` is `None` when the detector saw no body.
    pub fn update(&mut self, pose: Option<&[Keypoint]>, dt_ms: f64) -> Vec<PoseEvent> {
        let mut events = Vec::new();
        let touching = match (self.targets.get(self.current), pose) {
            (Some(target), Some(set)) => self.is_touching(target, set),
            (Some(_), None) => false,
            (None, _) => return events,
        };

        let index = self.current;
        let target = &mut self.targets[index];
        if !touching {
            if target.held_ms > 0.0 {
                debug!("{}: hold reset after {:.0}ms", target.name, target.held_ms);
                events.push(PoseEvent::HoldReset {
                    target: target.name.clone(),
                });
            }
            target.held_ms = 0.0;
            return events;
        }

        target.held_ms += dt_ms.max(0.0);
        if target.held_ms < target.required_hold_ms {
            events.push(PoseEvent::Progress {
                target: target.name.clone(),
                held_ms: target.held_ms,
                required_ms: target.required_hold_ms,
            });
            return events;
        }

        info!("{}: pose confirmed ({:.0}ms)", target.name, target.held_ms);
        events.push(PoseEvent::Confirmed {
            target: target.name.clone(),
            index,
        });
        self.current += 1;
        if self.current >= self.targets.len() {
            events.push(PoseEvent::Finished);
        }
        events
    }

    /// Whether a hand is on the target this frame.  An occluded target
    /// never counts.
    fn is_touching(&self, target: &PoseTarget, set: &[Keypoint]) -> bool {
        let threshold = self.config.visibility_threshold;
        let goal = match set.get(target.landmark.index()) {
            Some(k) if k.is_visible(threshold) => k,
            _ => return false,
        };

        let wrists: Vec<&Keypoint> = [PoseLandmark::LeftWrist, PoseLandmark::RightWrist]
            .iter()
            .filter_map(|l| set.get(l.index()))
            .filter(|k| k.is_visible(threshold))
            .collect();

        if wrists
            .iter()
            .any(|w| w.distance_2d(goal) < self.config.proximity_threshold)
        {
            return true;
        }

        if target.head_rule {
            if let Some(nose) = set.get(PoseLandmark::Nose.index()).filter(|n| n.is_visible(threshold)) {
                let head_line = nose.y + self.config.head_line_offset;
                return wrists.iter().any(|w| {
                    w.y < head_line && w.distance_2d(goal) < self.config.head_relaxed_distance
                });
            }
        }
        false
    }

    pub fn current_target(&self) -> Option<&PoseTarget> {
        self.targets.get(self.current)
    }

    pub fn targets(&self) -> &[PoseTarget] {
        &self.targets
    }

    pub fn confirmed_count(&self) -> usize {
        self.current.min(self.targets.len())
    }

    pub fn total(&self) -> usize {
        self.targets.len()
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.targets.len()
    }

    /// Clear hold progress and restart from the first target.
    pub fn reset(&mut self) {
        for t in &mut self.targets {
            t.held_ms = 0.0;
        }
        self.current = 0;
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        match self.current_target() {
            Some(t) => format!(
                "(:target {} :landmark :{} :held-ms {:.0} :required-ms {:.0} :confirmed {} :total {})",
                quote(&t.name),
                t.landmark.as_str(),
                t.held_ms,
                t.required_hold_ms,
                self.confirmed_count(),
                self.total(),
            ),
            None => format!(
                "(:target nil :confirmed {} :total {})",
                self.confirmed_count(),
                self.total()
            ),
        }
    }
}

// ── Test helpers ───────────────────────────────────────────

/// A 33-point pose with every landmark visible at (0.5, 0.9) and both
/// wrists parked far from the head.
#[cfg(test)]
pub(crate) fn make_pose() -> Vec<Keypoint> {
    use crate::landmarks::POSE_LANDMARK_COUNT;

    let mut set = vec![Keypoint::new(0.5, 0.9, 0.9); POSE_LANDMARK_COUNT];
    set[PoseLandmark::Nose.index()] = Keypoint::new(0.5, 0.2, 0.9);
    set[PoseLandmark::LeftEar.index()] = Keypoint::new(0.6, 0.2, 0.9);
    set[PoseLandmark::LeftShoulder.index()] = Keypoint::new(0.65, 0.4, 0.9);
    set[PoseLandmark::LeftKnee.index()] = Keypoint::new(0.6, 0.8, 0.9);
    set[PoseLandmark::LeftWrist.index()] = Keypoint::new(0.9, 0.95, 0.9);
    set[PoseLandmark::RightWrist.index()] = Keypoint::new(0.1, 0.95, 0.9);
    set
}

#[cfg(test)]
pub(crate) fn set_pose_point(set: &mut [Keypoint], landmark: PoseLandmark, x: f32, y: f32) {
    set[landmark.index()].x = x;
    set[landmark.index()].y = y;
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(parts: &[&str]) -> PoseTargetChecker {
        let parts: Vec<BodyPart> = parts.iter().filter_map(|n| body_part(n)).collect();
        PoseTargetChecker::from_parts(PoseConfig::default(), &parts)
    }

    fn touching_shoulder() -> Vec<Keypoint> {
        let mut pose = make_pose();
        set_pose_point(&mut pose, PoseLandmark::RightWrist, 0.62, 0.42);
        pose
    }

    #[test]
    fn test_hold_accumulates_and_confirms() {
        let mut c = checker(&["left-shoulder", "left-knee"]);
        let pose = touching_shoulder();
        for _ in 0..29 {
            let events = c.update(Some(&pose), 50.0);
            assert!(matches!(events[0], PoseEvent::Progress { .. }), "got {:?}", events);
        }
        let events = c.update(Some(&pose), 50.0);
        assert_eq!(
            events,
            vec![PoseEvent::Confirmed {
                target: "left-shoulder".to_string(),
                index: 0
            }]
        );
        assert_eq!(c.current_target().unwrap().name, "left-knee");
    }

    #[test]
    fn test_hold_uses_measured_dt() {
        let mut c = checker(&["left-shoulder"]);
        let pose = touching_shoulder();
        c.update(Some(&pose), 16.0);
        c.update(Some(&pose), 33.0);
        assert!((c.current_target().unwrap().held_ms - 49.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_false_frame_resets() {
        let mut c = checker(&["left-shoulder"]);
        let near = touching_shoulder();
        let far = make_pose();
        for _ in 0..28 {
            c.update(Some(&near), 50.0);
        }
        assert!((c.current_target().unwrap().held_ms - 1400.0).abs() < 1e-9);
        let events = c.update(Some(&far), 50.0);
        assert!(matches!(events[0], PoseEvent::HoldReset { .. }));
        assert_eq!(c.current_target().unwrap().held_ms, 0.0);
        // 1400 + a bit more is not enough after the reset.
        for _ in 0..29 {
            assert!(!c
                .update(Some(&near), 50.0)
                .iter()
                .any(|e| matches!(e, PoseEvent::Confirmed { .. })));
        }
        assert!(c
            .update(Some(&near), 50.0)
            .iter()
            .any(|e| matches!(e, PoseEvent::Confirmed { .. })));
    }

    #[test]
    fn test_occluded_target_resets() {
        let mut c = checker(&["left-shoulder"]);
        let mut pose = touching_shoulder();
        c.update(Some(&pose), 100.0);
        pose[PoseLandmark::LeftShoulder.index()].confidence = 0.1;
        c.update(Some(&pose), 100.0);
        assert_eq!(c.current_target().unwrap().held_ms, 0.0);
    }

    #[test]
    fn test_no_pose_resets() {
        let mut c = checker(&["left-shoulder"]);
        c.update(Some(&touching_shoulder()), 100.0);
        let events = c.update(None, 100.0);
        assert_eq!(
            events,
            vec![PoseEvent::HoldReset {
                target: "left-shoulder".to_string()
            }]
        );
    }

    #[test]
    fn test_invisible_wrist_ignored() {
        let mut c = checker(&["left-shoulder"]);
        let mut pose = touching_shoulder();
        pose[PoseLandmark::RightWrist.index()].confidence = 0.2;
        assert!(c.update(Some(&pose), 100.0).is_empty());
        assert_eq!(c.current_target().unwrap().held_ms, 0.0);
    }

    #[test]
    fn test_head_rule_relaxed_distance() {
        let mut c = checker(&["left-ear"]);
        let mut pose = make_pose();
        // 0.18 from the ear, raised above the head line.
        set_pose_point(&mut pose, PoseLandmark::LeftWrist, 0.78, 0.2);
        c.update(Some(&pose), 100.0);
        assert_eq!(c.current_target().unwrap().held_ms, 100.0);
    }

    #[test]
    fn test_head_rule_needs_raised_hand() {
        let mut c = checker(&["left-ear"]);
        let mut pose = make_pose();
        // Within the relaxed distance but below the head line.
        set_pose_point(&mut pose, PoseLandmark::LeftWrist, 0.6, 0.38);
        c.update(Some(&pose), 100.0);
        assert_eq!(c.current_target().unwrap().held_ms, 0.0);
    }

    #[test]
    fn test_relaxed_rule_not_for_body() {
        let mut c = checker(&["left-shoulder"]);
        let mut pose = make_pose();
        // 0.18 away and raised: only head targets accept this.
        set_pose_point(&mut pose, PoseLandmark::LeftWrist, 0.65, 0.22);
        c.update(Some(&pose), 100.0);
        assert_eq!(c.current_target().unwrap().held_ms, 0.0);
    }

    #[test]
    fn test_finished_after_last_target() {
        let mut c = PoseTargetChecker::from_parts(
            PoseConfig {
                required_hold_ms: 100.0,
                ..PoseConfig::default()
            },
            &[body_part("left-shoulder").unwrap()],
        );
        let events = c.update(Some(&touching_shoulder()), 100.0);
        assert!(events.contains(&PoseEvent::Finished));
        assert!(c.is_finished());
        assert!(c.update(Some(&touching_shoulder()), 100.0).is_empty());
        assert_eq!(c.confirmed_count(), 1);
    }

    #[test]
    fn test_difficulty_selection() {
        let easy = Difficulty::Easy.select_parts(0);
        assert_eq!(easy.len(), 4);
        assert_eq!(easy[0].name, "head");
        let medium = Difficulty::Medium.select_parts(3);
        assert_eq!(medium.len(), 6);
        assert!(medium.iter().all(|p| !p.name.contains("hip")));
        assert_eq!(Difficulty::Hard.select_parts(0).len(), 8);
        assert_eq!(Difficulty::from_str("medium"), Some(Difficulty::Medium));
    }

    #[test]
    fn test_body_part_lookup() {
        assert_eq!(body_part("left_knee").unwrap().landmark, PoseLandmark::LeftKnee);
        assert!(body_part("nose").unwrap().head);
        assert!(body_part("tail").is_none());
    }

    #[test]
    fn test_status_sexp() {
        let c = checker(&["nose"]);
        assert!(c.status_sexp().contains(":landmark :nose"));
        assert!(c.status_sexp().contains(":total 1"));
    }
}
