//! The contract every mini-game implements.
//!
//! The engine only ever talks to a `Box<dyn GameVariant>`: it feeds the
//! variant drops, reveals, pose frames and clock ticks, and reads back
//! match and pose outcomes.

use std::fmt;

use crate::drag::{DropAttempt, Scene};
use crate::gesture::GestureConfig;
use crate::landmarks::Keypoint;
use crate::matching::{MatchConfig, MatchResult};
use crate::pose::{PoseConfig, PoseEvent};
use crate::scoring::ScoringConfig;
use crate::sexp::quote;

// ── Kinds ──────────────────────────────────────────────────

/// Built-in game variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariantKind {
    Matching,
    Memory,
    Sentence,
    BodyParts,
}

impl VariantKind {
    pub const ALL: [VariantKind; 4] = [Self::Matching, Self::Memory, Self::Sentence, Self::BodyParts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matching => "matching",
            Self::Memory => "memory",
            Self::Sentence => "sentence",
            Self::BodyParts => "body-parts",
        }
    }

    /// Canonical names plus the level-type aliases used by content.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "matching" | "drag-drop" | "match" => Some(Self::Matching),
            "memory" | "pairs" => Some(Self::Memory),
            "sentence" | "word-order" => Some(Self::Sentence),
            "body-parts" | "body_parts" | "pose" => Some(Self::BodyParts),
            _ => None,
        }
    }

    /// How the variant takes pointer input.
    pub fn interaction(&self) -> InteractionKind {
        match self {
            Self::Matching | Self::Sentence => InteractionKind::Drag,
            Self::Memory => InteractionKind::Reveal,
            Self::BodyParts => InteractionKind::Pose,
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pipeline feeds a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    /// Pointer acquire/move/release through drag sessions.
    Drag,
    /// Pointer acquire over a card reveals it.
    Reveal,
    /// Full-body pose frames.
    Pose,
}

// ── Config ─────────────────────────────────────────────────

/// Everything a variant can override.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantConfig {
    pub matching: MatchConfig,
    pub scoring: ScoringConfig,
    pub pose: PoseConfig,
    /// Replaces the engine-wide gesture settings while this variant runs.
    pub gesture: Option<GestureConfig>,
}

impl VariantConfig {
    /// Built-in defaults for a variant.
    pub fn preset(kind: VariantKind) -> Self {
        let (matching, scoring) = match kind {
            VariantKind::Matching => (MatchConfig::default(), ScoringConfig::matching()),
            VariantKind::Memory => (
                MatchConfig {
                    penalty_points: 5,
                    ..MatchConfig::default()
                },
                ScoringConfig::memory(),
            ),
            VariantKind::Sentence => (
                MatchConfig {
                    base_points: 50,
                    penalty_points: 0,
                    ..MatchConfig::default()
                },
                ScoringConfig::sentence(),
            ),
            VariantKind::BodyParts => (
                MatchConfig {
                    penalty_points: 0,
                    ..MatchConfig::default()
                },
                ScoringConfig::body_parts(),
            ),
        };
        Self {
            matching,
            scoring,
            pose: PoseConfig::default(),
            gesture: None,
        }
    }

    pub fn config_sexp(&self) -> String {
        format!(
            "(:matching {} :scoring {} :pose {} :gesture-override {})",
            self.matching.config_sexp(),
            self.scoring.config_sexp(),
            self.pose.config_sexp(),
            crate::sexp::bool_sexp(self.gesture.is_some()),
        )
    }
}

// ── Input / output ─────────────────────────────────────────

/// Input routed to a variant.
#[derive(Debug, Clone, Copy)]
pub enum VariantInput<'a> {
    Drop(&'a DropAttempt),
    Reveal { entity_id: &'a str },
    Pose { keypoints: Option<&'a [Keypoint]>, dt_ms: f64 },
    Tick { dt_ms: f64 },
}

/// Outcome reported by a variant.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantOutput {
    Match(MatchResult),
    Pose(PoseEvent),
    Revealed { entity_id: String },
}

/// What to highlight for a stuck player.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hint {
    pub entity_ids: Vec<String>,
    pub zone_ids: Vec<String>,
    /// Body part or word to point at.
    pub target: Option<String>,
}

impl Hint {
    pub fn to_sexp(&self) -> String {
        let entities: Vec<String> = self.entity_ids.iter().map(|e| quote(e)).collect();
        let zones: Vec<String> = self.zone_ids.iter().map(|z| quote(z)).collect();
        format!(
            "(:entities ({}) :zones ({}) :target {})",
            entities.join(" "),
            zones.join(" "),
            self.target.as_deref().map(quote).unwrap_or_else(|| "nil".to_string()),
        )
    }
}

// ── Trait ──────────────────────────────────────────────────

/// A mini-game driven by the engine.
pub trait GameVariant {
    fn kind(&self) -> VariantKind;

    fn interaction(&self) -> InteractionKind {
        self.kind().interaction()
    }

    /// (Re)build all level state from the variant's content.
    fn init(&mut self, config: &VariantConfig);

    /// Freeze match and pose state.
    fn pause(&mut self);

    fn resume(&mut self);

    fn is_paused(&self) -> bool;

    fn hint(&self) -> Option<Hint>;

    /// Feed one input; paused variants return nothing.
    fn on_input(&mut self, input: VariantInput<'_>) -> Vec<VariantOutput>;

    fn scene(&self) -> &Scene;

    fn scene_mut(&mut self) -> &mut Scene;

    fn is_complete(&self) -> bool;

    fn score(&self) -> i64;

    fn mistakes(&self) -> u32;

    /// Units used for accuracy: pairs, words or body parts.
    fn total_units(&self) -> u32;

    fn scoring(&self) -> &ScoringConfig;

    fn status_sexp(&self) -> String;
}
