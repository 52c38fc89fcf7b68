//! Match resolution shared by every game variant.
//!
//! Three policies sit on top of a common [`MatchBook`] (per-pair resolved
//! flag and attempt counter) and [`ScoreKeeper`] (floored score):
//!
//! - [`direct`]: drag an item onto its zone.
//! - [`reveal`]: turn over two cards, keep them if they pair.
//! - [`ordered`]: tap or drop items in a fixed sequence.

pub mod direct;
pub mod ordered;
pub mod reveal;

use std::collections::BTreeMap;

use tracing::debug;

use crate::sexp::{bool_sexp, format_event, quote};

pub use direct::DirectMatcher;
pub use ordered::OrderedMatcher;
pub use reveal::{RevealMatcher, RevealOutcome};

// ── Config ─────────────────────────────────────────────────

/// Point values and reveal timing.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Points for each correct match.
    pub base_points: i64,
    /// Points removed per mistake; the score never drops below 0.
    pub penalty_points: i64,
    /// Delay (ms) between the second reveal and its evaluation.
    pub reveal_eval_delay_ms: f64,
    /// Delay (ms) before a mismatched pair turns face-down again.
    pub reveal_revert_delay_ms: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            base_points: 100,
            penalty_points: 10,
            reveal_eval_delay_ms: 800.0,
            reveal_revert_delay_ms: 500.0,
        }
    }
}

impl MatchConfig {
    pub fn config_sexp(&self) -> String {
        format!(
            "(:base-points {} :penalty-points {} :reveal-eval-delay-ms {:.0} :reveal-revert-delay-ms {:.0})",
            self.base_points, self.penalty_points, self.reveal_eval_delay_ms, self.reveal_revert_delay_ms,
        )
    }
}

// ── Match state ────────────────────────────────────────────

/// Mutable per-pair record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchState {
    pub resolved: bool,
    pub attempts: u32,
}

/// Resolution state for every pair in a level.
#[derive(Debug, Clone, Default)]
pub struct MatchBook {
    states: BTreeMap<String, MatchState>,
}

impl MatchBook {
    pub fn new<I, S>(pair_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            states: pair_ids
                .into_iter()
                .map(|id| (id.into(), MatchState::default()))
                .collect(),
        }
    }

    /// Mark a pair resolved.  Returns `true` only on the false → true
    /// transition; unknown pairs are never resolved.
    pub fn resolve(&mut self, pair_id: &str) -> bool {
        match self.states.get_mut(pair_id) {
            Some(state) if !state.resolved => {
                state.resolved = true;
                state.attempts += 1;
                true
            }
            _ => false,
        }
    }

    /// Count a failed attempt against an unresolved pair.
    pub fn record_miss(&mut self, pair_id: &str) {
        if let Some(state) = self.states.get_mut(pair_id) {
            if !state.resolved {
                state.attempts += 1;
            }
        }
    }

    pub fn state(&self, pair_id: &str) -> Option<MatchState> {
        self.states.get(pair_id).copied()
    }

    pub fn is_resolved(&self, pair_id: &str) -> bool {
        self.states.get(pair_id).map(|s| s.resolved).unwrap_or(false)
    }

    pub fn resolved_count(&self) -> usize {
        self.states.values().filter(|s| s.resolved).count()
    }

    pub fn total(&self) -> usize {
        self.states.len()
    }

    pub fn all_resolved(&self) -> bool {
        !self.states.is_empty() && self.states.values().all(|s| s.resolved)
    }

    /// First unresolved pair in key order.
    pub fn first_unresolved(&self) -> Option<&str> {
        self.states
            .iter()
            .find(|(_, s)| !s.resolved)
            .map(|(id, _)| id.as_str())
    }

    pub fn status_sexp(&self) -> String {
        let pairs: Vec<String> = self
            .states
            .iter()
            .map(|(id, s)| {
                format!(
                    "(:pair {} :resolved {} :attempts {})",
                    quote(id),
                    bool_sexp(s.resolved),
                    s.attempts
                )
            })
            .collect();
        format!("({})", pairs.join(" "))
    }
}

// ── Score ──────────────────────────────────────────────────

/// Running score with a floor of 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreKeeper {
    score: i64,
    mistakes: u32,
    correct: u32,
    base_points: i64,
    penalty_points: i64,
}

impl ScoreKeeper {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            score: 0,
            mistakes: 0,
            correct: 0,
            base_points: config.base_points,
            penalty_points: config.penalty_points.max(0),
        }
    }

    /// Credit one correct match; returns the points awarded.
    pub fn award(&mut self) -> i64 {
        self.correct += 1;
        self.score += self.base_points;
        self.base_points
    }

    /// Extra points outside the per-match award (bonuses).
    pub fn add(&mut self, points: i64) {
        self.score = (self.score + points).max(0);
    }

    /// Record a mistake; returns the (non-positive) score delta actually
    /// applied after flooring.
    pub fn penalize(&mut self) -> i64 {
        self.mistakes += 1;
        let before = self.score;
        self.score = (self.score - self.penalty_points).max(0);
        self.score - before
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    pub fn correct(&self) -> u32 {
        self.correct
    }

    pub fn reset(&mut self) {
        self.score = 0;
        self.mistakes = 0;
        self.correct = 0;
    }
}

// ── Results ────────────────────────────────────────────────

/// Outcome of one evaluated match attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Pair the attempt was judged against.
    pub pair_id: String,
    /// Entities involved (one for drops and taps, two for reveals).
    pub entity_ids: Vec<String>,
    /// Target zone, when the attempt had one.
    pub zone_id: Option<String>,
    pub correct: bool,
    /// Score delta applied.
    pub points: i64,
    /// Score after the attempt.
    pub score: i64,
}

impl MatchResult {
    pub(crate) fn correct(
        pair_id: &str,
        entity_ids: Vec<String>,
        zone_id: Option<String>,
        score: &mut ScoreKeeper,
    ) -> Self {
        let points = score.award();
        debug!("match {} correct (+{})", pair_id, points);
        Self {
            pair_id: pair_id.to_string(),
            entity_ids,
            zone_id,
            correct: true,
            points,
            score: score.score(),
        }
    }

    pub(crate) fn incorrect(
        pair_id: &str,
        entity_ids: Vec<String>,
        zone_id: Option<String>,
        score: &mut ScoreKeeper,
    ) -> Self {
        let points = score.penalize();
        debug!("match {} incorrect ({})", pair_id, points);
        Self {
            pair_id: pair_id.to_string(),
            entity_ids,
            zone_id,
            correct: false,
            points,
            score: score.score(),
        }
    }

    pub fn to_sexp(&self) -> String {
        let entities: Vec<String> = self.entity_ids.iter().map(|e| quote(e)).collect();
        format_event(
            "match-result",
            &[
                ("pair", &quote(&self.pair_id)),
                ("entities", &format!("({})", entities.join(" "))),
                (
                    "zone",
                    &self.zone_id.as_deref().map(quote).unwrap_or_else(|| "nil".to_string()),
                ),
                ("correct", bool_sexp(self.correct)),
                ("points", &self.points.to_string()),
                ("score", &self.score.to_string()),
            ],
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_once() {
        let mut book = MatchBook::new(["cat", "dog"]);
        assert!(book.resolve("cat"));
        assert!(!book.resolve("cat"));
        assert_eq!(book.state("cat").unwrap().attempts, 1);
        assert_eq!(book.resolved_count(), 1);
        assert!(!book.all_resolved());
        assert!(!book.resolve("cow"));
    }

    #[test]
    fn test_miss_after_resolve_is_noop() {
        let mut book = MatchBook::new(["cat"]);
        book.record_miss("cat");
        book.resolve("cat");
        book.record_miss("cat");
        assert_eq!(
            book.state("cat"),
            Some(MatchState {
                resolved: true,
                attempts: 2
            })
        );
        assert!(book.all_resolved());
    }

    #[test]
    fn test_empty_book_never_complete() {
        let book = MatchBook::new(Vec::<String>::new());
        assert!(!book.all_resolved());
    }

    #[test]
    fn test_first_unresolved() {
        let mut book = MatchBook::new(["b", "a"]);
        assert_eq!(book.first_unresolved(), Some("a"));
        book.resolve("a");
        assert_eq!(book.first_unresolved(), Some("b"));
    }

    #[test]
    fn test_score_floor() {
        let mut score = ScoreKeeper::new(&MatchConfig::default());
        assert_eq!(score.penalize(), 0);
        assert_eq!(score.score(), 0);
        score.award();
        for _ in 0..20 {
            score.penalize();
            assert!(score.score() >= 0);
        }
        assert_eq!(score.score(), 0);
        assert_eq!(score.mistakes(), 21);
    }

    #[test]
    fn test_partial_penalty_reported() {
        let mut score = ScoreKeeper::new(&MatchConfig {
            base_points: 5,
            penalty_points: 10,
            ..MatchConfig::default()
        });
        score.award();
        assert_eq!(score.penalize(), -5);
    }

    #[test]
    fn test_negative_penalty_clamped() {
        let mut score = ScoreKeeper::new(&MatchConfig {
            penalty_points: -50,
            ..MatchConfig::default()
        });
        assert_eq!(score.penalize(), 0);
    }

    #[test]
    fn test_result_sexp() {
        let mut score = ScoreKeeper::new(&MatchConfig::default());
        let r = MatchResult::correct("cat", vec!["c1".into()], Some("z1".into()), &mut score);
        let s = r.to_sexp();
        assert!(s.contains(":event :match-result"));
        assert!(s.contains(":correct t"));
        assert!(s.contains(":points 100"));
        assert!(s.contains(":zone \"z1\""));
    }
}
