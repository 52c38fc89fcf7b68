//! Reveal-pair match: turn two cards face-up; a pair stays, anything else
//! turns back after a delay.
//!
//! At most two reveals are in flight.  Further reveals are rejected until
//! the pending pair has been evaluated and, on a mismatch, hidden again.
//! Delays only advance through [`RevealMatcher::advance`], so a paused
//! game freezes them.

use tracing::debug;

use super::{MatchBook, MatchConfig, MatchResult, ScoreKeeper};
use crate::drag::Scene;

/// Where the pending pair is in its evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RevealPhase {
    /// Fewer than two cards revealed.
    Open,
    /// Two cards up; evaluated when the timer runs out.
    Evaluating { remaining_ms: f64 },
    /// Mismatch shown; cards turn back when the timer runs out.
    Reverting { remaining_ms: f64 },
}

impl RevealPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Evaluating { .. } => "evaluating",
            Self::Reverting { .. } => "reverting",
        }
    }
}

/// Result of a reveal request.
#[derive(Debug, Clone, PartialEq)]
pub enum RevealOutcome {
    /// Card turned face-up; `pending` cards are now up.
    Revealed { entity_id: String, pending: usize },
    /// Two cards already in flight.
    Locked,
    /// Unknown, matched or already face-up card.
    Ignored,
}

/// Memory-style pair resolution.
#[derive(Debug, Clone)]
pub struct RevealMatcher {
    pub book: MatchBook,
    pending: Vec<String>,
    phase: RevealPhase,
    eval_delay_ms: f64,
    revert_delay_ms: f64,
    /// Completed two-card turns.
    moves: u32,
}

impl RevealMatcher {
    pub fn from_scene(scene: &Scene, config: &MatchConfig) -> Self {
        let mut pairs: Vec<String> = scene.entities.iter().map(|e| e.pair_id.clone()).collect();
        pairs.sort();
        pairs.dedup();
        Self {
            book: MatchBook::new(pairs),
            pending: Vec::with_capacity(2),
            phase: RevealPhase::Open,
            eval_delay_ms: config.reveal_eval_delay_ms.max(0.0),
            revert_delay_ms: config.reveal_revert_delay_ms.max(0.0),
            moves: 0,
        }
    }

    /// Whether new reveals are currently rejected.
    pub fn is_locked(&self) -> bool {
        self.pending.len() >= 2 || self.phase != RevealPhase::Open
    }

    /// Turn a card face-up.
    pub fn reveal(&mut self, scene: &mut Scene, entity_id: &str) -> RevealOutcome {
        if self.is_locked() {
            debug!("reveal {} rejected: two cards pending", entity_id);
            return RevealOutcome::Locked;
        }
        let entity = match scene.entity_mut(entity_id) {
            Some(e) if !e.inert && !e.revealed => e,
            _ => return RevealOutcome::Ignored,
        };
        entity.revealed = true;
        self.pending.push(entity_id.to_string());
        if self.pending.len() == 2 {
            self.moves += 1;
            self.phase = RevealPhase::Evaluating {
                remaining_ms: self.eval_delay_ms,
            };
        }
        RevealOutcome::Revealed {
            entity_id: entity_id.to_string(),
            pending: self.pending.len(),
        }
    }

    /// Advance the pending timers by `dt_ms`.  Returns a result when the
    /// pending pair is evaluated.
    pub fn advance(&mut self, scene: &mut Scene, dt_ms: f64, score: &mut ScoreKeeper) -> Option<MatchResult> {
        match self.phase {
            RevealPhase::Open => None,
            RevealPhase::Evaluating { remaining_ms } => {
                let remaining_ms = remaining_ms - dt_ms;
                if remaining_ms > 0.0 {
                    self.phase = RevealPhase::Evaluating { remaining_ms };
                    return None;
                }
                Some(self.evaluate(scene, score))
            }
            RevealPhase::Reverting { remaining_ms } => {
                let remaining_ms = remaining_ms - dt_ms;
                if remaining_ms > 0.0 {
                    self.phase = RevealPhase::Reverting { remaining_ms };
                } else {
                    self.hide_pending(scene);
                }
                None
            }
        }
    }

    fn evaluate(&mut self, scene: &mut Scene, score: &mut ScoreKeeper) -> MatchResult {
        let pairs: Vec<String> = self
            .pending
            .iter()
            .map(|id| scene.entity(id).map(|e| e.pair_id.clone()).unwrap_or_default())
            .collect();
        let entities = self.pending.clone();
        let pair_id = pairs.first().cloned().unwrap_or_default();

        if pairs.len() == 2 && pairs[0] == pairs[1] && self.book.resolve(&pair_id) {
            for id in &self.pending {
                if let Some(e) = scene.entity_mut(id) {
                    e.inert = true;
                }
            }
            self.pending.clear();
            self.phase = RevealPhase::Open;
            MatchResult::correct(&pair_id, entities, None, score)
        } else {
            for pair in &pairs {
                self.book.record_miss(pair);
            }
            self.phase = RevealPhase::Reverting {
                remaining_ms: self.revert_delay_ms,
            };
            let result = MatchResult::incorrect(&pair_id, entities, None, score);
            if self.revert_delay_ms <= 0.0 {
                self.hide_pending(scene);
            }
            result
        }
    }

    fn hide_pending(&mut self, scene: &mut Scene) {
        for id in self.pending.drain(..) {
            if let Some(e) = scene.entity_mut(&id) {
                e.revealed = false;
            }
        }
        self.phase = RevealPhase::Open;
    }

    pub fn phase(&self) -> RevealPhase {
        self.phase
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn is_complete(&self) -> bool {
        self.book.all_resolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::Entity;
    use crate::geometry::Rect;

    fn cards(pairs: &[&str]) -> Scene {
        let mut scene = Scene::new();
        for (i, pair) in pairs.iter().enumerate() {
            for copy in 0..2 {
                let id = format!("{}{}", pair, copy + 1);
                let x = (i * 2 + copy) as f32 * 60.0;
                scene.add_entity(Entity::new(&id, pair, Rect::new(x, 0.0, 50.0, 50.0)).with_draggable(false));
            }
        }
        scene
    }

    fn setup(pairs: &[&str]) -> (Scene, RevealMatcher, ScoreKeeper) {
        let scene = cards(pairs);
        let config = MatchConfig {
            penalty_points: 5,
            ..MatchConfig::default()
        };
        let matcher = RevealMatcher::from_scene(&scene, &config);
        (scene, matcher, ScoreKeeper::new(&config))
    }

    #[test]
    fn test_pair_resolves_after_delay() {
        let (mut scene, mut m, mut score) = setup(&["a", "b"]);
        m.reveal(&mut scene, "a1");
        m.reveal(&mut scene, "a2");
        assert!(m.advance(&mut scene, 700.0, &mut score).is_none());
        let r = m.advance(&mut scene, 100.0, &mut score).unwrap();
        assert!(r.correct);
        assert_eq!(r.entity_ids, vec!["a1".to_string(), "a2".to_string()]);
        assert!(scene.entity("a1").unwrap().inert);
        assert_eq!(m.phase(), RevealPhase::Open);
        assert_eq!(m.moves(), 1);
    }

    #[test]
    fn test_third_reveal_locked() {
        let (mut scene, mut m, mut score) = setup(&["a", "b"]);
        m.reveal(&mut scene, "a1");
        m.reveal(&mut scene, "b1");
        assert_eq!(m.reveal(&mut scene, "a2"), RevealOutcome::Locked);
        assert!(!scene.entity("a2").unwrap().revealed);

        let r = m.advance(&mut scene, 800.0, &mut score).unwrap();
        assert!(!r.correct);
        // Still locked while the mismatch is on show.
        assert_eq!(m.reveal(&mut scene, "a2"), RevealOutcome::Locked);
        m.advance(&mut scene, 500.0, &mut score);
        assert!(!scene.entity("a1").unwrap().revealed);
        assert!(!scene.entity("b1").unwrap().revealed);
        assert!(matches!(m.reveal(&mut scene, "a2"), RevealOutcome::Revealed { pending: 1, .. }));
    }

    #[test]
    fn test_same_card_twice_ignored() {
        let (mut scene, mut m, _) = setup(&["a"]);
        m.reveal(&mut scene, "a1");
        assert_eq!(m.reveal(&mut scene, "a1"), RevealOutcome::Ignored);
        assert_eq!(m.pending().len(), 1);
    }

    #[test]
    fn test_resolved_card_ignored() {
        let (mut scene, mut m, mut score) = setup(&["a", "b"]);
        m.reveal(&mut scene, "a1");
        m.reveal(&mut scene, "a2");
        m.advance(&mut scene, 800.0, &mut score);
        assert_eq!(m.reveal(&mut scene, "a1"), RevealOutcome::Ignored);
        assert_eq!(score.score(), 100);
    }

    #[test]
    fn test_mismatch_penalty_floor() {
        let (mut scene, mut m, mut score) = setup(&["a", "b"]);
        m.reveal(&mut scene, "a1");
        m.reveal(&mut scene, "b2");
        let r = m.advance(&mut scene, 800.0, &mut score).unwrap();
        assert_eq!(r.points, 0);
        assert_eq!(score.score(), 0);
        assert_eq!(score.mistakes(), 1);
        assert_eq!(m.book.state("a").unwrap().attempts, 1);
        assert_eq!(m.book.state("b").unwrap().attempts, 1);
    }

    #[test]
    fn test_zero_delays_resolve_immediately() {
        let mut scene = cards(&["a", "b"]);
        let config = MatchConfig {
            reveal_eval_delay_ms: 0.0,
            reveal_revert_delay_ms: 0.0,
            ..MatchConfig::default()
        };
        let mut m = RevealMatcher::from_scene(&scene, &config);
        let mut score = ScoreKeeper::new(&config);
        m.reveal(&mut scene, "a1");
        m.reveal(&mut scene, "b1");
        let r = m.advance(&mut scene, 0.0, &mut score).unwrap();
        assert!(!r.correct);
        assert_eq!(m.phase(), RevealPhase::Open);
        assert!(!scene.entity("a1").unwrap().revealed);
    }

    #[test]
    fn test_complete() {
        let (mut scene, mut m, mut score) = setup(&["a"]);
        m.reveal(&mut scene, "a1");
        m.reveal(&mut scene, "a2");
        m.advance(&mut scene, 800.0, &mut score);
        assert!(m.is_complete());
    }
}
