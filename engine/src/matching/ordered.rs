//! Ordered-tap match: items must be chosen in sequence.
//!
//! A single `next_index` only ever moves forward.  A tap is correct when
//! the item's value equals the value expected at `next_index`; a drop is
//! correct when it also lands on the slot for `next_index`.

use tracing::debug;

use super::{MatchBook, MatchResult, ScoreKeeper};
use crate::drag::Scene;

/// Sequence resolution (sentence building).
#[derive(Debug, Clone)]
pub struct OrderedMatcher {
    expected: Vec<String>,
    next_index: usize,
    /// One record per slot, keyed by slot index.
    pub book: MatchBook,
}

impl OrderedMatcher {
    pub fn new(expected: Vec<String>) -> Self {
        let book = MatchBook::new((0..expected.len()).map(|i| i.to_string()));
        Self {
            expected,
            next_index: 0,
            book,
        }
    }

    /// Value expected next, or `None` once complete.
    pub fn expected_value(&self) -> Option<&str> {
        self.expected.get(self.next_index).map(|s| s.as_str())
    }

    /// Judge a tap on `entity_id`.
    pub fn tap(&mut self, scene: &mut Scene, entity_id: &str, score: &mut ScoreKeeper) -> Option<MatchResult> {
        self.judge(scene, entity_id, None, score)
    }

    /// Judge a drop of `entity_id` onto `zone_id`.
    pub fn drop_on(
        &mut self,
        scene: &mut Scene,
        entity_id: &str,
        zone_id: &str,
        score: &mut ScoreKeeper,
    ) -> Option<MatchResult> {
        self.judge(scene, entity_id, Some(zone_id), score)
    }

    fn judge(
        &mut self,
        scene: &mut Scene,
        entity_id: &str,
        zone_id: Option<&str>,
        score: &mut ScoreKeeper,
    ) -> Option<MatchResult> {
        let expected = self.expected_value()?.to_string();
        let value = match scene.entity(entity_id) {
            Some(e) if !e.inert => e.value.clone(),
            _ => return None,
        };
        let slot_key = self.next_index.to_string();
        let target_zone = scene.slot_zone(self.next_index).map(|z| z.id.clone());

        let slot_ok = match zone_id {
            None => true,
            Some(z) => target_zone.as_deref() == Some(z),
        };
        let entities = vec![entity_id.to_string()];

        if value == expected && slot_ok && self.book.resolve(&slot_key) {
            if let Some(zone) = target_zone.as_deref() {
                scene.place_in_zone(entity_id, zone);
                if let Some(z) = scene.zone_mut(zone) {
                    z.inert = true;
                }
            }
            if let Some(e) = scene.entity_mut(entity_id) {
                e.inert = true;
            }
            debug!("slot {} filled with {:?}", self.next_index, value);
            self.next_index += 1;
            Some(MatchResult::correct(&slot_key, entities, target_zone, score))
        } else {
            self.book.record_miss(&slot_key);
            scene.return_to_origin(entity_id);
            Some(MatchResult::incorrect(
                &slot_key,
                entities,
                zone_id.map(|z| z.to_string()),
                score,
            ))
        }
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn slot_count(&self) -> usize {
        self.expected.len()
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.expected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::{Entity, Zone};
    use crate::geometry::Rect;
    use crate::matching::MatchConfig;

    fn sentence(words: &[&str]) -> (Scene, OrderedMatcher, ScoreKeeper) {
        let mut scene = Scene::new();
        for (i, w) in words.iter().enumerate() {
            let x = i as f32 * 100.0;
            scene.add_zone(Zone::new(&format!("slot-{}", i), &i.to_string(), Rect::new(x, 0.0, 90.0, 40.0)).with_slot(i));
            // Word bank in reverse order.
            let bank_x = (words.len() - 1 - i) as f32 * 100.0;
            scene.add_entity(
                Entity::new(&format!("word-{}", w), &i.to_string(), Rect::new(bank_x, 200.0, 90.0, 40.0))
                    .with_value(w),
            );
        }
        let matcher = OrderedMatcher::new(words.iter().map(|w| w.to_string()).collect());
        let config = MatchConfig {
            base_points: 50,
            penalty_points: 0,
            ..MatchConfig::default()
        };
        (scene, matcher, ScoreKeeper::new(&config))
    }

    #[test]
    fn test_out_of_order_tap_rejected() {
        let (mut scene, mut m, mut score) = sentence(&["I", "see", "a", "cat"]);
        let r = m.tap(&mut scene, "word-see", &mut score).unwrap();
        assert!(!r.correct);
        assert_eq!(m.next_index(), 0);
        assert_eq!(score.mistakes(), 1);
        assert!(!scene.entity("word-see").unwrap().inert);

        let r = m.tap(&mut scene, "word-I", &mut score).unwrap();
        assert!(r.correct);
        assert_eq!(m.next_index(), 1);
        assert_eq!(score.score(), 50);
        assert_eq!(scene.zone("slot-0").unwrap().occupant.as_deref(), Some("word-I"));
    }

    #[test]
    fn test_completes_at_slot_count() {
        let (mut scene, mut m, mut score) = sentence(&["I", "see", "a", "cat"]);
        for w in ["I", "see", "a", "cat"] {
            assert!(m.tap(&mut scene, &format!("word-{}", w), &mut score).unwrap().correct);
        }
        assert!(m.is_complete());
        assert_eq!(m.expected_value(), None);
        assert!(m.tap(&mut scene, "word-I", &mut score).is_none());
    }

    #[test]
    fn test_placed_word_is_idempotent() {
        let (mut scene, mut m, mut score) = sentence(&["I", "see"]);
        m.tap(&mut scene, "word-I", &mut score);
        assert!(m.tap(&mut scene, "word-I", &mut score).is_none());
        assert_eq!(m.next_index(), 1);
        assert_eq!(score.score(), 50);
    }

    #[test]
    fn test_drop_on_next_slot() {
        let (mut scene, mut m, mut score) = sentence(&["I", "see"]);
        assert!(m.drop_on(&mut scene, "word-I", "slot-0", &mut score).unwrap().correct);
        assert_eq!(m.next_index(), 1);
    }

    #[test]
    fn test_drop_on_later_slot_rejected() {
        let (mut scene, mut m, mut score) = sentence(&["I", "see"]);
        let r = m.drop_on(&mut scene, "word-see", "slot-1", &mut score).unwrap();
        assert!(!r.correct);
        assert_eq!(m.next_index(), 0);
        let see = scene.entity("word-see").unwrap();
        assert_eq!(see.bounds, see.home);
    }

    #[test]
    fn test_duplicate_words_either_copy_fits() {
        let mut scene = Scene::new();
        scene.add_entity(Entity::new("w1", "0", Rect::new(0.0, 0.0, 10.0, 10.0)).with_value("the"));
        scene.add_entity(Entity::new("w2", "1", Rect::new(20.0, 0.0, 10.0, 10.0)).with_value("the"));
        let mut m = OrderedMatcher::new(vec!["the".into(), "the".into()]);
        let mut score = ScoreKeeper::new(&MatchConfig::default());
        assert!(m.tap(&mut scene, "w2", &mut score).unwrap().correct);
        assert!(m.tap(&mut scene, "w1", &mut score).unwrap().correct);
        assert!(m.is_complete());
    }
}
