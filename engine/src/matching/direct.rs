//! Direct drop-match: an item is correct on the zone sharing its pair id.

use tracing::trace;

use super::{MatchBook, MatchResult, ScoreKeeper};
use crate::drag::{DropAttempt, Scene};

/// Drop-onto-zone resolution.
#[derive(Debug, Clone, Default)]
pub struct DirectMatcher {
    pub book: MatchBook,
}

impl DirectMatcher {
    /// Build the book from the scene's zones.
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            book: MatchBook::new(scene.zones.iter().map(|z| z.pair_id.clone())),
        }
    }

    /// Judge a drop.  Drops outside every zone, and drops of items whose
    /// pair is already resolved, produce no result.
    pub fn resolve_drop(
        &mut self,
        scene: &mut Scene,
        attempt: &DropAttempt,
        score: &mut ScoreKeeper,
    ) -> Option<MatchResult> {
        let zone_id = match attempt.zone_id.as_deref() {
            Some(z) => z,
            None => {
                trace!("{} dropped outside any zone", attempt.entity_id);
                return None;
            }
        };
        let (entity_pair, entity_inert) = {
            let e = scene.entity(&attempt.entity_id)?;
            (e.pair_id.clone(), e.inert)
        };
        let (zone_pair, zone_inert) = {
            let z = scene.zone(zone_id)?;
            (z.pair_id.clone(), z.inert)
        };

        if entity_inert || zone_inert || self.book.is_resolved(&entity_pair) {
            scene.return_to_origin(&attempt.entity_id);
            return None;
        }

        let entities = vec![attempt.entity_id.clone()];
        if entity_pair == zone_pair && self.book.resolve(&entity_pair) {
            scene.place_in_zone(&attempt.entity_id, zone_id);
            if let Some(e) = scene.entity_mut(&attempt.entity_id) {
                e.inert = true;
            }
            if let Some(z) = scene.zone_mut(zone_id) {
                z.inert = true;
            }
            Some(MatchResult::correct(&entity_pair, entities, Some(zone_id.to_string()), score))
        } else {
            self.book.record_miss(&entity_pair);
            scene.return_to_origin(&attempt.entity_id);
            Some(MatchResult::incorrect(&entity_pair, entities, Some(zone_id.to_string()), score))
        }
    }

    pub fn is_complete(&self) -> bool {
        self.book.all_resolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::make_scene;
    use crate::geometry::Point;
    use crate::matching::MatchConfig;
    use crate::pointer::PointerSource;

    fn drop(entity: &str, zone: Option<&str>) -> DropAttempt {
        DropAttempt {
            source: PointerSource::Mouse,
            entity_id: entity.to_string(),
            zone_id: zone.map(|z| z.to_string()),
            pos: Point::new(0.0, 0.0),
        }
    }

    #[test]
    fn test_correct_drop_resolves() {
        let mut scene = make_scene();
        let mut m = DirectMatcher::from_scene(&scene);
        let mut score = ScoreKeeper::new(&MatchConfig::default());
        let r = m.resolve_drop(&mut scene, &drop("cat-card", Some("cat-zone")), &mut score).unwrap();
        assert!(r.correct);
        assert_eq!(score.score(), 100);
        assert!(scene.entity("cat-card").unwrap().inert);
        assert!(scene.zone("cat-zone").unwrap().inert);
        assert!(m.book.is_resolved("cat"));
    }

    #[test]
    fn test_wrong_zone_counts_attempt() {
        let mut scene = make_scene();
        let mut m = DirectMatcher::from_scene(&scene);
        let mut score = ScoreKeeper::new(&MatchConfig::default());
        let r = m.resolve_drop(&mut scene, &drop("cat-card", Some("dog-zone")), &mut score).unwrap();
        assert!(!r.correct);
        assert_eq!(score.mistakes(), 1);
        assert_eq!(score.score(), 0);
        assert_eq!(m.book.state("cat").unwrap().attempts, 1);
        assert!(!m.book.is_resolved("cat"));
        let cat = scene.entity("cat-card").unwrap();
        assert_eq!(cat.bounds, cat.home);
    }

    #[test]
    fn test_outside_drop_has_no_result() {
        let mut scene = make_scene();
        let mut m = DirectMatcher::from_scene(&scene);
        let mut score = ScoreKeeper::new(&MatchConfig::default());
        assert!(m.resolve_drop(&mut scene, &drop("cat-card", None), &mut score).is_none());
        assert_eq!(score.mistakes(), 0);
    }

    #[test]
    fn test_resolved_pair_is_idempotent() {
        let mut scene = make_scene();
        let mut m = DirectMatcher::from_scene(&scene);
        let mut score = ScoreKeeper::new(&MatchConfig::default());
        m.resolve_drop(&mut scene, &drop("cat-card", Some("cat-zone")), &mut score);
        let before = (m.book.state("cat"), score.score(), score.mistakes());
        assert!(m.resolve_drop(&mut scene, &drop("cat-card", Some("cat-zone")), &mut score).is_none());
        assert!(m.resolve_drop(&mut scene, &drop("cat-card", Some("dog-zone")), &mut score).is_none());
        assert_eq!(before, (m.book.state("cat"), score.score(), score.mistakes()));
    }

    #[test]
    fn test_complete_after_all_pairs() {
        let mut scene = make_scene();
        let mut m = DirectMatcher::from_scene(&scene);
        let mut score = ScoreKeeper::new(&MatchConfig::default());
        m.resolve_drop(&mut scene, &drop("cat-card", Some("cat-zone")), &mut score);
        assert!(!m.is_complete());
        m.resolve_drop(&mut scene, &drop("dog-card", Some("dog-zone")), &mut score);
        assert!(m.is_complete());
    }
}
