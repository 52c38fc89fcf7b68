//! Drag-to-match: every item has one zone sharing its pair id.

use anyhow::bail;
use tracing::info;

use super::scene_from;
use crate::content::LevelContent;
use crate::drag::Scene;
use crate::matching::{DirectMatcher, ScoreKeeper};
use crate::scoring::ScoringConfig;
use crate::sexp::bool_sexp;
use crate::variant::{GameVariant, Hint, VariantConfig, VariantInput, VariantKind, VariantOutput};

pub struct MatchingGame {
    content: LevelContent,
    scene: Scene,
    matcher: DirectMatcher,
    score: ScoreKeeper,
    scoring: ScoringConfig,
    paused: bool,
}

impl MatchingGame {
    /// Level needs at least one zone and one draggable item.
    pub fn new(content: LevelContent) -> anyhow::Result<Self> {
        if content.zones.is_empty() || !content.entities.iter().any(|e| e.draggable) {
            bail!("matching level needs at least one item and one zone");
        }
        let mut game = Self {
            scene: Scene::new(),
            matcher: DirectMatcher::default(),
            score: ScoreKeeper::new(&Default::default()),
            scoring: ScoringConfig::matching(),
            paused: false,
            content,
        };
        game.init(&VariantConfig::preset(VariantKind::Matching));
        Ok(game)
    }
}

impl GameVariant for MatchingGame {
    fn kind(&self) -> VariantKind {
        VariantKind::Matching
    }

    fn init(&mut self, config: &VariantConfig) {
        self.scene = scene_from(&self.content);
        self.matcher = DirectMatcher::from_scene(&self.scene);
        self.score = ScoreKeeper::new(&config.matching);
        self.scoring = config.scoring.clone();
        self.paused = false;
        info!(
            "matching: {} items, {} pairs",
            self.scene.entities.len(),
            self.matcher.book.total()
        );
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    /// First unmatched pair: its item and its zone.
    fn hint(&self) -> Option<Hint> {
        let pair = self.matcher.book.first_unresolved()?;
        Some(Hint {
            entity_ids: self
                .scene
                .entities
                .iter()
                .filter(|e| e.pair_id == pair && !e.inert)
                .map(|e| e.id.clone())
                .collect(),
            zone_ids: self
                .scene
                .zones
                .iter()
                .filter(|z| z.pair_id == pair && !z.inert)
                .map(|z| z.id.clone())
                .collect(),
            target: Some(pair.to_string()),
        })
    }

    fn on_input(&mut self, input: VariantInput<'_>) -> Vec<VariantOutput> {
        if self.paused {
            return Vec::new();
        }
        match input {
            VariantInput::Drop(attempt) => self
                .matcher
                .resolve_drop(&mut self.scene, attempt, &mut self.score)
                .map(VariantOutput::Match)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }

    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn is_complete(&self) -> bool {
        self.matcher.is_complete()
    }

    fn score(&self) -> i64 {
        self.score.score()
    }

    fn mistakes(&self) -> u32 {
        self.score.mistakes()
    }

    fn total_units(&self) -> u32 {
        self.matcher.book.total() as u32
    }

    fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    fn status_sexp(&self) -> String {
        format!(
            "(:variant :matching :paused {} :score {} :mistakes {} :matched {} :total {} :pairs {})",
            bool_sexp(self.paused),
            self.score.score(),
            self.score.mistakes(),
            self.matcher.book.resolved_count(),
            self.matcher.book.total(),
            self.matcher.book.status_sexp(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::DropAttempt;
    use crate::geometry::Point;
    use crate::pointer::PointerSource;

    fn drop(entity: &str, zone: Option<&str>) -> DropAttempt {
        DropAttempt {
            source: PointerSource::Mouse,
            entity_id: entity.to_string(),
            zone_id: zone.map(|z| z.to_string()),
            pos: Point::new(0.0, 0.0),
        }
    }

    fn game() -> MatchingGame {
        MatchingGame::new(LevelContent::matching(&["cat", "dog"])).unwrap()
    }

    #[test]
    fn test_drops_resolve_to_completion() {
        let mut g = game();
        let out = g.on_input(VariantInput::Drop(&drop("item-cat", Some("zone-dog"))));
        assert!(matches!(&out[..], [VariantOutput::Match(r)] if !r.correct));
        g.on_input(VariantInput::Drop(&drop("item-cat", Some("zone-cat"))));
        assert!(!g.is_complete());
        g.on_input(VariantInput::Drop(&drop("item-dog", Some("zone-dog"))));
        assert!(g.is_complete());
        // The opening miss is floored at 0, so no penalty carries over.
        assert_eq!(g.score(), 200);
        assert_eq!(g.mistakes(), 1);
        assert_eq!(g.total_units(), 2);
    }

    #[test]
    fn test_paused_ignores_drops() {
        let mut g = game();
        g.pause();
        assert!(g.on_input(VariantInput::Drop(&drop("item-cat", Some("zone-cat")))).is_empty());
        assert!(!g.matcher.book.is_resolved("cat"));
        g.resume();
        assert_eq!(g.on_input(VariantInput::Drop(&drop("item-cat", Some("zone-cat")))).len(), 1);
    }

    #[test]
    fn test_hint_moves_on() {
        let mut g = game();
        let hint = g.hint().unwrap();
        assert_eq!(hint.entity_ids, vec!["item-cat".to_string()]);
        assert_eq!(hint.zone_ids, vec!["zone-cat".to_string()]);
        g.on_input(VariantInput::Drop(&drop("item-cat", Some("zone-cat"))));
        assert_eq!(g.hint().unwrap().target.as_deref(), Some("dog"));
    }

    #[test]
    fn test_init_restarts_level() {
        let mut g = game();
        g.on_input(VariantInput::Drop(&drop("item-cat", Some("zone-cat"))));
        g.init(&VariantConfig::preset(VariantKind::Matching));
        assert_eq!(g.score(), 0);
        assert!(!g.scene().entity("item-cat").unwrap().inert);
    }
}
