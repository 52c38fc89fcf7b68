//! Sentence building: words go into their slots strictly left to right.
//!
//! Words are dragged from the bank.  A drop on a slot must land on the
//! next open slot; a drop outside every slot counts as a tap and is judged
//! against the next expected word alone.

use anyhow::bail;
use tracing::info;

use super::scene_from;
use crate::content::LevelContent;
use crate::drag::Scene;
use crate::matching::{OrderedMatcher, ScoreKeeper};
use crate::scoring::ScoringConfig;
use crate::sexp::{bool_sexp, quote};
use crate::variant::{GameVariant, Hint, VariantConfig, VariantInput, VariantKind, VariantOutput};

pub struct SentenceGame {
    content: LevelContent,
    scene: Scene,
    matcher: OrderedMatcher,
    score: ScoreKeeper,
    scoring: ScoringConfig,
    paused: bool,
}

impl SentenceGame {
    pub fn new(content: LevelContent) -> anyhow::Result<Self> {
        if content.sentence.is_empty() {
            bail!("sentence level has no words");
        }
        for (i, word) in content.sentence.iter().enumerate() {
            if !content.entities.iter().any(|e| &e.value == word) {
                bail!("no word tile for {:?}", word);
            }
            if !content.zones.iter().any(|z| z.slot == Some(i)) {
                bail!("no slot for word {}", i);
            }
        }
        let config = VariantConfig::preset(VariantKind::Sentence);
        let mut game = Self {
            scene: Scene::new(),
            matcher: OrderedMatcher::new(Vec::new()),
            score: ScoreKeeper::new(&config.matching),
            scoring: ScoringConfig::sentence(),
            paused: false,
            content,
        };
        game.init(&config);
        Ok(game)
    }

    /// Index of the next slot to fill.
    pub fn next_index(&self) -> usize {
        self.matcher.next_index()
    }
}

impl GameVariant for SentenceGame {
    fn kind(&self) -> VariantKind {
        VariantKind::Sentence
    }

    fn init(&mut self, config: &VariantConfig) {
        self.scene = scene_from(&self.content);
        self.matcher = OrderedMatcher::new(self.content.sentence.clone());
        self.score = ScoreKeeper::new(&config.matching);
        self.scoring = config.scoring.clone();
        self.paused = false;
        info!("sentence: {} words", self.matcher.slot_count());
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

    /// Tiles carrying the next expected word, and the slot they go in.
    fn hint(&self) -> Option<Hint> {
        let expected = self.matcher.expected_value()?;
        Some(Hint {
            entity_ids: self
                .scene
                .entities
                .iter()
                .filter(|e| !e.inert && e.value == expected)
                .map(|e| e.id.clone())
                .collect(),
            zone_ids: self
                .scene
                .slot_zone(self.matcher.next_index())
                .map(|z| vec![z.id.clone()])
                .unwrap_or_default(),
            target: Some(expected.to_string()),
        })
    }

    fn on_input(&mut self, input: VariantInput<'_>) -> Vec<VariantOutput> {
        if self.paused {
            return Vec::new();
        }
        let result = match input {
            VariantInput::Drop(attempt) => match attempt.zone_id.as_deref() {
                Some(zone) => self
                    .matcher
                    .drop_on(&mut self.scene, &attempt.entity_id, zone, &mut self.score),
                None => self.matcher.tap(&mut self.scene, &attempt.entity_id, &mut self.score),
            },
            VariantInput::Reveal { entity_id } => self.matcher.tap(&mut self.scene, entity_id, &mut self.score),
            VariantInput::Pose { .. } | VariantInput::Tick { .. } => None,
        };
        result.map(VariantOutput::Match).into_iter().collect()
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
        self.matcher.slot_count() as u32
    }

    fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    fn status_sexp(&self) -> String {
        format!(
            "(:variant :sentence :paused {} :score {} :mistakes {} :next {} :expected {} :total {})",
            bool_sexp(self.paused),
            self.score.score(),
            self.score.mistakes(),
            self.matcher.next_index(),
            self.matcher
                .expected_value()
                .map(quote)
                .unwrap_or_else(|| "nil".to_string()),
            self.matcher.slot_count(),
        )
    }
}
