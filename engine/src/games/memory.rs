//! Memory pairs: cards start face-down and are revealed two at a time.

use anyhow::bail;
use tracing::{debug, info};

use super::scene_from;
use crate::content::LevelContent;
use crate::drag::Scene;
use crate::matching::{RevealMatcher, RevealOutcome, ScoreKeeper};
use crate::scoring::ScoringConfig;
use crate::sexp::bool_sexp;
use crate::variant::{GameVariant, Hint, VariantConfig, VariantInput, VariantKind, VariantOutput};

pub struct MemoryGame {
    content: LevelContent,
    scene: Scene,
    matcher: RevealMatcher,
    score: ScoreKeeper,
    scoring: ScoringConfig,
    paused: bool,
}

impl MemoryGame {
    /// Every pair id must appear exactly twice.
    pub fn new(content: LevelContent) -> anyhow::Result<Self> {
        if content.entities.is_empty() {
            bail!("memory level needs at least one pair of cards");
        }
        for entity in &content.entities {
            let copies = content
                .entities
                .iter()
                .filter(|e| e.pair_id == entity.pair_id)
                .count();
            if copies != 2 {
                bail!("memory pair {:?} has {} cards, expected 2", entity.pair_id, copies);
            }
        }
        let config = VariantConfig::preset(VariantKind::Memory);
        let scene = Scene::new();
        let mut game = Self {
            matcher: RevealMatcher::from_scene(&scene, &config.matching),
            scene,
            score: ScoreKeeper::new(&config.matching),
            scoring: ScoringConfig::memory(),
            paused: false,
            content,
        };
        game.init(&config);
        Ok(game)
    }

    pub fn matcher(&self) -> &RevealMatcher {
        &self.matcher
    }
}

impl GameVariant for MemoryGame {
    fn kind(&self) -> VariantKind {
        VariantKind::Memory
    }

    fn init(&mut self, config: &VariantConfig) {
        self.scene = scene_from(&self.content);
        for entity in &mut self.scene.entities {
            entity.draggable = false;
            entity.revealed = false;
        }
        self.matcher = RevealMatcher::from_scene(&self.scene, &config.matching);
        self.score = ScoreKeeper::new(&config.matching);
        self.scoring = config.scoring.clone();
        self.paused = false;
        info!(
            "memory: {} cards, {} pairs",
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

    /// Both cards of the first unmatched pair.
    fn hint(&self) -> Option<Hint> {
        let pair = self.matcher.book.first_unresolved()?;
        Some(Hint {
            entity_ids: self
                .scene
                .entities
                .iter()
                .filter(|e| e.pair_id == pair)
                .map(|e| e.id.clone())
                .collect(),
            zone_ids: Vec::new(),
            target: Some(pair.to_string()),
        })
    }

    fn on_input(&mut self, input: VariantInput<'_>) -> Vec<VariantOutput> {
        if self.paused {
            return Vec::new();
        }
        let mut out = Vec::new();
        match input {
            VariantInput::Reveal { entity_id } => match self.matcher.reveal(&mut self.scene, entity_id) {
                RevealOutcome::Revealed { entity_id, .. } => {
                    out.push(VariantOutput::Revealed { entity_id });
                    // Zero delays evaluate within the same input.
                    out.extend(
                        self.matcher
                            .advance(&mut self.scene, 0.0, &mut self.score)
                            .map(VariantOutput::Match),
                    );
                }
                outcome => debug!("memory: reveal {} -> {:?}", entity_id, outcome),
            },
            VariantInput::Tick { dt_ms } => {
                out.extend(
                    self.matcher
                        .advance(&mut self.scene, dt_ms, &mut self.score)
                        .map(VariantOutput::Match),
                );
            }
            VariantInput::Drop(_) | VariantInput::Pose { .. } => {}
        }
        out
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

    /// Mismatched turns.
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
            "(:variant :memory :paused {} :score {} :mistakes {} :moves {} :phase :{} :pending {} :matched {} :total {})",
            bool_sexp(self.paused),
            self.score.score(),
            self.score.mistakes(),
            self.matcher.moves(),
            self.matcher.phase().as_str(),
            self.matcher.pending().len(),
            self.matcher.book.resolved_count(),
            self.matcher.book.total(),
        )
    }
}
