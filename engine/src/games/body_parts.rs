//! Body parts: touch and hold each named part in turn.
//!
//! Driven by pose frames only; pointer input has no effect.  Each
//! confirmed part earns the base points.  There are no wrong answers, so
//! mistakes stay at zero.

use anyhow::bail;
use tracing::info;

use crate::content::LevelContent;
use crate::drag::Scene;
use crate::matching::ScoreKeeper;
use crate::pose::{PoseConfig, PoseEvent, PoseTargetChecker};
use crate::scoring::ScoringConfig;
use crate::sexp::bool_sexp;
use crate::variant::{GameVariant, Hint, VariantConfig, VariantInput, VariantKind, VariantOutput};

pub struct BodyPartsGame {
    content: LevelContent,
    scene: Scene,
    checker: PoseTargetChecker,
    score: ScoreKeeper,
    scoring: ScoringConfig,
    paused: bool,
}

impl BodyPartsGame {
    pub fn new(content: LevelContent) -> anyhow::Result<Self> {
        if content.body_parts.is_empty() {
            bail!("body-parts level has no targets");
        }
        let config = VariantConfig::preset(VariantKind::BodyParts);
        let mut game = Self {
            scene: Scene::new(),
            checker: PoseTargetChecker::new(PoseConfig::default(), Vec::new()),
            score: ScoreKeeper::new(&config.matching),
            scoring: ScoringConfig::body_parts(),
            paused: false,
            content,
        };
        game.init(&config);
        Ok(game)
    }

    pub fn checker(&self) -> &PoseTargetChecker {
        &self.checker
    }
}

impl GameVariant for BodyPartsGame {
    fn kind(&self) -> VariantKind {
        VariantKind::BodyParts
    }

    fn init(&mut self, config: &VariantConfig) {
        self.scene = Scene::new();
        self.checker = PoseTargetChecker::from_parts(config.pose.clone(), &self.content.body_parts);
        self.score = ScoreKeeper::new(&config.matching);
        self.scoring = config.scoring.clone();
        self.paused = false;
        let names: Vec<&str> = self.content.body_parts.iter().map(|p| p.name).collect();
        info!("body-parts: targets {:?}", names);
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

    fn hint(&self) -> Option<Hint> {
        let target = self.checker.current_target()?;
        Some(Hint {
            target: Some(target.name.clone()),
            ..Hint::default()
        })
    }

    fn on_input(&mut self, input: VariantInput<'_>) -> Vec<VariantOutput> {
        if self.paused {
            return Vec::new();
        }
        let (keypoints, dt_ms) = match input {
            VariantInput::Pose { keypoints, dt_ms } => (keypoints, dt_ms),
            _ => return Vec::new(),
        };
        let events = self.checker.update(keypoints, dt_ms);
        for event in &events {
            if let PoseEvent::Confirmed { .. } = event {
                self.score.award();
            }
        }
        events.into_iter().map(VariantOutput::Pose).collect()
    }

    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn is_complete(&self) -> bool {
        self.checker.total() > 0 && self.checker.is_finished()
    }

    fn score(&self) -> i64 {
        self.score.score()
    }

    fn mistakes(&self) -> u32 {
        self.score.mistakes()
    }

    fn total_units(&self) -> u32 {
        self.checker.total() as u32
    }

    fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    fn status_sexp(&self) -> String {
        format!(
            "(:variant :body-parts :paused {} :score {} :pose {})",
            bool_sexp(self.paused),
            self.score.score(),
            self.checker.status_sexp(),
        )
    }
}
