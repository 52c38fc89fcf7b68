//! Built-in game variants and the registry that creates them by name.
//!
//! Each variant pairs one resolution policy with a level's content:
//!
//! - [`matching`]: drag items onto their zones.
//! - [`memory`]: reveal cards two at a time.
//! - [`sentence`]: place words in order.
//! - [`body_parts`]: hold a hand on each named body part.

pub mod body_parts;
pub mod matching;
pub mod memory;
pub mod sentence;

use std::collections::BTreeMap;

use anyhow::{anyhow, bail};
use tracing::debug;

use crate::content::LevelContent;
use crate::drag::Scene;
use crate::variant::{GameVariant, VariantKind};

pub use body_parts::BodyPartsGame;
pub use matching::MatchingGame;
pub use memory::MemoryGame;
pub use sentence::SentenceGame;

/// Builds a variant from level content.
pub type Factory = fn(LevelContent) -> anyhow::Result<Box<dyn GameVariant>>;

/// Fresh scene from level content (homes reset to the authored bounds).
pub(crate) fn scene_from(content: &LevelContent) -> Scene {
    let mut scene = Scene::new();
    for entity in &content.entities {
        scene.add_entity(entity.clone());
    }
    for zone in &content.zones {
        scene.add_zone(zone.clone());
    }
    scene
}

fn create_matching(content: LevelContent) -> anyhow::Result<Box<dyn GameVariant>> {
    Ok(Box::new(MatchingGame::new(content)?))
}

fn create_memory(content: LevelContent) -> anyhow::Result<Box<dyn GameVariant>> {
    Ok(Box::new(MemoryGame::new(content)?))
}

fn create_sentence(content: LevelContent) -> anyhow::Result<Box<dyn GameVariant>> {
    Ok(Box::new(SentenceGame::new(content)?))
}

fn create_body_parts(content: LevelContent) -> anyhow::Result<Box<dyn GameVariant>> {
    Ok(Box::new(BodyPartsGame::new(content)?))
}

/// Variant factories keyed by name and alias.
pub struct GameRegistry {
    factories: BTreeMap<String, (VariantKind, Factory)>,
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl GameRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the four built-in variants under their canonical
    /// names and level-type aliases.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_all(VariantKind::Matching, &["matching", "drag-drop", "match"], create_matching);
        registry.register_all(VariantKind::Memory, &["memory", "pairs"], create_memory);
        registry.register_all(VariantKind::Sentence, &["sentence", "word-order"], create_sentence);
        registry.register_all(VariantKind::BodyParts, &["body-parts", "body_parts", "pose"], create_body_parts);
        registry
    }

    fn register_all(&mut self, kind: VariantKind, names: &[&str], factory: Factory) {
        for name in names {
            self.register(name, kind, factory);
        }
    }

    /// Add or replace a factory.
    pub fn register(&mut self, name: &str, kind: VariantKind, factory: Factory) {
        if self.factories.insert(name.to_string(), (kind, factory)).is_some() {
            debug!("registry: replaced factory for {}", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    /// Create the variant registered as `name` for `content`.
    pub fn create(&self, name: &str, content: LevelContent) -> anyhow::Result<Box<dyn GameVariant>> {
        let (kind, factory) = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("no game variant registered as {:?}", name))?;
        if *kind != content.variant {
            bail!("{} content cannot start the {} variant", content.variant, kind);
        }
        factory(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Difficulty;

    #[test]
    fn test_builtin_names_and_aliases() {
        let registry = GameRegistry::with_builtin();
        for name in ["matching", "drag-drop", "memory", "pairs", "sentence", "word-order", "body-parts"] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(!registry.contains("chess"));
    }

    #[test]
    fn test_create_by_alias() {
        let registry = GameRegistry::with_builtin();
        let game = registry
            .create("word-order", LevelContent::sentence(&["We", "run"]))
            .unwrap();
        assert_eq!(game.kind(), VariantKind::Sentence);
        assert_eq!(game.total_units(), 2);
    }

    #[test]
    fn test_create_rejects_unknown_and_mismatched() {
        let registry = GameRegistry::with_builtin();
        assert!(registry.create("chess", LevelContent::matching(&["a"])).is_err());
        assert!(registry.create("memory", LevelContent::matching(&["a"])).is_err());
    }

    #[test]
    fn test_create_rejects_empty_levels() {
        let registry = GameRegistry::with_builtin();
        assert!(registry.create("matching", LevelContent::matching(&[])).is_err());
        assert!(registry.create("memory", LevelContent::memory(&[])).is_err());
        assert!(registry.create("body-parts", LevelContent::body_parts(Vec::new())).is_err());
        assert!(registry
            .create("body-parts", LevelContent::body_parts(Difficulty::Easy.select_parts(0)))
            .is_ok());
    }

    #[test]
    fn test_register_custom_name() {
        let mut registry = GameRegistry::new();
        registry.register("quiz", VariantKind::Matching, create_matching);
        assert_eq!(registry.names(), vec!["quiz"]);
        assert!(registry.create("quiz", LevelContent::matching(&["a", "b"])).is_ok());
    }
}
