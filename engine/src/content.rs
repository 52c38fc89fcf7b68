//! Level content handed to a variant at start: pieces, targets, sentence
//! words or body parts.
//!
//! Content comes from the caller's level tables; the builders here lay
//! pieces out on a simple grid so scripted levels only need to name their
//! pairs.

use anyhow::{anyhow, bail, Context};
use lexpr::Value;

use crate::drag::{Entity, Zone};
use crate::geometry::Rect;
use crate::pose::{body_part, BodyPart, Difficulty};
use crate::sexp::{atom_string, get_float, get_int, get_keyword, get_string, get_value, list_items, number};
use crate::variant::VariantKind;

/// Sentence used when a level supplies none.
pub const DEFAULT_SENTENCE: [&str; 4] = ["I", "see", "a", "cat"];

const ITEM_SIZE: f32 = 100.0;
const ITEM_GAP: f32 = 20.0;

/// Everything a variant needs to build its scene.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelContent {
    pub variant: VariantKind,
    pub entities: Vec<Entity>,
    pub zones: Vec<Zone>,
    /// Expected word order (sentence levels).
    pub sentence: Vec<String>,
    /// Body parts to hold, in order (body-parts levels).
    pub body_parts: Vec<BodyPart>,
}

impl LevelContent {
    /// Items in a left column, their zones in a right column.
    pub fn matching(pairs: &[&str]) -> Self {
        let mut entities = Vec::with_capacity(pairs.len());
        let mut zones = Vec::with_capacity(pairs.len());
        for (i, pair) in pairs.iter().enumerate() {
            let y = ITEM_GAP + i as f32 * (ITEM_SIZE + ITEM_GAP);
            entities.push(Entity::new(&format!("item-{}", pair), pair, Rect::new(ITEM_GAP, y, ITEM_SIZE, ITEM_SIZE)));
            // Zones run in reverse so items never start beside their match.
            let zy = ITEM_GAP + (pairs.len() - 1 - i) as f32 * (ITEM_SIZE + ITEM_GAP);
            zones.push(Zone::new(
                &format!("zone-{}", pair),
                pair,
                Rect::new(600.0, zy, ITEM_SIZE * 1.2, ITEM_SIZE * 1.2),
            ));
        }
        Self {
            variant: VariantKind::Matching,
            entities,
            zones,
            sentence: Vec::new(),
            body_parts: Vec::new(),
        }
    }

    /// Two face-down cards per pair on a four-column grid.  Copies are
    /// interleaved so twins are never adjacent.
    pub fn memory(pairs: &[&str]) -> Self {
        let mut entities = Vec::with_capacity(pairs.len() * 2);
        let n = pairs.len();
        for copy in 0..2 {
            for (i, pair) in pairs.iter().enumerate() {
                let slot = copy * n + if copy == 0 { i } else { n - 1 - i };
                let (col, row) = (slot % 4, slot / 4);
                let bounds = Rect::new(
                    ITEM_GAP + col as f32 * (ITEM_SIZE + ITEM_GAP),
                    ITEM_GAP + row as f32 * (ITEM_SIZE + ITEM_GAP),
                    ITEM_SIZE,
                    ITEM_SIZE,
                );
                entities.push(Entity::new(&format!("{}-{}", pair, copy + 1), pair, bounds).with_draggable(false));
            }
        }
        Self {
            variant: VariantKind::Memory,
            entities,
            zones: Vec::new(),
            sentence: Vec::new(),
            body_parts: Vec::new(),
        }
    }

    /// One slot per word in a top row and the word bank below, rotated by
    /// one so the first word is never first in the bank.  Punctuation
    /// tokens are dropped; an empty sentence falls back to
    /// [`DEFAULT_SENTENCE`].
    pub fn sentence(words: &[&str]) -> Self {
        let mut words: Vec<String> = words
            .iter()
            .filter(|w| !matches!(**w, "." | "?" | "!" | ","))
            .map(|w| w.to_string())
            .collect();
        if words.is_empty() {
            words = DEFAULT_SENTENCE.iter().map(|w| w.to_string()).collect();
        }

        let n = words.len();
        let mut entities = Vec::with_capacity(n);
        let mut zones = Vec::with_capacity(n);
        for (i, word) in words.iter().enumerate() {
            let x = ITEM_GAP + i as f32 * (ITEM_SIZE + ITEM_GAP);
            zones.push(Zone::new(&format!("slot-{}", i), &i.to_string(), Rect::new(x, 100.0, ITEM_SIZE, 60.0)).with_slot(i));
            let bank = (i + n - 1) % n;
            let bx = ITEM_GAP + bank as f32 * (ITEM_SIZE + ITEM_GAP);
            entities.push(
                Entity::new(&format!("word-{}", i), &i.to_string(), Rect::new(bx, 400.0, ITEM_SIZE, 60.0)).with_value(word),
            );
        }
        Self {
            variant: VariantKind::Sentence,
            entities,
            zones,
            sentence: words,
            body_parts: Vec::new(),
        }
    }

    pub fn body_parts(parts: Vec<BodyPart>) -> Self {
        Self {
            variant: VariantKind::BodyParts,
            entities: Vec::new(),
            zones: Vec::new(),
            sentence: Vec::new(),
            body_parts: parts,
        }
    }

    /// Parse a level plist, e.g.
    /// `(:variant matching :pairs ("cat" "dog"))`,
    /// `(:variant word-order :words ("I" "see" "a" "cat"))`,
    /// `(:variant body-parts :difficulty easy)` or
    /// `(:variant matching :entities ((:id "a" :pair "p" :bounds (0 0 50 50))) :zones (...))`.
    pub fn from_sexp(value: &Value) -> anyhow::Result<Self> {
        let name = get_keyword(value, "variant").ok_or_else(|| anyhow!("level is missing :variant"))?;
        let variant = VariantKind::from_str(&name).ok_or_else(|| anyhow!("unknown variant: {}", name))?;

        let mut content = match variant {
            VariantKind::Matching => Self::matching(&string_list(value, "pairs")?.iter().map(|s| s.as_str()).collect::<Vec<_>>()),
            VariantKind::Memory => Self::memory(&string_list(value, "pairs")?.iter().map(|s| s.as_str()).collect::<Vec<_>>()),
            VariantKind::Sentence => Self::sentence(&string_list(value, "words")?.iter().map(|s| s.as_str()).collect::<Vec<_>>()),
            VariantKind::BodyParts => {
                let named = string_list(value, "parts")?;
                let parts = if named.is_empty() {
                    let difficulty = match get_keyword(value, "difficulty") {
                        Some(d) => Difficulty::from_str(&d).ok_or_else(|| anyhow!("unknown difficulty: {}", d))?,
                        None => Difficulty::Easy,
                    };
                    let rotation = get_int(value, "rotation").unwrap_or(0).max(0) as usize;
                    difficulty.select_parts(rotation)
                } else {
                    named
                        .iter()
                        .map(|n| body_part(n).ok_or_else(|| anyhow!("unknown body part: {}", n)))
                        .collect::<anyhow::Result<Vec<_>>>()?
                };
                Self::body_parts(parts)
            }
        };

        if let Some(list) = get_value(value, "entities") {
            content.entities = list_items(list)
                .into_iter()
                .map(parse_entity)
                .collect::<anyhow::Result<Vec<_>>>()
                .context("parsing :entities")?;
            if variant == VariantKind::Memory {
                for e in &mut content.entities {
                    e.draggable = false;
                }
            }
        }
        if let Some(list) = get_value(value, "zones") {
            content.zones = list_items(list)
                .into_iter()
                .map(parse_zone)
                .collect::<anyhow::Result<Vec<_>>>()
                .context("parsing :zones")?;
        }
        Ok(content)
    }
}

/// A list of strings (or symbols) under `key`; missing means empty.
fn string_list(value: &Value, key: &str) -> anyhow::Result<Vec<String>> {
    match get_value(value, key) {
        None => Ok(Vec::new()),
        Some(Value::Null) | Some(Value::Nil) => Ok(Vec::new()),
        Some(list @ Value::Cons(_)) => Ok(list_items(list).into_iter().map(atom_string).collect()),
        Some(other) => bail!(":{} must be a list, got {}", key, other),
    }
}

fn parse_bounds(value: &Value) -> anyhow::Result<Rect> {
    let nums: Vec<f32> = list_items(value)
        .into_iter()
        .map(|v| number(v).map(|n| n as f32).ok_or_else(|| anyhow!("bounds must be numbers, got {}", v)))
        .collect::<anyhow::Result<_>>()?;
    match nums.as_slice() {
        [x, y, w, h] => Ok(Rect::new(*x, *y, *w, *h)),
        _ => bail!("bounds need (x y w h), got {} values", nums.len()),
    }
}

fn parse_entity(value: &Value) -> anyhow::Result<Entity> {
    let id = get_string(value, "id").ok_or_else(|| anyhow!("entity is missing :id"))?;
    let pair = get_string(value, "pair").unwrap_or_else(|| id.clone());
    let bounds = parse_bounds(get_value(value, "bounds").ok_or_else(|| anyhow!("entity {} is missing :bounds", id))?)?;
    let mut entity = Entity::new(&id, &pair, bounds);
    if let Some(v) = get_string(value, "value") {
        entity = entity.with_value(&v);
    }
    if let Some(z) = get_float(value, "z") {
        entity = entity.with_z(z as i32);
    }
    Ok(entity)
}

fn parse_zone(value: &Value) -> anyhow::Result<Zone> {
    let id = get_string(value, "id").ok_or_else(|| anyhow!("zone is missing :id"))?;
    let pair = get_string(value, "pair").unwrap_or_else(|| id.clone());
    let bounds = parse_bounds(get_value(value, "bounds").ok_or_else(|| anyhow!("zone {} is missing :bounds", id))?)?;
    let mut zone = Zone::new(&id, &pair, bounds);
    if let Some(slot) = get_int(value, "slot") {
        zone = zone.with_slot(slot.max(0) as usize);
    }
    Ok(zone)
}
