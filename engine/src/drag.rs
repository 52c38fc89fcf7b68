//! Scene entities, drop zones and per-source drag sessions.
//!
//! At most one session per pointer source and at most one session per
//! entity.  Every session ends in exactly one [`DropAttempt`], and closing
//! a session always clears the entity's lifted flag.

use std::collections::BTreeMap;

use tracing::debug;

use crate::geometry::{Point, Rect};
use crate::pointer::{PointerEvent, PointerSource};
use crate::sexp::{bool_sexp, format_event, quote};

// ── Scene ──────────────────────────────────────────────────

/// A selectable or draggable game piece.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    /// Identity shared with the entity's correct target.
    pub pair_id: String,
    /// Display value (word, picture name, ...).
    pub value: String,
    /// Current bounds; follows the drag proxy while lifted.
    pub bounds: Rect,
    /// Bounds the entity returns to after an unsuccessful drop.
    pub home: Rect,
    /// Stacking order; highest wins hit-tests.
    pub z: i32,
    /// Whether pointer acquisition may lift this entity.
    pub draggable: bool,
    /// Held by a drag session.
    pub lifted: bool,
    /// Matched; permanently excluded from hit-testing.
    pub inert: bool,
    /// Face-up (reveal games).
    pub revealed: bool,
}

impl Entity {
    pub fn new(id: &str, pair_id: &str, bounds: Rect) -> Self {
        Self {
            id: id.to_string(),
            pair_id: pair_id.to_string(),
            value: pair_id.to_string(),
            bounds,
            home: bounds,
            z: 0,
            draggable: true,
            lifted: false,
            inert: false,
            revealed: false,
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    pub fn with_draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }

    /// Whether hit-tests may select this entity.
    pub fn is_selectable(&self) -> bool {
        !self.lifted && !self.inert
    }

    pub fn to_sexp(&self) -> String {
        format!(
            "(:id {} :pair {} :value {} :bounds {} :lifted {} :inert {} :revealed {})",
            quote(&self.id),
            quote(&self.pair_id),
            quote(&self.value),
            self.bounds.to_sexp(),
            bool_sexp(self.lifted),
            bool_sexp(self.inert),
            bool_sexp(self.revealed),
        )
    }
}

/// A drop target.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: String,
    pub pair_id: String,
    pub bounds: Rect,
    /// Ordinal for ordered placement (sentence slots).
    pub slot: Option<usize>,
    /// Resolved; no further drops can land here.
    pub inert: bool,
    /// Entity placed in this zone, if any.
    pub occupant: Option<String>,
}

impl Zone {
    pub fn new(id: &str, pair_id: &str, bounds: Rect) -> Self {
        Self {
            id: id.to_string(),
            pair_id: pair_id.to_string(),
            bounds,
            slot: None,
            inert: false,
            occupant: None,
        }
    }

    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn to_sexp(&self) -> String {
        format!(
            "(:id {} :pair {} :bounds {} :slot {} :inert {} :occupant {})",
            quote(&self.id),
            quote(&self.pair_id),
            self.bounds.to_sexp(),
            self.slot.map(|s| s.to_string()).unwrap_or_else(|| "nil".to_string()),
            bool_sexp(self.inert),
            self.occupant.as_deref().map(quote).unwrap_or_else(|| "nil".to_string()),
        )
    }
}

/// Entities and zones for one level.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub entities: Vec<Entity>,
    pub zones: Vec<Zone>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn add_zone(&mut self, zone: Zone) {
        self.zones.push(zone);
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn zone_mut(&mut self, id: &str) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|z| z.id == id)
    }

    /// Zone for an ordered slot.
    pub fn slot_zone(&self, slot: usize) -> Option<&Zone> {
        self.zones.iter().find(|z| z.slot == Some(slot))
    }

    /// Topmost selectable entity under `pos`.  Equal z: the later entity
    /// is drawn on top and wins.
    pub fn entity_at(&self, pos: Point, draggable_only: bool) -> Option<&Entity> {
        self.entities
            .iter()
            .filter(|e| e.is_selectable() && (!draggable_only || e.draggable))
            .filter(|e| e.bounds.contains(pos))
            .fold(None, |best: Option<&Entity>, e| match best {
                Some(b) if b.z > e.z => Some(b),
                _ => Some(e),
            })
    }

    /// The non-inert zone containing `pos`, if any.
    pub fn zone_at(&self, pos: Point) -> Option<&Zone> {
        self.zones.iter().find(|z| !z.inert && z.bounds.contains(pos))
    }

    /// Send an entity back to where it started.
    pub fn return_to_origin(&mut self, id: &str) {
        if let Some(e) = self.entity_mut(id) {
            e.bounds = e.home;
        }
    }

    /// Place an entity into a zone: centered on it, and the zone records
    /// the occupant.
    pub fn place_in_zone(&mut self, entity_id: &str, zone_id: &str) {
        let center = match self.zone(zone_id) {
            Some(z) => z.bounds.center(),
            None => return,
        };
        if let Some(e) = self.entity_mut(entity_id) {
            let origin = Point::new(center.x - e.bounds.width / 2.0, center.y - e.bounds.height / 2.0);
            e.bounds = e.bounds.moved_to(origin);
        }
        if let Some(z) = self.zone_mut(zone_id) {
            z.occupant = Some(entity_id.to_string());
        }
    }

    /// Count of entities still open for matching.
    pub fn remaining(&self) -> usize {
        self.entities.iter().filter(|e| !e.inert).count()
    }

    pub fn status_sexp(&self) -> String {
        let entities: Vec<String> = self.entities.iter().map(|e| e.to_sexp()).collect();
        let zones: Vec<String> = self.zones.iter().map(|z| z.to_sexp()).collect();
        format!(
            "(:entities ({}) :zones ({}))",
            entities.join(" "),
            zones.join(" ")
        )
    }
}

// ── Sessions ───────────────────────────────────────────────

/// One grab-move-release interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub source: PointerSource,
    pub entity_id: String,
    /// Pointer position minus entity origin at acquisition.
    pub grab_offset: Point,
    /// Zone currently hovered, for feedback.
    pub active_zone: Option<String>,
    /// Last pointer position seen by this session.
    pub last_pos: Point,
}

/// Result of closing a session.  `zone_id == None` means dropped outside
/// every zone.
#[derive(Debug, Clone, PartialEq)]
pub struct DropAttempt {
    pub source: PointerSource,
    pub entity_id: String,
    pub zone_id: Option<String>,
    pub pos: Point,
}

impl DropAttempt {
    pub fn to_sexp(&self) -> String {
        format_event(
            "drop-attempt",
            &[
                ("source", &quote(&self.source.to_string())),
                ("entity", &quote(&self.entity_id)),
                (
                    "zone",
                    &self.zone_id.as_deref().map(quote).unwrap_or_else(|| "nil".to_string()),
                ),
            ],
        )
    }
}

/// Hover change on a session's active zone.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverChange {
    pub source: PointerSource,
    pub entity_id: String,
    pub zone_id: Option<String>,
}

impl HoverChange {
    pub fn to_sexp(&self) -> String {
        format_event(
            "hover-change",
            &[
                ("source", &quote(&self.source.to_string())),
                ("entity", &quote(&self.entity_id)),
                (
                    "zone",
                    &self.zone_id.as_deref().map(quote).unwrap_or_else(|| "nil".to_string()),
                ),
            ],
        )
    }
}

/// What an acquisition did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Acquired {
    /// Entity now carried by the session.
    pub lifted: Option<String>,
    /// Drop of a session this source still had open.
    pub replaced: Option<DropAttempt>,
}

/// Feedback from one pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    Hover(HoverChange),
    Drop(DropAttempt),
}

/// Owns every open drag session, keyed by pointer source.
#[derive(Debug, Default)]
pub struct DragSessionManager {
    sessions: BTreeMap<PointerSource, DragSession>,
}

impl DragSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a unified pointer event.  Releases, and acquisitions that
    /// replace an open session, produce a drop; moves may change hover.
    pub fn handle(&mut self, scene: &mut Scene, event: &PointerEvent) -> Option<DragEvent> {
        match *event {
            PointerEvent::Acquire { source, pos } => self.acquire(scene, source, pos).replaced.map(DragEvent::Drop),
            PointerEvent::Move { source, pos } => self.move_to(scene, source, pos).map(DragEvent::Hover),
            PointerEvent::Release { source, pos } => self.release(scene, source, pos).map(DragEvent::Drop),
        }
    }

    /// Lift the topmost draggable entity under `pos`.  A session `source`
    /// still had open is closed first and its drop returned.
    pub fn acquire(&mut self, scene: &mut Scene, source: PointerSource, pos: Point) -> Acquired {
        let mut acquired = Acquired::default();
        if self.sessions.contains_key(&source) {
            debug!("{}: stale drag session replaced", source);
            acquired.replaced = self.close(scene, source, pos);
        }

        let entity = match scene.entity_at(pos, true) {
            Some(e) => e,
            None => return acquired,
        };
        let entity_id = entity.id.clone();
        let grab_offset = pos.offset_from(entity.bounds.origin());
        if let Some(e) = scene.entity_mut(&entity_id) {
            e.lifted = true;
        }

        debug!("{}: lifted {}", source, entity_id);
        self.sessions.insert(
            source,
            DragSession {
                source,
                entity_id: entity_id.clone(),
                grab_offset,
                active_zone: None,
                last_pos: pos,
            },
        );
        acquired.lifted = Some(entity_id);
        acquired
    }

    /// Reposition the drag proxy and recompute the hovered zone.  Returns
    /// a change only when the hovered zone differs from before.
    pub fn move_to(&mut self, scene: &mut Scene, source: PointerSource, pos: Point) -> Option<HoverChange> {
        let session = self.sessions.get_mut(&source)?;
        session.last_pos = pos;
        let origin = pos.offset_from(session.grab_offset);
        if let Some(e) = scene.entity_mut(&session.entity_id) {
            e.bounds = e.bounds.moved_to(origin);
        }

        let zone = scene.zone_at(pos).map(|z| z.id.clone());
        if zone == session.active_zone {
            return None;
        }
        session.active_zone = zone.clone();
        Some(HoverChange {
            source,
            entity_id: session.entity_id.clone(),
            zone_id: zone,
        })
    }

    /// Close the session for `source` and emit its drop attempt.
    pub fn release(&mut self, scene: &mut Scene, source: PointerSource, pos: Point) -> Option<DropAttempt> {
        // The release position decides the zone; a release with no prior
        // move still lands where it happened.
        if let Some(session) = self.sessions.get_mut(&source) {
            session.active_zone = scene.zone_at(pos).map(|z| z.id.clone());
        }
        self.close(scene, source, pos)
    }

    fn close(&mut self, scene: &mut Scene, source: PointerSource, pos: Point) -> Option<DropAttempt> {
        let session = self.sessions.remove(&source)?;
        if let Some(e) = scene.entity_mut(&session.entity_id) {
            e.lifted = false;
        }
        if session.active_zone.is_none() {
            scene.return_to_origin(&session.entity_id);
        }
        let attempt = DropAttempt {
            source,
            entity_id: session.entity_id,
            zone_id: session.active_zone,
            pos,
        };
        debug!(
            "{}: dropped {} on {}",
            source,
            attempt.entity_id,
            attempt.zone_id.as_deref().unwrap_or("nothing")
        );
        Some(attempt)
    }

    /// Close every session whose source matches `filter` at its last known
    /// position, outside any zone.
    pub fn cancel_where<F>(&mut self, scene: &mut Scene, filter: F) -> Vec<DropAttempt>
    where
        F: Fn(&PointerSource) -> bool,
    {
        let sources: Vec<PointerSource> = self.sessions.keys().copied().filter(|s| filter(s)).collect();
        let mut attempts = Vec::with_capacity(sources.len());
        for source in sources {
            if let Some(session) = self.sessions.get_mut(&source) {
                session.active_zone = None;
                let pos = session.last_pos;
                attempts.extend(self.close(scene, source, pos));
            }
        }
        attempts
    }

    /// Drop every session (level exit, reset).  Lifted flags are cleared.
    pub fn clear(&mut self, scene: &mut Scene) -> Vec<DropAttempt> {
        self.cancel_where(scene, |_| true)
    }

    pub fn session(&self, source: PointerSource) -> Option<&DragSession> {
        self.sessions.get(&source)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Session currently holding `entity_id`, if any.
    pub fn owner_of(&self, entity_id: &str) -> Option<PointerSource> {
        self.sessions
            .values()
            .find(|s| s.entity_id == entity_id)
            .map(|s| s.source)
    }

    pub fn status_sexp(&self) -> String {
        let sessions: Vec<String> = self
            .sessions
            .values()
            .map(|s| {
                format!(
                    "(:source \"{}\" :entity {} :zone {})",
                    s.source,
                    quote(&s.entity_id),
                    s.active_zone.as_deref().map(quote).unwrap_or_else(|| "nil".to_string())
                )
            })
            .collect();
        format!("({})", sessions.join(" "))
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Two cards on the left, two zones on the right.
#[cfg(test)]
pub(crate) fn make_scene() -> Scene {
    let mut scene = Scene::new();
    scene.add_entity(Entity::new("cat-card", "cat", Rect::new(0.0, 0.0, 50.0, 50.0)));
    scene.add_entity(Entity::new("dog-card", "dog", Rect::new(0.0, 100.0, 50.0, 50.0)));
    scene.add_zone(Zone::new("cat-zone", "cat", Rect::new(200.0, 0.0, 80.0, 80.0)));
    scene.add_zone(Zone::new("dog-zone", "dog", Rect::new(200.0, 100.0, 80.0, 80.0)));
    scene
}

// ── Tests ──────────────────────────────────────────────────
