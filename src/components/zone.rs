//! Interaction zones: prioritized hit regions owned by a scene.
//!
//! A zone reacts to gestures through per-kind callbacks. When a gesture
//! lands on several zones, the enabled zone with the highest priority that
//! handles that gesture kind gets it; among equal priorities the zone added
//! last wins. A panicking callback is logged and swallowed.

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{error, warn};
use rustc_hash::FxHashMap;

use crate::components::rect::Rect;
use crate::events::input::{Gesture, GestureKind};
use crate::events::{EventSystem, describe_panic};

pub type ZoneCallback = Box<dyn FnMut(&Gesture, &EventSystem)>;

pub struct InteractionZone {
    pub id: String,
    pub rect: Rect,
    pub priority: i32,
    pub enabled: bool,
    handlers: FxHashMap<GestureKind, ZoneCallback>,
}

impl InteractionZone {
    pub fn new(id: impl Into<String>, rect: Rect) -> Self {
        Self {
            id: id.into(),
            rect,
            priority: 0,
            enabled: true,
            handlers: FxHashMap::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a callback for one gesture kind, replacing any previous one.
    pub fn on(
        mut self,
        kind: GestureKind,
        callback: impl FnMut(&Gesture, &EventSystem) + 'static,
    ) -> Self {
        self.handlers.insert(kind, Box::new(callback));
        self
    }

    pub fn handles(&self, kind: GestureKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    fn accepts(&self, gesture: &Gesture) -> bool {
        let (x, y) = gesture.position();
        self.enabled && self.handles(gesture.kind()) && self.rect.contains(x, y)
    }
}

impl std::fmt::Debug for InteractionZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("InteractionZone")
            .field("id", &self.id)
            .field("rect", &self.rect)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .field("handlers", &kinds)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct InteractionZones {
    zones: Vec<InteractionZone>,
}

impl InteractionZones {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone. A duplicate id is rejected with a warning.
    pub fn add(&mut self, zone: InteractionZone) -> bool {
        if self.get(&zone.id).is_some() {
            warn!("interaction zone '{}' already exists, keeping the first", zone.id);
            return false;
        }
        self.zones.push(zone);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.zones.len();
        self.zones.retain(|z| z.id != id);
        self.zones.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&InteractionZone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut InteractionZone> {
        self.zones.iter_mut().find(|z| z.id == id)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.get_mut(id) {
            Some(zone) => {
                zone.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Topmost enabled zone under a point, regardless of handlers.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<&InteractionZone> {
        self.zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.enabled && z.rect.contains(x, y))
            .max_by_key(|(i, z)| (z.priority, *i))
            .map(|(_, z)| z)
    }

    /// Deliver `gesture` to the topmost zone handling it. Returns the id of
    /// the zone that received it.
    pub fn dispatch(&mut self, gesture: &Gesture, events: &EventSystem) -> Option<String> {
        let index = self
            .zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.accepts(gesture))
            .max_by_key(|(i, z)| (z.priority, *i))
            .map(|(i, _)| i)?;
        let zone = &mut self.zones[index];
        let callback = zone.handlers.get_mut(&gesture.kind())?;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(gesture, events))) {
            error!(
                "zone '{}' {} handler panicked: {}",
                zone.id,
                gesture.kind().name(),
                describe_panic(panic.as_ref())
            );
        }
        Some(zone.id.clone())
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InteractionZone> {
        self.zones.iter()
    }
}
