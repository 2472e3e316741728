//! Item inventory with an optional capacity and a single selected item.
//!
//! Topics: `inventory:add` and `inventory:remove` with the item id,
//! `inventory:select` with the item id or an empty payload on deselect.

use log::{debug, warn};

use crate::events::{EventSystem, Payload, topics};
use crate::plugins::{Plugin, PluginContext};

#[derive(Debug, Default)]
pub struct InventoryPlugin {
    items: Vec<String>,
    selected: Option<String>,
    capacity: Option<usize>,
}

impl InventoryPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.items.len() >= cap)
    }

    /// Add an item. False if it is already held or the inventory is full.
    pub fn add(&mut self, item: &str, events: &EventSystem) -> bool {
        if self.has(item) {
            return false;
        }
        if self.is_full() {
            warn!("inventory full, '{}' not added", item);
            return false;
        }
        self.items.push(item.to_string());
        events.emit(topics::INVENTORY_ADD, &Payload::text(item));
        true
    }

    /// Remove an item, deselecting it if needed.
    pub fn remove(&mut self, item: &str, events: &EventSystem) -> bool {
        let Some(pos) = self.items.iter().position(|i| i == item) else {
            return false;
        };
        self.items.remove(pos);
        if self.selected.as_deref() == Some(item) {
            self.selected = None;
            events.emit(topics::INVENTORY_SELECT, &Payload::Empty);
        }
        events.emit(topics::INVENTORY_REMOVE, &Payload::text(item));
        true
    }

    pub fn has(&self, item: &str) -> bool {
        self.items.iter().any(|i| i == item)
    }

    /// Held items in the order they were added.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Select a held item, or clear the selection with `None`.
    pub fn select(&mut self, item: Option<&str>, events: &EventSystem) -> bool {
        match item {
            Some(item) if !self.has(item) => false,
            Some(item) => {
                if self.selected.as_deref() != Some(item) {
                    self.selected = Some(item.to_string());
                    events.emit(topics::INVENTORY_SELECT, &Payload::text(item));
                }
                true
            }
            None => {
                if self.selected.take().is_some() {
                    events.emit(topics::INVENTORY_SELECT, &Payload::Empty);
                }
                true
            }
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Replace the contents without events, used when restoring a save.
    /// Items past the capacity and duplicates are dropped.
    pub fn restore(&mut self, items: &[String]) {
        self.items.clear();
        self.selected = None;
        for item in items {
            if !self.has(item) && !self.is_full() {
                self.items.push(item.clone());
            }
        }
        debug!("inventory restored with {} items", self.items.len());
    }
}

impl Plugin for InventoryPlugin {
    fn name(&self) -> &str {
        "inventory"
    }

    fn destroy(&mut self, _ctx: &mut PluginContext<'_>) {
        self.items.clear();
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(events: &EventSystem, topic: &'static str) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        events.on(topic, move |p| {
            sink.borrow_mut().push(p.as_text().unwrap_or("").to_string())
        });
        log
    }

    #[test]
    fn add_remove_and_capacity() {
        let events = EventSystem::new();
        let added = record(&events, topics::INVENTORY_ADD);
        let removed = record(&events, topics::INVENTORY_REMOVE);
        let mut inv = InventoryPlugin::with_capacity(2);
        assert!(inv.add("key", &events));
        assert!(!inv.add("key", &events));
        assert!(inv.add("rope", &events));
        assert!(!inv.add("lamp", &events));
        assert!(inv.remove("key", &events));
        assert!(!inv.remove("key", &events));
        assert_eq!(inv.items(), &["rope".to_string()]);
        assert_eq!(*added.borrow(), vec!["key", "rope"]);
        assert_eq!(*removed.borrow(), vec!["key"]);
    }

    #[test]
    fn selection_follows_removal() {
        let events = EventSystem::new();
        let selects = record(&events, topics::INVENTORY_SELECT);
        let mut inv = InventoryPlugin::new();
        inv.add("key", &events);
        assert!(!inv.select(Some("ghost"), &events));
        assert!(inv.select(Some("key"), &events));
        assert!(inv.select(Some("key"), &events));
        assert_eq!(inv.selected(), Some("key"));
        inv.remove("key", &events);
        assert_eq!(inv.selected(), None);
        assert_eq!(*selects.borrow(), vec!["key", ""]);
    }

    #[test]
    fn restore_drops_duplicates_and_overflow() {
        let mut inv = InventoryPlugin::with_capacity(2);
        inv.restore(&["a".into(), "a".into(), "b".into(), "c".into()]);
        assert_eq!(inv.items(), &["a".to_string(), "b".to_string()]);
    }
}
