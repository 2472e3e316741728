//! Generic key/value game state with change notification, undo and
//! persistence.
//!
//! Values are stored as `serde_json::Value`, so anything `Serialize` can go
//! in and anything `DeserializeOwned` can come out. A `set` whose serialized
//! value equals the current one changes nothing and emits nothing.
//!
//! Every effective change is pushed on a bounded history (oldest dropped
//! first) so [`StateManager::undo`] can walk back one change at a time.
//! Whole-map replacements (`clear`, `load`, `import`) are recorded as a
//! single snapshot entry.
//!
//! Save slots are stored through a [`StorageBackend`] under
//! `<prefix>:state:<slot>` as `{ "timestamp": <ms>, "state": { .. } }`.
//! Unreadable slot data is logged and treated as "no save".
//!
//! Topics: `state:change` and `state:change:<key>` per changed key,
//! `state:saved` and `state:loaded` with the slot name.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::StateError;
use crate::events::payload::StateChange;
use crate::events::{EventSystem, Payload, Subscription, topics};
use crate::resources::storage::StorageBackend;

#[derive(Debug, Clone, PartialEq)]
enum HistoryEntry {
    /// One key changed; `previous` is `None` if it did not exist.
    Key { key: String, previous: Option<Value> },
    /// The whole map was replaced.
    Snapshot(Map<String, Value>),
}

pub struct StateManager {
    values: Map<String, Value>,
    history: VecDeque<HistoryEntry>,
    history_limit: usize,
    events: EventSystem,
    storage: Box<dyn StorageBackend>,
    prefix: String,
}

impl StateManager {
    pub fn new(
        events: EventSystem,
        storage: Box<dyn StorageBackend>,
        prefix: impl Into<String>,
        history_limit: usize,
    ) -> Self {
        Self {
            values: Map::new(),
            history: VecDeque::new(),
            history_limit,
            events,
            storage,
            prefix: prefix.into(),
        }
    }

    /// Serialize and store `value`. `Ok(false)` when nothing changed.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<bool, StateError> {
        let value = serde_json::to_value(value).map_err(|source| StateError::Serialize {
            key: key.to_string(),
            source,
        })?;
        Ok(self.set_value(key, value))
    }

    /// Store a JSON value. False when it equals the current value.
    pub fn set_value(&mut self, key: &str, value: Value) -> bool {
        if self.values.get(key) == Some(&value) {
            return false;
        }
        let previous = self.values.insert(key.to_string(), value.clone());
        self.push_history(HistoryEntry::Key {
            key: key.to_string(),
            previous: previous.clone(),
        });
        self.notify(key, Some(value), previous);
        true
    }

    /// Deserialize the value under `key`. `None` if absent or of another
    /// shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        T::deserialize(value).ok()
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> bool {
        let Some(previous) = self.values.remove(key) else {
            return false;
        };
        self.push_history(HistoryEntry::Key {
            key: key.to_string(),
            previous: Some(previous.clone()),
        });
        self.notify(key, None, Some(previous));
        true
    }

    pub fn clear(&mut self) {
        if self.values.is_empty() {
            return;
        }
        self.replace_all(Map::new(), true);
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Revert the most recent change. False when history is empty.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop_back() else {
            return false;
        };
        match entry {
            HistoryEntry::Key { key, previous } => {
                let current = match &previous {
                    Some(value) => self.values.insert(key.clone(), value.clone()),
                    None => self.values.remove(&key),
                };
                self.notify(&key, previous, current);
            }
            HistoryEntry::Snapshot(map) => self.replace_all(map, false),
        }
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn push_history(&mut self, entry: HistoryEntry) {
        if self.history_limit == 0 {
            return;
        }
        self.history.push_back(entry);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// Swap in `next`, emitting a change for every key that differs.
    fn replace_all(&mut self, next: Map<String, Value>, record: bool) {
        let previous = std::mem::replace(&mut self.values, next);
        let mut changed: Vec<String> = previous
            .keys()
            .chain(self.values.keys())
            .filter(|k| previous.get(*k) != self.values.get(*k))
            .cloned()
            .collect();
        changed.sort_unstable();
        changed.dedup();
        for key in &changed {
            self.notify(key, self.values.get(key).cloned(), previous.get(key).cloned());
        }
        if record {
            self.push_history(HistoryEntry::Snapshot(previous));
        }
    }

    fn notify(&self, key: &str, value: Option<Value>, previous: Option<Value>) {
        let payload = Payload::StateChange(StateChange {
            key: key.to_string(),
            value,
            previous,
        });
        self.events.emit(topics::STATE_CHANGE, &payload);
        self.events.emit(&topics::state_key_topic(key), &payload);
    }

    /// Call `callback` on every change of `key`.
    pub fn watch(&self, key: &str, callback: impl Fn(&StateChange) + 'static) -> Subscription {
        self.events.on(&topics::state_key_topic(key), move |payload| {
            if let Payload::StateChange(change) = payload {
                callback(change);
            }
        })
    }

    fn slot_key(&self, slot: &str) -> String {
        format!("{}:state:{}", self.prefix, slot)
    }

    /// Persist the whole map to `slot`. False if storage refused the write.
    pub fn save(&mut self, slot: &str) -> bool {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let record = json!({ "timestamp": timestamp, "state": Value::Object(self.values.clone()) });
        if let Err(e) = self.storage.set(&self.slot_key(slot), &record.to_string()) {
            warn!("could not save state slot '{}': {}", slot, e);
            return false;
        }
        debug!("state saved to slot '{}' ({} keys)", slot, self.values.len());
        self.events.emit(topics::STATE_SAVED, &Payload::text(slot));
        true
    }

    /// Replace the map with the contents of `slot`. Missing or malformed
    /// data leaves the state untouched and returns false.
    pub fn load(&mut self, slot: &str) -> bool {
        let Some(text) = self.storage.get(&self.slot_key(slot)) else {
            return false;
        };
        let state = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(mut record)) => match record.remove("state") {
                Some(Value::Object(state)) => state,
                _ => {
                    warn!("state slot '{}' has no state object, ignoring", slot);
                    return false;
                }
            },
            Ok(_) => {
                warn!("state slot '{}' is not an object, ignoring", slot);
                return false;
            }
            Err(e) => {
                warn!("state slot '{}' is corrupt, ignoring: {}", slot, e);
                return false;
            }
        };
        self.replace_all(state, true);
        self.events.emit(topics::STATE_LOADED, &Payload::text(slot));
        true
    }

    pub fn delete_save(&mut self, slot: &str) -> bool {
        self.storage.remove(&self.slot_key(slot))
    }

    pub fn has_save(&self, slot: &str) -> bool {
        self.storage.get(&self.slot_key(slot)).is_some()
    }

    /// Copy of the whole map.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// Replace the whole map, recorded as one undo step.
    pub fn replace(&mut self, next: Map<String, Value>) {
        self.replace_all(next, true);
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The whole map as a JSON object string.
    pub fn export(&self) -> String {
        Value::Object(self.values.clone()).to_string()
    }

    /// Replace the map with a JSON object produced by [`export`](Self::export).
    pub fn import(&mut self, text: &str) -> Result<(), StateError> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => {
                self.replace_all(map, true);
                Ok(())
            }
            Ok(other) => Err(StateError::Import(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
            Err(e) => Err(StateError::Import(e.to_string())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::storage::MemoryStorage;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn manager(limit: usize) -> (StateManager, EventSystem, MemoryStorage) {
        let events = EventSystem::new();
        let storage = MemoryStorage::new();
        let state = StateManager::new(events.clone(), Box::new(storage.clone()), "test", limit);
        (state, events, storage)
    }

    #[test]
    fn equal_set_emits_once() {
        let (mut state, events, _) = manager(50);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        events.on(topics::STATE_CHANGE, move |_| h.set(h.get() + 1));
        assert!(state.set("door", "open").unwrap());
        assert!(!state.set("door", "open").unwrap());
        assert_eq!(hits.get(), 1);
        assert_eq!(state.history_len(), 1);
    }

    #[test]
    fn typed_get_round_trips_structs() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Pos {
            x: i32,
            y: i32,
        }
        let (mut state, _, _) = manager(50);
        state.set("pos", Pos { x: 3, y: 4 }).unwrap();
        assert_eq!(state.get::<Pos>("pos"), Some(Pos { x: 3, y: 4 }));
        assert_eq!(state.get::<String>("pos"), None);
        assert_eq!(state.get::<i32>("missing"), None);
    }

    #[test]
    fn undo_walks_back_to_oldest_retained() {
        let (mut state, _, _) = manager(3);
        for n in 1..=5 {
            state.set("score", n).unwrap();
        }
        assert_eq!(state.history_len(), 3);
        assert!(state.undo());
        assert_eq!(state.get::<i32>("score"), Some(4));
        assert!(state.undo());
        assert!(state.undo());
        assert_eq!(state.get::<i32>("score"), Some(2));
        assert!(!state.undo());
        assert_eq!(state.get::<i32>("score"), Some(2));
    }

    #[test]
    fn undo_of_first_set_removes_key() {
        let (mut state, _, _) = manager(10);
        state.set("k", true).unwrap();
        state.undo();
        assert!(!state.has("k"));
    }

    #[test]
    fn delete_and_clear_are_undoable() {
        let (mut state, _, _) = manager(10);
        state.set("a", 1).unwrap();
        state.set("b", 2).unwrap();
        assert!(state.delete("a"));
        assert!(!state.delete("a"));
        state.clear();
        assert!(state.is_empty());
        state.undo();
        assert_eq!(state.keys(), vec!["b"]);
        state.undo();
        assert_eq!(state.keys(), vec!["a", "b"]);
    }

    #[test]
    fn watch_is_scoped_to_one_key() {
        let (mut state, _, _) = manager(10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let sub = state.watch("hp", move |c| s.borrow_mut().push(c.value.clone()));
        state.set("hp", 10).unwrap();
        state.set("mp", 5).unwrap();
        state.delete("hp");
        assert_eq!(*seen.borrow(), vec![Some(json!(10)), None]);
        sub.unsubscribe();
        state.set("hp", 1).unwrap();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn save_and_load_slot() {
        let (mut state, _, storage) = manager(10);
        state.set("room", "hall").unwrap();
        assert!(state.save("slot1"));
        assert!(state.has_save("slot1"));
        let raw: Value = serde_json::from_str(&storage.get("test:state:slot1").unwrap()).unwrap();
        assert!(raw["timestamp"].is_u64());
        assert_eq!(raw["state"]["room"], json!("hall"));

        state.set("room", "attic").unwrap();
        assert!(state.load("slot1"));
        assert_eq!(state.get::<String>("room").as_deref(), Some("hall"));
        assert!(state.delete_save("slot1"));
        assert!(!state.load("slot1"));
    }

    #[test]
    fn corrupt_slot_is_treated_as_missing() {
        let (mut state, _, storage) = manager(10);
        state.set("keep", 1).unwrap();
        storage.set("test:state:bad", "{not json").unwrap();
        storage.set("test:state:shape", "[1,2]").unwrap();
        assert!(!state.load("bad"));
        assert!(!state.load("shape"));
        assert_eq!(state.get::<i32>("keep"), Some(1));
    }

    #[test]
    fn export_import_round_trip() {
        let (mut a, _, _) = manager(10);
        a.set("x", 1).unwrap();
        a.set("y", vec!["key", "lamp"]).unwrap();
        let text = a.export();
        let (mut b, _, _) = manager(10);
        b.import(&text).unwrap();
        assert_eq!(b.get::<Vec<String>>("y"), Some(vec!["key".into(), "lamp".into()]));
        assert!(matches!(b.import("[]"), Err(StateError::Import(_))));
        assert!(matches!(b.import("nope"), Err(StateError::Import(_))));
    }
}
