//! Scene-scoped scratch storage.
//!
//! A [`Blackboard`] holds transient gameplay values for one scene instance
//! (hover targets, combo counters, half-finished interactions). It is never
//! persisted; use the state store for anything that must survive a save.
//!
//! Values are stored type-erased. A read with the wrong type is a miss, not
//! an error.

use std::any::Any;

use rustc_hash::FxHashMap;

#[derive(Default)]
pub struct Blackboard {
    values: FxHashMap<String, Box<dyn Any>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value of any type.
    pub fn set<T: Any>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Clone of the value under `key` if it has type `T`.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.get_ref::<T>(key).cloned()
    }

    pub fn get_ref<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key)?.downcast_mut::<T>()
    }

    /// Replace the value under `key` with `f(current)` and return the new
    /// value. `current` is `None` when the key is absent or holds another
    /// type.
    pub fn update<T: Any + Clone>(&mut self, key: &str, f: impl FnOnce(Option<T>) -> T) -> T {
        let current = self
            .values
            .remove(key)
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed);
        let next = f(current);
        self.values.insert(key.to_string(), Box::new(next.clone()));
        next
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("Blackboard").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_get_and_set() {
        let mut bb = Blackboard::new();
        bb.set("hover", String::from("door"));
        bb.set("clicks", 3u32);
        assert_eq!(bb.get::<String>("hover").as_deref(), Some("door"));
        assert_eq!(bb.get::<u32>("clicks"), Some(3));
        assert_eq!(bb.get::<i64>("clicks"), None);
        assert_eq!(bb.len(), 2);
    }

    #[test]
    fn update_starts_from_none_and_stores_result() {
        let mut bb = Blackboard::new();
        let first = bb.update("combo", |n: Option<u32>| n.unwrap_or(0) + 1);
        let second = bb.update("combo", |n: Option<u32>| n.unwrap_or(0) + 1);
        assert_eq!((first, second), (1, 2));
        assert_eq!(bb.get_ref::<u32>("combo"), Some(&2));
    }

    #[test]
    fn update_with_other_type_sees_none() {
        let mut bb = Blackboard::new();
        bb.set("x", "text");
        let v = bb.update("x", |n: Option<i32>| n.unwrap_or(-1));
        assert_eq!(v, -1);
        assert_eq!(bb.get::<i32>("x"), Some(-1));
    }

    #[test]
    fn remove_and_clear() {
        let mut bb = Blackboard::new();
        bb.set("a", 1u8);
        bb.set("b", 2u8);
        assert!(bb.remove("a"));
        assert!(!bb.remove("a"));
        assert!(bb.has("b"));
        bb.clear();
        assert!(bb.is_empty());
    }
}
