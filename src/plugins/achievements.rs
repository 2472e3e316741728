//! Achievements unlocked by state flags, event counters or single events.
//!
//! The plugin subscribes to every topic its conditions mention when it is
//! initialized. Emissions are only counted there; conditions are checked
//! during `update`, so an achievement unlocks at most one frame after the
//! event that satisfied it. Each achievement unlocks once and emits
//! `achievement:unlocked` with its id.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::events::{EventSystem, Payload, Subscription, topics};
use crate::plugins::{Plugin, PluginContext, flag_is_set};
use crate::resources::state::StateManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    /// A state key holds a truthy value.
    Flag { key: String },
    /// `topic` was emitted at least `target` times.
    Counter { topic: String, target: u32 },
    /// `topic` was emitted at least once.
    Event { topic: String },
}

impl Condition {
    fn topic(&self) -> Option<&str> {
        match self {
            Condition::Flag { .. } => None,
            Condition::Counter { topic, .. } | Condition::Event { topic } => Some(topic),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub condition: Condition,
}

impl Achievement {
    pub fn new(id: impl Into<String>, title: impl Into<String>, condition: Condition) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            condition,
        }
    }
}

type Counts = Rc<RefCell<FxHashMap<String, u32>>>;

#[derive(Debug, Default)]
pub struct AchievementsPlugin {
    defs: Vec<Achievement>,
    unlocked: Vec<String>,
    counts: Counts,
    subscriptions: Vec<Subscription>,
}

impl AchievementsPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, achievement: Achievement) -> Self {
        self.define(achievement);
        self
    }

    /// Add a definition. Definitions added after `init` only see events
    /// emitted once they are subscribed, which happens on the next `init`.
    pub fn define(&mut self, achievement: Achievement) -> bool {
        if self.defs.iter().any(|a| a.id == achievement.id) {
            return false;
        }
        self.defs.push(achievement);
        true
    }

    pub fn definitions(&self) -> &[Achievement] {
        &self.defs
    }

    /// Unlocked ids in unlock order.
    pub fn unlocked(&self) -> &[String] {
        &self.unlocked
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked.iter().any(|u| u == id)
    }

    /// How many times `topic` has been seen.
    pub fn count(&self, topic: &str) -> u32 {
        self.counts.borrow().get(topic).copied().unwrap_or(0)
    }

    /// Unlock by hand. False for unknown or already unlocked ids.
    pub fn unlock(&mut self, id: &str, events: &EventSystem) -> bool {
        if self.is_unlocked(id) || !self.defs.iter().any(|a| a.id == id) {
            return false;
        }
        self.unlocked.push(id.to_string());
        info!("achievement unlocked: {}", id);
        events.emit(topics::ACHIEVEMENT_UNLOCKED, &Payload::text(id));
        true
    }

    fn subscribe(&mut self, events: &EventSystem) {
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
        let mut watched: Vec<&str> = self.defs.iter().filter_map(|a| a.condition.topic()).collect();
        watched.sort_unstable();
        watched.dedup();
        for topic in watched {
            let counts = Rc::clone(&self.counts);
            let key = topic.to_string();
            self.subscriptions.push(events.on(topic, move |_| {
                *counts.borrow_mut().entry(key.clone()).or_insert(0) += 1;
            }));
        }
    }

    fn satisfied(&self, condition: &Condition, state: &StateManager) -> bool {
        match condition {
            Condition::Flag { key } => flag_is_set(state, key),
            Condition::Counter { topic, target } => self.count(topic) >= *target,
            Condition::Event { topic } => self.count(topic) > 0,
        }
    }

    /// Check every locked achievement and unlock those now satisfied.
    pub fn evaluate(&mut self, events: &EventSystem, state: &StateManager) -> Vec<String> {
        let ready: Vec<String> = self
            .defs
            .iter()
            .filter(|a| !self.is_unlocked(&a.id) && self.satisfied(&a.condition, state))
            .map(|a| a.id.clone())
            .collect();
        for id in &ready {
            self.unlock(id, events);
        }
        ready
    }
}

impl Plugin for AchievementsPlugin {
    fn name(&self) -> &str {
        "achievements"
    }

    fn init(&mut self, ctx: &mut PluginContext<'_>) {
        self.subscribe(ctx.events);
    }

    fn update(&mut self, ctx: &mut PluginContext<'_>, _dt: f32) {
        self.evaluate(ctx.events, ctx.state);
    }

    fn destroy(&mut self, _ctx: &mut PluginContext<'_>) {
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::storage::MemoryStorage;
    use serde_json::Value;

    fn plugin() -> AchievementsPlugin {
        AchievementsPlugin::new()
            .with(Achievement::new("lit", "Let there be light", Condition::Flag { key: "lamp_on".into() }))
            .with(Achievement::new(
                "chatty",
                "Chatterbox",
                Condition::Counter {
                    topic: "dialogue:line".into(),
                    target: 3,
                },
            ))
            .with(Achievement::new(
                "first_item",
                "Finders keepers",
                Condition::Event {
                    topic: "inventory:add".into(),
                },
            ))
    }

    #[test]
    fn conditions_unlock_once() {
        let events = EventSystem::new();
        let mut state = StateManager::new(events.clone(), Box::new(MemoryStorage::new()), "t", 4);
        let unlocked = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&unlocked);
        events.on(topics::ACHIEVEMENT_UNLOCKED, move |p| {
            sink.borrow_mut().push(p.as_text().unwrap_or("").to_string())
        });

        let mut achievements = plugin();
        let mut ctx = PluginContext {
            events: &events,
            state: &mut state,
        };
        achievements.init(&mut ctx);
        achievements.update(&mut ctx, 0.0);
        assert!(achievements.unlocked().is_empty());

        events.emit("inventory:add", &Payload::text("key"));
        for _ in 0..3 {
            events.emit("dialogue:line", &Payload::Empty);
        }
        ctx.state.set_value("lamp_on", Value::Bool(true));
        achievements.update(&mut ctx, 0.0);
        achievements.update(&mut ctx, 0.0);

        assert_eq!(achievements.unlocked(), &["lit", "chatty", "first_item"]);
        assert_eq!(unlocked.borrow().len(), 3);
        assert_eq!(achievements.count("dialogue:line"), 3);
    }

    #[test]
    fn destroy_stops_counting() {
        let events = EventSystem::new();
        let mut state = StateManager::new(events.clone(), Box::new(MemoryStorage::new()), "t", 4);
        let mut achievements = plugin();
        let mut ctx = PluginContext {
            events: &events,
            state: &mut state,
        };
        achievements.init(&mut ctx);
        achievements.destroy(&mut ctx);
        events.emit("inventory:add", &Payload::Empty);
        assert_eq!(achievements.count("inventory:add"), 0);
        assert_eq!(events.listener_count("inventory:add"), 0);
    }

    #[test]
    fn manual_unlock_ignores_unknown_ids() {
        let events = EventSystem::new();
        let mut achievements = plugin();
        assert!(!achievements.unlock("nope", &events));
        assert!(achievements.unlock("lit", &events));
        assert!(!achievements.unlock("lit", &events));
    }

    #[test]
    fn conditions_deserialize_from_tagged_json() {
        let c: Condition = serde_json::from_str(r#"{"type":"counter","topic":"x","target":2}"#).unwrap();
        assert_eq!(
            c,
            Condition::Counter {
                topic: "x".into(),
                target: 2
            }
        );
    }
}
