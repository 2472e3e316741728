//! Branching dialogue trees.
//!
//! A tree is a set of nodes keyed by id. A node either offers choices or
//! continues to `next`; a node with neither ends the conversation. Choices
//! can be gated on a state flag (`requires`) and can raise a flag when
//! taken (`sets`). Flags are state keys holding a truthy JSON value.
//!
//! Topics: `dialogue:start` and `dialogue:end` with the tree id,
//! `dialogue:line` with the speaker and text of each node entered.

use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PuzzleError;
use crate::events::{EventSystem, Payload, topics};
use crate::plugins::{Plugin, PluginContext, flag_is_set};
use crate::resources::state::StateManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueChoice {
    pub text: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub requires: Option<String>,
    #[serde(default)]
    pub sets: Option<String>,
}

impl DialogueChoice {
    pub fn new(text: impl Into<String>, next: Option<&str>) -> Self {
        Self {
            text: text.into(),
            next: next.map(str::to_string),
            requires: None,
            sets: None,
        }
    }

    pub fn requires(mut self, flag: impl Into<String>) -> Self {
        self.requires = Some(flag.into());
        self
    }

    pub fn sets(mut self, flag: impl Into<String>) -> Self {
        self.sets = Some(flag.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: String,
    #[serde(default)]
    pub speaker: Option<String>,
    pub text: String,
    #[serde(default)]
    pub choices: Vec<DialogueChoice>,
    #[serde(default)]
    pub next: Option<String>,
}

impl DialogueNode {
    pub fn line(id: impl Into<String>, speaker: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            speaker: speaker.map(str::to_string),
            text: text.into(),
            choices: Vec::new(),
            next: None,
        }
    }

    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn choice(mut self, choice: DialogueChoice) -> Self {
        self.choices.push(choice);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTree {
    pub id: String,
    pub start: String,
    pub nodes: Vec<DialogueNode>,
}

impl DialogueTree {
    pub fn from_json(text: &str) -> Result<Self, PuzzleError> {
        serde_json::from_str(text).map_err(|e| PuzzleError::Parse(e.to_string()))
    }

    pub fn node(&self, id: &str) -> Option<&DialogueNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Default)]
pub struct DialoguePlugin {
    trees: FxHashMap<String, DialogueTree>,
    active: Option<(String, String)>,
}

impl DialoguePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tree. A duplicate id is rejected with a warning.
    pub fn add_tree(&mut self, tree: DialogueTree) -> bool {
        if self.trees.contains_key(&tree.id) {
            warn!("dialogue tree '{}' already exists, keeping the first", tree.id);
            return false;
        }
        self.trees.insert(tree.id.clone(), tree);
        true
    }

    pub fn has_tree(&self, id: &str) -> bool {
        self.trees.contains_key(id)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Node being shown.
    pub fn current(&self) -> Option<&DialogueNode> {
        let (tree, node) = self.active.as_ref()?;
        self.trees.get(tree)?.node(node)
    }

    /// Begin `tree_id` from its start node, ending any running dialogue.
    pub fn start(&mut self, tree_id: &str, events: &EventSystem) -> bool {
        let Some(tree) = self.trees.get(tree_id) else {
            warn!("unknown dialogue tree '{}'", tree_id);
            return false;
        };
        if tree.node(&tree.start).is_none() {
            warn!("dialogue tree '{}' has no start node '{}'", tree_id, tree.start);
            return false;
        }
        let start = tree.start.clone();
        if self.is_active() {
            self.end(events);
        }
        self.active = Some((tree_id.to_string(), start.clone()));
        events.emit(topics::DIALOGUE_START, &Payload::text(tree_id));
        self.enter(&start, events);
        true
    }

    /// Choices of the current node whose flag requirement is met.
    pub fn available_choices(&self, state: &StateManager) -> Vec<&DialogueChoice> {
        self.current()
            .map(|node| {
                node.choices
                    .iter()
                    .filter(|c| c.requires.as_deref().is_none_or(|f| flag_is_set(state, f)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Take the `index`-th available choice.
    pub fn choose(&mut self, index: usize, ctx: &mut PluginContext<'_>) -> bool {
        let Some(choice) = self.available_choices(ctx.state).get(index).map(|c| (*c).clone()) else {
            return false;
        };
        if let Some(flag) = &choice.sets {
            ctx.state.set_value(flag, Value::Bool(true));
        }
        debug!("dialogue choice '{}'", choice.text);
        self.go_to(choice.next.as_deref(), ctx.events);
        true
    }

    /// Continue past a node without choices.
    pub fn advance(&mut self, events: &EventSystem) -> bool {
        let Some(node) = self.current() else {
            return false;
        };
        if !node.choices.is_empty() {
            return false;
        }
        let next = node.next.clone();
        self.go_to(next.as_deref(), events);
        true
    }

    /// Stop the running dialogue.
    pub fn end(&mut self, events: &EventSystem) -> bool {
        let Some((tree, _)) = self.active.take() else {
            return false;
        };
        events.emit(topics::DIALOGUE_END, &Payload::text(tree));
        true
    }

    fn go_to(&mut self, next: Option<&str>, events: &EventSystem) {
        let exists = match (&self.active, next) {
            (Some((tree, _)), Some(id)) => self.trees.get(tree).is_some_and(|t| t.node(id).is_some()),
            _ => false,
        };
        match next {
            Some(id) if exists => {
                if let Some((_, node)) = self.active.as_mut() {
                    *node = id.to_string();
                }
                self.enter(id, events);
            }
            Some(id) => {
                warn!("dialogue node '{}' does not exist, ending dialogue", id);
                self.end(events);
            }
            None => {
                self.end(events);
            }
        }
    }

    fn enter(&self, node_id: &str, events: &EventSystem) {
        let Some((tree, _)) = &self.active else {
            return;
        };
        if let Some(node) = self.trees.get(tree).and_then(|t| t.node(node_id)) {
            events.emit(
                topics::DIALOGUE_LINE,
                &Payload::Say {
                    speaker: node.speaker.clone(),
                    text: node.text.clone(),
                },
            );
        }
    }
}

impl Plugin for DialoguePlugin {
    fn name(&self) -> &str {
        "dialogue"
    }

    fn destroy(&mut self, ctx: &mut PluginContext<'_>) {
        self.end(ctx.events);
        self.trees.clear();
    }
}
