//! Engine plugins.
//!
//! A plugin is a named unit with optional `init`, `update` and `destroy`
//! hooks, driven by the engine once per frame after input and before the
//! active scene. The built-in plugins are closed variants of
//! [`EnginePlugin`]; anything else goes through [`EnginePlugin::Custom`].
//!
//! Names are unique in a [`PluginManager`]; registering a second plugin
//! with the same name is rejected with a warning. A panicking hook is
//! logged and does not stop the other plugins.

pub mod achievements;
pub mod dialogue;
pub mod inventory;

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, error, warn};
use serde_json::Value;

use crate::events::{EventSystem, describe_panic};
use crate::resources::state::StateManager;

pub use achievements::{Achievement, AchievementsPlugin, Condition};
pub use dialogue::{DialogueChoice, DialogueNode, DialoguePlugin, DialogueTree};
pub use inventory::InventoryPlugin;

/// What a plugin hook can reach.
pub struct PluginContext<'a> {
    pub events: &'a EventSystem,
    pub state: &'a mut StateManager,
}

/// A flag is a state key holding anything but `null`, `false`, zero or an
/// empty string.
pub(crate) fn flag_is_set(state: &StateManager, key: &str) -> bool {
    match state.get_value(key) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

pub trait Plugin {
    fn name(&self) -> &str;
    fn init(&mut self, _ctx: &mut PluginContext<'_>) {}
    fn update(&mut self, _ctx: &mut PluginContext<'_>, _dt: f32) {}
    fn destroy(&mut self, _ctx: &mut PluginContext<'_>) {}
}

pub enum EnginePlugin {
    Dialogue(DialoguePlugin),
    Inventory(InventoryPlugin),
    Achievements(AchievementsPlugin),
    Custom(Box<dyn Plugin>),
}

impl EnginePlugin {
    fn as_plugin(&self) -> &dyn Plugin {
        match self {
            EnginePlugin::Dialogue(p) => p as &dyn Plugin,
            EnginePlugin::Inventory(p) => p as &dyn Plugin,
            EnginePlugin::Achievements(p) => p as &dyn Plugin,
            EnginePlugin::Custom(p) => p.as_ref(),
        }
    }

    fn as_plugin_mut(&mut self) -> &mut dyn Plugin {
        match self {
            EnginePlugin::Dialogue(p) => p as &mut dyn Plugin,
            EnginePlugin::Inventory(p) => p as &mut dyn Plugin,
            EnginePlugin::Achievements(p) => p as &mut dyn Plugin,
            EnginePlugin::Custom(p) => p.as_mut(),
        }
    }

    pub fn name(&self) -> &str {
        self.as_plugin().name()
    }
}

impl std::fmt::Debug for EnginePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EnginePlugin").field(&self.name()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    Init,
    Update,
    Destroy,
}

#[derive(Debug, Default)]
pub struct PluginManager {
    plugins: Vec<EnginePlugin>,
    pending_init: Vec<String>,
    initialized: bool,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Plugins registered after `init_all` are initialized
    /// on the next `update_all`.
    pub fn register(&mut self, plugin: EnginePlugin) -> bool {
        let name = plugin.name().to_string();
        if self.get(&name).is_some() {
            warn!("plugin '{}' is already registered, keeping the first", name);
            return false;
        }
        debug!("plugin '{}' registered", name);
        self.plugins.push(plugin);
        if self.initialized {
            self.pending_init.push(name);
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<&EnginePlugin> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EnginePlugin> {
        self.plugins.iter_mut().find(|p| p.name() == name)
    }

    /// Registration order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn dialogue(&self) -> Option<&DialoguePlugin> {
        self.plugins.iter().find_map(|p| match p {
            EnginePlugin::Dialogue(d) => Some(d),
            _ => None,
        })
    }

    pub fn dialogue_mut(&mut self) -> Option<&mut DialoguePlugin> {
        self.plugins.iter_mut().find_map(|p| match p {
            EnginePlugin::Dialogue(d) => Some(d),
            _ => None,
        })
    }

    pub fn inventory(&self) -> Option<&InventoryPlugin> {
        self.plugins.iter().find_map(|p| match p {
            EnginePlugin::Inventory(i) => Some(i),
            _ => None,
        })
    }

    pub fn inventory_mut(&mut self) -> Option<&mut InventoryPlugin> {
        self.plugins.iter_mut().find_map(|p| match p {
            EnginePlugin::Inventory(i) => Some(i),
            _ => None,
        })
    }

    pub fn achievements(&self) -> Option<&AchievementsPlugin> {
        self.plugins.iter().find_map(|p| match p {
            EnginePlugin::Achievements(a) => Some(a),
            _ => None,
        })
    }

    pub fn achievements_mut(&mut self) -> Option<&mut AchievementsPlugin> {
        self.plugins.iter_mut().find_map(|p| match p {
            EnginePlugin::Achievements(a) => Some(a),
            _ => None,
        })
    }

    pub fn init_all(&mut self, ctx: &mut PluginContext<'_>) {
        for plugin in &mut self.plugins {
            run_hook(plugin, Hook::Init, ctx, 0.0);
        }
        self.pending_init.clear();
        self.initialized = true;
    }

    pub fn update_all(&mut self, ctx: &mut PluginContext<'_>, dt: f32) {
        if !self.pending_init.is_empty() {
            let late = std::mem::take(&mut self.pending_init);
            for plugin in self.plugins.iter_mut().filter(|p| late.iter().any(|n| n == p.name())) {
                run_hook(plugin, Hook::Init, ctx, 0.0);
            }
        }
        for plugin in &mut self.plugins {
            run_hook(plugin, Hook::Update, ctx, dt);
        }
    }

    /// Destroy every plugin in reverse registration order and empty the table.
    pub fn destroy_all(&mut self, ctx: &mut PluginContext<'_>) {
        if self.initialized {
            for plugin in self.plugins.iter_mut().rev() {
                run_hook(plugin, Hook::Destroy, ctx, 0.0);
            }
        }
        self.plugins.clear();
        self.pending_init.clear();
        self.initialized = false;
    }
}

fn run_hook(plugin: &mut EnginePlugin, hook: Hook, ctx: &mut PluginContext<'_>, dt: f32) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let p = plugin.as_plugin_mut();
        match hook {
            Hook::Init => p.init(ctx),
            Hook::Update => p.update(ctx, dt),
            Hook::Destroy => p.destroy(ctx),
        }
    }));
    if let Err(panic) = outcome {
        error!(
            "plugin '{}' {:?} hook panicked: {}",
            plugin.name(),
            hook,
            describe_panic(panic.as_ref())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::storage::MemoryStorage;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Plugin for Probe {
        fn name(&self) -> &str {
            self.name
        }
        fn init(&mut self, _ctx: &mut PluginContext<'_>) {
            self.log.borrow_mut().push(format!("{}:init", self.name));
        }
        fn update(&mut self, _ctx: &mut PluginContext<'_>, _dt: f32) {
            if self.name == "bomb" {
                panic!("bomb went off");
            }
            self.log.borrow_mut().push(format!("{}:update", self.name));
        }
        fn destroy(&mut self, _ctx: &mut PluginContext<'_>) {
            self.log.borrow_mut().push(format!("{}:destroy", self.name));
        }
    }

    fn probe(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> EnginePlugin {
        EnginePlugin::Custom(Box::new(Probe {
            name,
            log: Rc::clone(log),
        }))
    }

    fn state(events: &EventSystem) -> StateManager {
        StateManager::new(events.clone(), Box::new(MemoryStorage::new()), "t", 4)
    }

    #[test]
    fn lifecycle_runs_in_order() {
        let events = EventSystem::new();
        let mut state = state(&events);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut plugins = PluginManager::new();
        assert!(plugins.register(probe("a", &log)));
        assert!(plugins.register(probe("b", &log)));
        assert!(!plugins.register(probe("a", &log)));
        let mut ctx = PluginContext {
            events: &events,
            state: &mut state,
        };
        plugins.init_all(&mut ctx);
        plugins.update_all(&mut ctx, 0.016);
        plugins.destroy_all(&mut ctx);
        assert_eq!(
            *log.borrow(),
            vec!["a:init", "b:init", "a:update", "b:update", "b:destroy", "a:destroy"]
        );
        assert!(plugins.is_empty());
    }

    #[test]
    fn panicking_plugin_does_not_stop_others() {
        let events = EventSystem::new();
        let mut state = state(&events);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut plugins = PluginManager::new();
        plugins.register(probe("bomb", &log));
        plugins.register(probe("calm", &log));
        let mut ctx = PluginContext {
            events: &events,
            state: &mut state,
        };
        plugins.init_all(&mut ctx);
        plugins.update_all(&mut ctx, 0.016);
        assert!(log.borrow().contains(&"calm:update".to_string()));
    }

    #[test]
    fn late_registration_is_initialized_before_update() {
        let events = EventSystem::new();
        let mut state = state(&events);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut plugins = PluginManager::new();
        let mut ctx = PluginContext {
            events: &events,
            state: &mut state,
        };
        plugins.init_all(&mut ctx);
        plugins.register(probe("late", &log));
        plugins.update_all(&mut ctx, 0.016);
        assert_eq!(*log.borrow(), vec!["late:init", "late:update"]);
    }

    #[test]
    fn typed_accessors_find_builtins() {
        let mut plugins = PluginManager::new();
        plugins.register(EnginePlugin::Inventory(InventoryPlugin::new()));
        plugins.register(EnginePlugin::Dialogue(DialoguePlugin::new()));
        assert!(plugins.inventory().is_some());
        assert!(plugins.dialogue_mut().is_some());
        assert!(plugins.achievements().is_none());
        assert_eq!(plugins.names(), vec!["inventory", "dialogue"]);
    }
}
