//! Scene registry, lifecycle and navigation history.
//!
//! The [`SceneManager`] owns every registered scene together with that
//! scene's [`SceneServices`], and at most one active scene at a time.
//!
//! Lifecycle:
//! - no scene active (initial)
//! - exactly one scene active after the first successful switch
//! - destroyed (terminal): every scene destroyed, further calls are no-ops
//!
//! A switch to a different scene:
//! 1. loads the incoming scene's required assets; a failure aborts the
//!    switch and the current scene stays active
//! 2. runs the outgoing scene's `on_exit`, pauses its timers, emits
//!    `scene:exit` and pushes its id on the bounded history
//! 3. makes the incoming scene current, runs `init` on first activation,
//!    resumes its timers, runs `on_enter` and emits `scene:enter`
//!
//! Switching to the current scene is a successful no-op; switching to an
//! unregistered id logs a warning and fails without side effects.

use std::collections::VecDeque;

use log::{error, info, warn};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::components::rect::Rect;
use crate::components::scene::{Scene, SceneContext, SceneEnv};
use crate::events::input::Gesture;
use crate::events::payload::SceneTransition;
use crate::events::{EventSystem, Payload, topics};
use crate::resources::rendertarget::RenderSurface;
use crate::resources::worldtime::SharedClock;
use crate::systems::services::SceneServices;

struct SceneEntry {
    scene: Box<dyn Scene>,
    services: SceneServices,
    initialized: bool,
}

pub struct SceneManager {
    scenes: FxHashMap<String, SceneEntry>,
    order: Vec<String>,
    current: Option<String>,
    history: VecDeque<String>,
    history_limit: usize,
    events: EventSystem,
    clock: SharedClock,
    destroyed: bool,
}

impl SceneManager {
    pub fn new(events: EventSystem, clock: SharedClock, history_limit: usize) -> Self {
        Self {
            scenes: FxHashMap::default(),
            order: Vec::new(),
            current: None,
            history: VecDeque::new(),
            history_limit,
            events,
            clock,
            destroyed: false,
        }
    }

    /// Register a scene. A duplicate id is rejected with a warning and the
    /// first registration stays.
    pub fn register(&mut self, scene: Box<dyn Scene>) -> bool {
        if self.destroyed {
            warn!("scene manager destroyed, ignoring registration of '{}'", scene.id());
            return false;
        }
        let id = scene.id().to_string();
        if self.scenes.contains_key(&id) {
            warn!("scene '{}' is already registered, keeping the first", id);
            return false;
        }
        let services = SceneServices::new(self.events.clone(), self.clock.clone());
        self.scenes.insert(
            id.clone(),
            SceneEntry {
                scene,
                services,
                initialized: false,
            },
        );
        self.order.push(id.clone());
        self.events
            .emit(topics::SCENE_REGISTERED, &Payload::Text(id));
        true
    }

    /// Make `id` the active scene. See the module docs for the sequence.
    pub fn switch_to(&mut self, id: &str, data: Option<Value>, env: &mut SceneEnv<'_>) -> bool {
        if self.destroyed {
            warn!("scene manager destroyed, ignoring switch to '{}'", id);
            return false;
        }
        if self.current.as_deref() == Some(id) {
            return true;
        }
        if !self.scenes.contains_key(id) {
            warn!("cannot switch to unregistered scene '{}'", id);
            return false;
        }
        self.transition(id, data, env, true)
    }

    /// Return to the most recent scene in history. False when history is
    /// empty or the switch fails (the entry is kept in that case).
    pub fn go_back(&mut self, env: &mut SceneEnv<'_>) -> bool {
        if self.destroyed {
            return false;
        }
        let Some(target) = self.history.pop_back() else {
            return false;
        };
        if self.current.as_deref() == Some(target.as_str()) {
            return true;
        }
        if !self.scenes.contains_key(&target) || !self.transition(&target, None, env, false) {
            self.history.push_back(target);
            return false;
        }
        true
    }

    fn transition(
        &mut self,
        id: &str,
        data: Option<Value>,
        env: &mut SceneEnv<'_>,
        record_history: bool,
    ) -> bool {
        let Some(incoming) = self.scenes.get(id) else {
            return false;
        };
        let mut required = incoming.scene.required_assets();
        required.retain(|decl| !env.assets.is_loaded(&decl.id));
        if !required.is_empty() {
            if let Err(e) = env.assets.load(&required) {
                error!("scene '{}' not entered, asset load failed: {}", id, e);
                return false;
            }
        }

        let previous = self.current.take();
        if let Some(prev_id) = previous.as_deref() {
            if let Some(entry) = self.scenes.get_mut(prev_id) {
                let mut ctx = SceneContext::new(env, &mut entry.services);
                entry.scene.on_exit(&mut ctx);
                entry.services.suspend();
            }
            self.events.emit(
                topics::SCENE_EXIT,
                &Payload::Scene(SceneTransition {
                    from: Some(prev_id.to_string()),
                    to: id.to_string(),
                    data: None,
                }),
            );
            if record_history && self.history_limit > 0 {
                self.history.push_back(prev_id.to_string());
                while self.history.len() > self.history_limit {
                    self.history.pop_front();
                }
            }
        }

        self.current = Some(id.to_string());
        if let Some(entry) = self.scenes.get_mut(id) {
            let mut ctx = SceneContext::new(env, &mut entry.services);
            if !entry.initialized {
                entry.scene.init(&mut ctx);
                entry.initialized = true;
            }
            ctx.services.resume();
            entry.scene.on_enter(&mut ctx, previous.as_deref(), data.as_ref());
        }
        info!("scene {} -> {}", previous.as_deref().unwrap_or("<none>"), id);
        self.events.emit(
            topics::SCENE_ENTER,
            &Payload::Scene(SceneTransition {
                from: previous,
                to: id.to_string(),
                data,
            }),
        );
        true
    }

    /// Update the active scene, then tick its services.
    pub fn update(&mut self, dt: f32, env: &mut SceneEnv<'_>) {
        let Some(entry) = self.current_entry() else {
            return;
        };
        let mut ctx = SceneContext::new(env, &mut entry.services);
        entry.scene.update(&mut ctx, dt);
        ctx.services.tick(dt);
    }

    pub fn render(&mut self, surface: &mut dyn RenderSurface, env: &mut SceneEnv<'_>) {
        let Some(entry) = self.current_entry() else {
            return;
        };
        let mut ctx = SceneContext::new(env, &mut entry.services);
        entry.scene.render(surface, &mut ctx);
    }

    /// Tell every initialized scene about a new logical size.
    pub fn resize(&mut self, width: u32, height: u32) {
        for entry in self.scenes.values_mut().filter(|e| e.initialized) {
            entry.scene.on_resize(width, height);
        }
    }

    /// Route a gesture to the active scene's interaction zones. Returns the
    /// id of the zone that handled it.
    pub fn dispatch_pointer(&mut self, gesture: &Gesture) -> Option<String> {
        let events = self.events.clone();
        let entry = self.current_entry()?;
        entry.scene.zones_mut()?.dispatch(gesture, &events)
    }

    /// Enabled interaction zones of the active scene, for overlays.
    pub fn zone_rects(&mut self) -> Vec<(String, Rect)> {
        let Some(zones) = self.current_entry().and_then(|e| e.scene.zones_mut()) else {
            return Vec::new();
        };
        zones
            .iter()
            .filter(|z| z.enabled)
            .map(|z| (z.id.clone(), z.rect))
            .collect()
    }

    fn current_entry(&mut self) -> Option<&mut SceneEntry> {
        if self.destroyed {
            return None;
        }
        let id = self.current.as_deref()?;
        self.scenes.get_mut(id)
    }

    /// Tear down every scene. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        for id in &self.order {
            if let Some(entry) = self.scenes.get_mut(id) {
                entry.services.dispose();
                if entry.initialized {
                    entry.scene.destroy();
                }
            }
        }
        self.scenes.clear();
        self.order.clear();
        self.history.clear();
        self.current = None;
        self.destroyed = true;
        info!("scene manager destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Services of the active scene.
    pub fn current_services(&mut self) -> Option<&mut SceneServices> {
        self.current_entry().map(|e| &mut e.services)
    }

    /// Previous scene ids, oldest first.
    pub fn history(&self) -> Vec<&str> {
        self.history.iter().map(String::as_str).collect()
    }

    pub fn has_scene(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn scene_ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::testkit::Kit;
    use super::*;
    use crate::components::asset::{AssetDecl, AssetKind};
    use crate::components::zone::{InteractionZone, InteractionZones};
    use crate::events::input::GestureKind;
    use crate::resources::assetsource::MemorySource;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Probe {
        id: String,
        log: Log,
        assets: Vec<AssetDecl>,
        zones: InteractionZones,
    }

    impl Probe {
        fn boxed(id: &str, log: &Log) -> Box<dyn Scene> {
            Box::new(Self::new(id, log))
        }

        fn new(id: &str, log: &Log) -> Self {
            Self {
                id: id.to_string(),
                log: Rc::clone(log),
                assets: Vec::new(),
                zones: InteractionZones::new(),
            }
        }

        fn note(&self, what: &str) {
            self.log.borrow_mut().push(format!("{}:{}", self.id, what));
        }
    }

    impl Scene for Probe {
        fn id(&self) -> &str {
            &self.id
        }
        fn init(&mut self, _ctx: &mut SceneContext<'_>) {
            self.note("init");
        }
        fn on_enter(
            &mut self,
            _ctx: &mut SceneContext<'_>,
            previous: Option<&str>,
            _data: Option<&Value>,
        ) {
            self.note(&format!("enter<{}", previous.unwrap_or("-")));
        }
        fn on_exit(&mut self, _ctx: &mut SceneContext<'_>) {
            self.note("exit");
        }
        fn destroy(&mut self) {
            self.note("destroy");
        }
        fn zones_mut(&mut self) -> Option<&mut InteractionZones> {
            Some(&mut self.zones)
        }
        fn required_assets(&self) -> Vec<AssetDecl> {
            self.assets.clone()
        }
    }

    fn manager(kit: &Kit) -> SceneManager {
        SceneManager::new(kit.events.clone(), Rc::new(kit.clock.clone()), 3)
    }

    #[test]
    fn same_scene_twice_is_one_enter() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        scenes.register(Probe::boxed("a", &log));
        scenes.register(Probe::boxed("b", &log));
        assert!(scenes.switch_to("a", None, &mut kit.env()));
        assert!(scenes.switch_to("b", None, &mut kit.env()));
        assert!(scenes.switch_to("b", None, &mut kit.env()));
        assert_eq!(
            *log.borrow(),
            vec!["a:init", "a:enter<-", "a:exit", "b:init", "b:enter<a"]
        );
        assert_eq!(scenes.history(), vec!["a"]);
    }

    #[test]
    fn unknown_scene_leaves_current_untouched() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        scenes.register(Probe::boxed("a", &log));
        scenes.switch_to("a", None, &mut kit.env());
        assert!(!scenes.switch_to("nowhere", None, &mut kit.env()));
        assert_eq!(scenes.current_id(), Some("a"));
        assert!(scenes.history().is_empty());
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        assert!(scenes.register(Probe::boxed("a", &log)));
        assert!(!scenes.register(Probe::boxed("a", &log)));
        assert_eq!(scenes.scene_ids(), vec!["a"]);
    }

    #[test]
    fn init_runs_once_and_go_back_returns() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        scenes.register(Probe::boxed("a", &log));
        scenes.register(Probe::boxed("b", &log));
        scenes.switch_to("a", None, &mut kit.env());
        scenes.switch_to("b", None, &mut kit.env());
        assert!(scenes.go_back(&mut kit.env()));
        assert_eq!(scenes.current_id(), Some("a"));
        assert!(scenes.history().is_empty());
        assert!(!scenes.go_back(&mut kit.env()));
        let inits = log.borrow().iter().filter(|l| l.ends_with(":init")).count();
        assert_eq!(inits, 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        for id in ["a", "b", "c", "d", "e"] {
            scenes.register(Probe::boxed(id, &log));
            scenes.switch_to(id, None, &mut kit.env());
        }
        assert_eq!(scenes.history(), vec!["b", "c", "d"]);
    }

    #[test]
    fn failed_asset_load_keeps_previous_scene() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        scenes.register(Probe::boxed("a", &log));
        let mut needy = Probe::new("b", &log);
        needy.assets = vec![AssetDecl::new("bg", AssetKind::Image, "missing.png")];
        scenes.register(Box::new(needy));
        scenes.switch_to("a", None, &mut kit.env());
        assert!(!scenes.switch_to("b", None, &mut kit.env()));
        assert_eq!(scenes.current_id(), Some("a"));
        assert!(!log.borrow().iter().any(|l| l == "a:exit"));
    }

    #[test]
    fn enter_and_exit_events_carry_ids() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let seen: Log = Rc::default();
        for topic in [topics::SCENE_EXIT, topics::SCENE_ENTER] {
            let s = Rc::clone(&seen);
            kit.events.on(topic, move |p| {
                if let Payload::Scene(t) = p {
                    s.borrow_mut()
                        .push(format!("{}:{:?}->{}", topic, t.from, t.to));
                }
            });
        }
        let mut scenes = manager(&kit);
        scenes.register(Probe::boxed("a", &log));
        scenes.register(Probe::boxed("b", &log));
        scenes.switch_to("a", None, &mut kit.env());
        scenes.switch_to("b", Some(serde_json::json!({"door": 1})), &mut kit.env());
        assert_eq!(
            *seen.borrow(),
            vec![
                "scene:enter:None->a",
                "scene:exit:Some(\"a\")->b",
                "scene:enter:Some(\"a\")->b"
            ]
        );
    }

    #[test]
    fn gestures_reach_current_scene_zones() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        let mut probe = Probe::new("a", &log);
        let l = Rc::clone(&log);
        probe.zones.add(
            InteractionZone::new("door", Rect::new(0.0, 0.0, 10.0, 10.0))
                .on(GestureKind::Tap, move |_, _| l.borrow_mut().push("door".into())),
        );
        scenes.register(Box::new(probe));
        let tap = Gesture::Tap {
            pointer_id: 0,
            x: 5.0,
            y: 5.0,
        };
        assert_eq!(scenes.dispatch_pointer(&tap), None);
        scenes.switch_to("a", None, &mut kit.env());
        assert_eq!(scenes.dispatch_pointer(&tap).as_deref(), Some("door"));
    }

    #[test]
    fn exit_pauses_scene_timers() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        scenes.register(Probe::boxed("a", &log));
        scenes.register(Probe::boxed("b", &log));
        scenes.switch_to("a", None, &mut kit.env());
        let fired = Rc::new(std::cell::Cell::new(false));
        let f = Rc::clone(&fired);
        let handle = scenes
            .current_services()
            .map(|s| s.timers.create_timeout(100.0, move || f.set(true)))
            .unwrap();
        kit.clock.advance(40.0);
        scenes.switch_to("b", None, &mut kit.env());
        assert!(!handle.is_active());
        kit.clock.advance(1_000.0);
        scenes.switch_to("a", None, &mut kit.env());
        assert_eq!(handle.remaining_ms(), Some(60.0));
        assert!(!fired.get());
    }

    #[test]
    fn reentry_keeps_a_paused_timer_paused() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        scenes.register(Probe::boxed("a", &log));
        scenes.register(Probe::boxed("b", &log));
        scenes.switch_to("a", None, &mut kit.env());
        let fired = Rc::new(std::cell::Cell::new(false));
        let f = Rc::clone(&fired);
        let handle = scenes
            .current_services()
            .map(|s| s.timers.create_timeout(1000.0, move || f.set(true)))
            .unwrap();
        assert!(handle.pause());
        scenes.switch_to("b", None, &mut kit.env());
        scenes.switch_to("a", None, &mut kit.env());
        assert!(!handle.is_active());

        kit.clock.advance(5_000.0);
        scenes.update(0.016, &mut kit.env());
        assert!(!fired.get());
        assert_eq!(handle.remaining_ms(), Some(1000.0));
    }

    #[test]
    fn destroy_is_terminal_and_idempotent() {
        let mut kit = Kit::new(MemorySource::new());
        let log: Log = Rc::default();
        let mut scenes = manager(&kit);
        scenes.register(Probe::boxed("a", &log));
        scenes.register(Probe::boxed("never", &log));
        scenes.switch_to("a", None, &mut kit.env());
        scenes.destroy();
        scenes.destroy();
        assert!(scenes.is_destroyed());
        assert_eq!(scenes.current_id(), None);
        assert!(!scenes.switch_to("a", None, &mut kit.env()));
        let destroys: Vec<String> = log
            .borrow()
            .iter()
            .filter(|l| l.ends_with("destroy"))
            .cloned()
            .collect();
        assert_eq!(destroys, vec!["a:destroy"]);
    }
}
