//! The engine orchestrator.
//!
//! [`Engine`] owns every service and drives one frame per [`Engine::frame`]
//! call. The host calls `frame` from its animation callback with the
//! current clock reading; headless hosts use [`Engine::run_frames`].
//!
//! Frame order:
//! 1. settle finished asset loads
//! 2. drain host input, recognize gestures
//! 3. route gestures to the active scene's interaction zones
//! 4. update plugins
//! 5. update the active scene, then its timers and cutscene
//! 6. advance animations
//! 7. clear the surface and render the active scene
//! 8. draw the debug overlay when enabled
//! 9. perform scene switches requested during the frame
//!
//! Scene switches requested from inside hooks (through
//! [`SceneContext::request_switch`](crate::components::scene::SceneContext::request_switch)
//! or an emission on `scene:request`) are queued and performed at step 9,
//! so a scene never disappears in the middle of its own update.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use crossbeam_channel::Sender;
use log::{debug, info, warn};
use serde_json::{Value, json};

use crate::components::asset::AssetDecl;
use crate::components::rect::Rect;
use crate::components::scene::{Scene, SceneEnv};
use crate::error::{EngineError, SaveError};
use crate::events::input::RawInput;
use crate::events::payload::SceneTransition;
use crate::events::{EventSystem, Payload, Subscription, topics};
use crate::plugins::{EnginePlugin, PluginContext, PluginManager};
use crate::resources::animationstore::AnimationManager;
use crate::resources::assetsource::AssetSource;
use crate::resources::assetstore::AssetManager;
use crate::resources::gameconfig::EngineConfig;
use crate::resources::input::InputManager;
use crate::resources::rendertarget::{NullSurface, RenderSurface};
use crate::resources::screensize::SurfaceBounds;
use crate::resources::state::StateManager;
use crate::resources::storage::StorageBackend;
use crate::resources::worldtime::{ManualClock, SharedClock, WorldTime};
use crate::save::SaveGame;
use crate::systems::scenes::SceneManager;
use crate::systems::time::update_world_time;

type RequestQueue = Rc<RefCell<VecDeque<SceneTransition>>>;

pub struct Engine {
    config: EngineConfig,
    events: EventSystem,
    clock: SharedClock,
    surface: Box<dyn RenderSurface>,
    assets: AssetManager,
    animations: AnimationManager,
    input: InputManager,
    state: StateManager,
    scenes: SceneManager,
    plugins: PluginManager,
    time: WorldTime,
    startup_assets: Vec<AssetDecl>,
    requests: RequestQueue,
    request_sub: Option<Subscription>,
    running: bool,
    destroyed: bool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        surface: Box<dyn RenderSurface>,
        clock: SharedClock,
        source: Arc<dyn AssetSource>,
        storage: Box<dyn StorageBackend>,
    ) -> Self {
        let events = EventSystem::new();
        let bounds = SurfaceBounds::new(config.width, config.height, config.device_pixel_ratio);
        let requests: RequestQueue = Rc::default();
        let queue = Rc::clone(&requests);
        let request_sub = events.on(topics::SCENE_REQUEST, move |payload| {
            if let Payload::Scene(request) = payload {
                queue.borrow_mut().push_back(request.clone());
            }
        });
        let mut engine = Self {
            assets: AssetManager::new(source, events.clone()),
            animations: AnimationManager::new(events.clone()),
            input: InputManager::new(&config.input, bounds, events.clone(), clock.clone()),
            state: StateManager::new(
                events.clone(),
                storage,
                config.storage_prefix.clone(),
                config.state_history_limit,
            ),
            scenes: SceneManager::new(events.clone(), clock.clone(), config.scene_history_limit),
            plugins: PluginManager::new(),
            time: WorldTime::default(),
            startup_assets: Vec::new(),
            requests,
            request_sub: Some(request_sub),
            running: false,
            destroyed: false,
            surface,
            clock,
            events,
            config,
        };
        engine.apply_surface_size();
        engine
    }

    fn apply_surface_size(&mut self) {
        let (pw, ph) = self.config.pixel_size();
        let dpr = self.config.device_pixel_ratio;
        self.surface.resize(pw, ph);
        self.surface.set_scale(dpr, dpr);
        self.input.set_bounds(SurfaceBounds::new(
            self.config.width,
            self.config.height,
            dpr,
        ));
    }

    /// Split borrows: the scene manager and everything a scene can reach.
    fn scene_parts(&mut self) -> (&mut SceneManager, SceneEnv<'_>) {
        (
            &mut self.scenes,
            SceneEnv {
                events: &self.events,
                assets: &mut self.assets,
                animations: &mut self.animations,
                state: &mut self.state,
                input: &self.input,
            },
        )
    }

    /// The plugin table together with the context its hooks receive.
    pub fn plugin_parts(&mut self) -> (&mut PluginManager, PluginContext<'_>) {
        (
            &mut self.plugins,
            PluginContext {
                events: &self.events,
                state: &mut self.state,
            },
        )
    }

    /// Assets loaded by [`start`](Self::start) before the first scene.
    pub fn declare_assets(&mut self, decls: impl IntoIterator<Item = AssetDecl>) {
        self.startup_assets.extend(decls);
    }

    pub fn register_scene(&mut self, scene: Box<dyn Scene>) -> bool {
        self.scenes.register(scene)
    }

    pub fn register_plugin(&mut self, plugin: EnginePlugin) -> bool {
        self.plugins.register(plugin)
    }

    /// Load startup assets, initialize plugins and enter `initial`.
    pub fn start(&mut self, initial: &str) -> Result<(), EngineError> {
        if self.destroyed {
            return Err(EngineError::Destroyed);
        }
        if self.running {
            warn!("engine already running, start('{}') ignored", initial);
            return Ok(());
        }
        if !self.scenes.has_scene(initial) {
            return Err(EngineError::SceneNotFound(initial.to_string()));
        }
        if !self.startup_assets.is_empty() {
            let decls = std::mem::take(&mut self.startup_assets);
            self.assets.load(&decls)?;
        }
        {
            let (plugins, mut ctx) = self.plugin_parts();
            plugins.init_all(&mut ctx);
        }
        if !self.switch_to(initial, None) {
            return Err(EngineError::SceneSwitch(initial.to_string()));
        }
        self.running = true;
        info!(
            "engine started at {}x{} (dpr {}) in scene '{}'",
            self.config.width, self.config.height, self.config.device_pixel_ratio, initial
        );
        self.events.emit(topics::ENGINE_START, &Payload::text(initial));
        Ok(())
    }

    /// Switch scenes right away. Prefer `request_switch` from inside hooks.
    pub fn switch_to(&mut self, id: &str, data: Option<Value>) -> bool {
        let (scenes, mut env) = self.scene_parts();
        scenes.switch_to(id, data, &mut env)
    }

    pub fn go_back(&mut self) -> bool {
        let (scenes, mut env) = self.scene_parts();
        scenes.go_back(&mut env)
    }

    /// Run one frame at clock reading `now_ms`. Returns the frame delta in
    /// seconds; zero when the engine is not running.
    pub fn frame(&mut self, now_ms: f64) -> f32 {
        if !self.running {
            return 0.0;
        }
        let dt = update_world_time(&mut self.time, now_ms, self.config.max_delta);

        self.assets.poll();

        let input = self.input.update();
        let dpr = self.config.device_pixel_ratio;
        for gesture in &input.gestures {
            // Zones live in logical pixels, input in device pixels.
            let logical = gesture.scaled(dpr);
            if let Some(zone) = self.scenes.dispatch_pointer(&logical) {
                debug!("{} handled by zone '{}'", gesture.kind().name(), zone);
            }
        }

        {
            let (plugins, mut ctx) = self.plugin_parts();
            plugins.update_all(&mut ctx, dt);
        }
        {
            let (scenes, mut env) = self.scene_parts();
            scenes.update(dt, &mut env);
        }
        self.animations.update(dt);

        self.render();
        self.process_requests();
        dt
    }

    fn render(&mut self) {
        let dpr = self.config.device_pixel_ratio;
        self.surface.set_scale(dpr, dpr);
        self.surface.clear(&self.config.background);
        let mut surface = std::mem::replace(&mut self.surface, Box::new(NullSurface));
        {
            let (scenes, mut env) = self.scene_parts();
            scenes.render(surface.as_mut(), &mut env);
        }
        if self.config.debug_overlay {
            self.draw_overlay(surface.as_mut());
        }
        self.surface = surface;
    }

    fn draw_overlay(&mut self, surface: &mut dyn RenderSurface) {
        for (_, rect) in self.scenes.zone_rects() {
            surface.stroke_rect(rect, "#ff00ff", 1.0);
        }
        let fps = if self.time.delta > 0.0 { 1.0 / self.time.delta } else { 0.0 };
        let (loaded, requested) = self.assets.progress();
        let lines = [
            format!("fps {:.0}", fps),
            format!("scene {}", self.scenes.current_id().unwrap_or("-")),
            format!("frame {}", self.time.frame_count),
            format!("assets {}/{}", loaded, requested),
        ];
        surface.fill_rect(Rect::new(4.0, 4.0, 140.0, 14.0 * lines.len() as f32 + 6.0), "rgba(0,0,0,0.6)");
        for (i, line) in lines.iter().enumerate() {
            surface.fill_text(line, 8.0, 16.0 + 14.0 * i as f32, "#00ff00", 12.0);
        }
    }

    fn process_requests(&mut self) {
        loop {
            let next = self.requests.borrow_mut().pop_front();
            let Some(request) = next else {
                break;
            };
            if !self.switch_to(&request.to, request.data) {
                warn!("requested switch to '{}' failed", request.to);
            }
        }
    }

    /// Advance `clock` by `step_ms` and run a frame, `frames` times.
    pub fn run_frames(&mut self, frames: u32, step_ms: f64, clock: &ManualClock) {
        for _ in 0..frames {
            clock.advance(step_ms);
            self.frame(self.clock.now_ms());
        }
    }

    /// New logical size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.destroyed {
            return;
        }
        self.config.set_size(width, height);
        self.apply_surface_size();
        self.scenes.resize(width, height);
        self.events.emit(
            topics::ENGINE_RESIZE,
            &Payload::Value(json!({ "width": width, "height": height })),
        );
    }

    pub fn set_debug(&mut self, on: bool) {
        self.config.debug_overlay = on;
    }

    /// Tear everything down. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.events.emit(topics::ENGINE_DESTROY, &Payload::Empty);
        self.input.detach();
        self.scenes.destroy();
        {
            let (plugins, mut ctx) = self.plugin_parts();
            plugins.destroy_all(&mut ctx);
        }
        self.animations.clear();
        self.assets.shutdown();
        if let Some(sub) = self.request_sub.take() {
            sub.unsubscribe();
        }
        self.requests.borrow_mut().clear();
        self.events.clear();
        self.running = false;
        self.destroyed = true;
        info!("engine destroyed");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn save_key(&self, slot: &str) -> String {
        format!("{}:save:{}", self.state.prefix(), slot)
    }

    /// Write the current scene, state flags and inventory to `slot`.
    pub fn save_game(&mut self, slot: &str) -> Result<(), EngineError> {
        if self.destroyed {
            return Err(EngineError::Destroyed);
        }
        let scene_id = self.scenes.current_id().unwrap_or_default().to_string();
        let inventory = self
            .plugins
            .inventory()
            .map(|inv| inv.items().to_vec())
            .unwrap_or_default();
        let save = SaveGame::new(scene_id, self.state.snapshot(), inventory);
        let text = save.to_json()?;
        self.state
            .storage()
            .set(&self.save_key(slot), &text)
            .map_err(|e| SaveError::Storage(e.to_string()))?;
        info!("game saved to slot '{}'", slot);
        Ok(())
    }

    /// Restore `slot`. Missing, corrupt or unsupported saves are logged
    /// and leave the game untouched.
    pub fn load_game(&mut self, slot: &str) -> bool {
        if self.destroyed {
            return false;
        }
        let Some(text) = self.state.storage().get(&self.save_key(slot)) else {
            return false;
        };
        let save = match SaveGame::from_json(&text) {
            Ok(save) => save,
            Err(e) => {
                warn!("save slot '{}' ignored: {}", slot, e);
                return false;
            }
        };
        self.state.replace(save.flags);
        if let Some(inv) = self.plugins.inventory_mut() {
            inv.restore(&save.inventory);
        }
        if !save.scene_id.is_empty() && !self.switch_to(&save.scene_id, None) {
            warn!("saved scene '{}' could not be entered", save.scene_id);
        }
        info!("game loaded from slot '{}'", slot);
        true
    }

    pub fn has_save_game(&self, slot: &str) -> bool {
        self.state.storage().get(&self.save_key(slot)).is_some()
    }

    pub fn input_sender(&self) -> Option<Sender<RawInput>> {
        self.input.sender()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn time(&self) -> &WorldTime {
        &self.time
    }

    pub fn events(&self) -> &EventSystem {
        &self.events
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetManager {
        &mut self.assets
    }

    pub fn animations(&self) -> &AnimationManager {
        &self.animations
    }

    pub fn animations_mut(&mut self) -> &mut AnimationManager {
        &mut self.animations
    }

    pub fn input(&self) -> &InputManager {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    pub fn scenes(&self) -> &SceneManager {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut SceneManager {
        &mut self.scenes
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginManager {
        &mut self.plugins
    }

    pub fn surface(&self) -> &dyn RenderSurface {
        self.surface.as_ref()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::scene::SceneContext;
    use crate::plugins::InventoryPlugin;
    use crate::resources::assetsource::MemorySource;
    use crate::resources::rendertarget::{DrawCmd, RecordingSurface};
    use crate::resources::storage::MemoryStorage;
    use crate::resources::worldtime::Clock;

    struct Room {
        id: &'static str,
        exit_to: Option<&'static str>,
        frames: u32,
    }

    impl Scene for Room {
        fn id(&self) -> &str {
            self.id
        }
        fn update(&mut self, ctx: &mut SceneContext<'_>, _dt: f32) {
            self.frames += 1;
            if let Some(target) = self.exit_to {
                if self.frames == 2 {
                    ctx.request_switch(target, Some(json!({ "via": self.id })));
                }
            }
        }
        fn render(&mut self, surface: &mut dyn RenderSurface, _ctx: &mut SceneContext<'_>) {
            surface.fill_text(self.id, 0.0, 0.0, "#fff", 10.0);
        }
    }

    fn engine() -> (Engine, ManualClock, RecordingSurface) {
        let clock = ManualClock::new();
        let surface = RecordingSurface::new();
        let engine = Engine::new(
            EngineConfig::new(),
            Box::new(surface.clone()),
            Rc::new(clock.clone()),
            Arc::new(MemorySource::new()),
            Box::new(MemoryStorage::new()),
        );
        (engine, clock, surface)
    }

    fn room(id: &'static str, exit_to: Option<&'static str>) -> Box<dyn Scene> {
        Box::new(Room {
            id,
            exit_to,
            frames: 0,
        })
    }

    #[test]
    fn start_requires_registered_scene() {
        let (mut engine, _, _) = engine();
        assert!(matches!(
            engine.start("nowhere"),
            Err(EngineError::SceneNotFound(_))
        ));
        assert!(!engine.is_running());
    }

    #[test]
    fn requested_switch_happens_after_the_frame() {
        let (mut engine, clock, _) = engine();
        engine.register_scene(room("hall", Some("cellar")));
        engine.register_scene(room("cellar", None));
        engine.start("hall").unwrap();
        engine.run_frames(1, 16.0, &clock);
        assert_eq!(engine.scenes().current_id(), Some("hall"));
        engine.run_frames(1, 16.0, &clock);
        assert_eq!(engine.scenes().current_id(), Some("cellar"));
        assert_eq!(engine.scenes().history(), vec!["hall"]);
    }

    #[test]
    fn frame_clears_then_renders_scene() {
        let (mut engine, clock, surface) = engine();
        engine.register_scene(room("hall", None));
        engine.start("hall").unwrap();
        surface.take();
        engine.run_frames(1, 16.0, &clock);
        let cmds = surface.take();
        let clear = cmds.iter().position(|c| matches!(c, DrawCmd::Clear { .. }));
        let text = cmds.iter().position(|c| matches!(c, DrawCmd::Text { .. }));
        assert!(clear.is_some() && text.is_some() && clear < text);
    }

    #[test]
    fn resize_updates_backing_store() {
        let (mut engine, _, surface) = engine();
        engine.resize(320, 200);
        assert_eq!(surface.size(), (320, 200));
        assert_eq!(engine.input().bounds().css_width, 320.0);
    }

    #[test]
    fn save_and_load_round_trip() {
        let (mut engine, _, _) = engine();
        engine.register_scene(room("hall", None));
        engine.register_scene(room("cellar", None));
        engine.register_plugin(EnginePlugin::Inventory(InventoryPlugin::new()));
        engine.start("hall").unwrap();
        engine.state_mut().set("lamp_on", true).unwrap();
        let events = engine.events().clone();
        if let Some(inv) = engine.plugins_mut().inventory_mut() {
            inv.add("key", &events);
        }
        engine.switch_to("cellar", None);
        engine.save_game("one").unwrap();

        engine.switch_to("hall", None);
        engine.state_mut().set("lamp_on", false).unwrap();
        assert!(engine.load_game("one"));
        assert_eq!(engine.scenes().current_id(), Some("cellar"));
        assert_eq!(engine.state().get::<bool>("lamp_on"), Some(true));
        assert_eq!(
            engine.plugins().inventory().map(|i| i.items().to_vec()),
            Some(vec!["key".to_string()])
        );
        assert!(!engine.load_game("missing"));
    }

    #[test]
    fn destroy_is_idempotent() {
        let (mut engine, clock, _) = engine();
        engine.register_scene(room("hall", None));
        engine.start("hall").unwrap();
        engine.destroy();
        engine.destroy();
        assert!(engine.is_destroyed());
        assert!(!engine.input().is_attached());
        assert_eq!(engine.frame(clock.now_ms()), 0.0);
        assert!(matches!(engine.start("hall"), Err(EngineError::Destroyed)));
    }
}
