//! The scene contract.
//!
//! A scene is one self-contained mode of a game (a room, a puzzle screen, a
//! menu). It is registered once with the
//! [`SceneManager`](crate::systems::scenes::SceneManager) and reused across
//! activations; `init` runs on the first activation only.
//!
//! Hooks receive a [`SceneContext`] with the engine services and the
//! scene's own [`SceneServices`]. To move to another scene from inside a
//! hook, call [`SceneContext::request_switch`]; the engine performs the
//! switch after the current frame.
//!
//! Related:
//! - [`crate::components::zone`] – interaction zones a scene may expose
//! - [`crate::systems::services`] – per-scene timers, cutscenes, blackboard

use serde_json::Value;

use crate::components::asset::AssetDecl;
use crate::components::zone::InteractionZones;
use crate::events::payload::SceneTransition;
use crate::events::{EventSystem, Payload, topics};
use crate::resources::animationstore::AnimationManager;
use crate::resources::assetstore::AssetManager;
use crate::resources::input::InputManager;
use crate::resources::rendertarget::RenderSurface;
use crate::resources::state::StateManager;
use crate::systems::services::SceneServices;

/// Engine services lent to the scene manager for one call.
pub struct SceneEnv<'a> {
    pub events: &'a EventSystem,
    pub assets: &'a mut AssetManager,
    pub animations: &'a mut AnimationManager,
    pub state: &'a mut StateManager,
    pub input: &'a InputManager,
}

/// What a scene hook can reach.
pub struct SceneContext<'a> {
    pub events: &'a EventSystem,
    pub assets: &'a mut AssetManager,
    pub animations: &'a mut AnimationManager,
    pub state: &'a mut StateManager,
    pub input: &'a InputManager,
    pub services: &'a mut SceneServices,
}

impl<'a> SceneContext<'a> {
    pub fn new(env: &'a mut SceneEnv<'_>, services: &'a mut SceneServices) -> Self {
        Self {
            events: env.events,
            assets: &mut *env.assets,
            animations: &mut *env.animations,
            state: &mut *env.state,
            input: env.input,
            services,
        }
    }

    /// Ask for a switch to `scene_id` once the current frame is done.
    pub fn request_switch(&self, scene_id: impl Into<String>, data: Option<Value>) {
        self.events.emit(
            topics::SCENE_REQUEST,
            &Payload::Scene(SceneTransition {
                from: None,
                to: scene_id.into(),
                data,
            }),
        );
    }
}

pub trait Scene {
    /// Unique id used for registration and switching.
    fn id(&self) -> &str;

    /// First activation only, before the first `on_enter`.
    fn init(&mut self, _ctx: &mut SceneContext<'_>) {}

    /// `previous` is the id of the scene being left, if any.
    fn on_enter(
        &mut self,
        _ctx: &mut SceneContext<'_>,
        _previous: Option<&str>,
        _data: Option<&Value>,
    ) {
    }

    fn on_exit(&mut self, _ctx: &mut SceneContext<'_>) {}

    /// Per frame while active. Must return promptly.
    fn update(&mut self, _ctx: &mut SceneContext<'_>, _dt: f32) {}

    /// Draw the scene. The surface is already cleared and scaled to logical
    /// pixels.
    fn render(&mut self, _surface: &mut dyn RenderSurface, _ctx: &mut SceneContext<'_>) {}

    /// Logical size changed.
    fn on_resize(&mut self, _width: u32, _height: u32) {}

    /// End of life. The scene is never activated again.
    fn destroy(&mut self) {}

    fn zones_mut(&mut self) -> Option<&mut InteractionZones> {
        None
    }

    /// Assets that must be loaded before the scene is entered.
    fn required_assets(&self) -> Vec<AssetDecl> {
        Vec::new()
    }
}
