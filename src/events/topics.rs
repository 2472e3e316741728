//! Well-known topic names.
//!
//! Topics follow the `<namespace>:<action>` convention. UI layers subscribe
//! to these instead of polling engine state.

pub const SCENE_ENTER: &str = "scene:enter";
pub const SCENE_EXIT: &str = "scene:exit";
pub const SCENE_REGISTERED: &str = "scene:registered";
/// Ask the engine to switch scenes at the end of the current frame.
pub const SCENE_REQUEST: &str = "scene:request";

pub const ASSET_LOADED: &str = "asset:loaded";
pub const ASSET_ERROR: &str = "asset:error";
pub const ASSET_UNLOADED: &str = "asset:unloaded";

pub const INPUT_POINTER_DOWN: &str = "input:pointerdown";
pub const INPUT_POINTER_MOVE: &str = "input:pointermove";
pub const INPUT_POINTER_UP: &str = "input:pointerup";
pub const INPUT_POINTER_CANCEL: &str = "input:pointercancel";
pub const INPUT_KEY_DOWN: &str = "input:keydown";
pub const INPUT_KEY_UP: &str = "input:keyup";
pub const INPUT_KEY_HELD: &str = "input:keyheld";
pub const INPUT_POINTER_HELD: &str = "input:pointerheld";
pub const INPUT_TOUCH_HELD: &str = "input:touchheld";
pub const INPUT_TAP: &str = "input:tap";
pub const INPUT_DOUBLE_TAP: &str = "input:doubletap";
pub const INPUT_LONG_PRESS: &str = "input:longpress";
pub const INPUT_SWIPE: &str = "input:swipe";
pub const INPUT_MACRO_PREFIX: &str = "input:macro";

pub const STATE_CHANGE: &str = "state:change";
pub const STATE_SAVED: &str = "state:saved";
pub const STATE_LOADED: &str = "state:loaded";

pub const ANIMATION_COMPLETE: &str = "animation:complete";

pub const CUTSCENE_START: &str = "cutscene:start";
pub const CUTSCENE_SAY: &str = "cutscene:say";
pub const CUTSCENE_DONE: &str = "cutscene:done";
pub const CUTSCENE_CANCELLED: &str = "cutscene:cancelled";

pub const DIALOGUE_START: &str = "dialogue:start";
pub const DIALOGUE_LINE: &str = "dialogue:line";
pub const DIALOGUE_END: &str = "dialogue:end";

pub const INVENTORY_ADD: &str = "inventory:add";
pub const INVENTORY_REMOVE: &str = "inventory:remove";
pub const INVENTORY_SELECT: &str = "inventory:select";

pub const ACHIEVEMENT_UNLOCKED: &str = "achievement:unlocked";

pub const ENGINE_START: &str = "engine:start";
pub const ENGINE_RESIZE: &str = "engine:resize";
pub const ENGINE_DESTROY: &str = "engine:destroy";

/// Build a `<namespace>:<action>` topic.
pub fn topic(namespace: &str, action: &str) -> String {
    format!("{namespace}:{action}")
}

/// Topic fired when the named input macro matches.
pub fn macro_topic(name: &str) -> String {
    format!("{INPUT_MACRO_PREFIX}:{name}")
}

/// Per-key change topic used by state watchers.
pub fn state_key_topic(key: &str) -> String {
    format!("{STATE_CHANGE}:{key}")
}
