//! Plain data records owned by the engine services.
//!
//! Submodules overview:
//! - [`animation`] – animation clip definitions and playback state
//! - [`asset`] – asset declarations and decoded asset payloads
//! - [`cutscene`] – cutscene step sum type and run status
//! - [`rect`] – axis-aligned rectangle in canvas pixels
//! - [`scene`] – the scene contract and the context its hooks receive
//! - [`timer`] – timeout and interval records
//! - [`zone`] – prioritized interaction zones owned by a scene

pub mod animation;
pub mod asset;
pub mod cutscene;
pub mod rect;
pub mod scene;
pub mod timer;
pub mod zone;
