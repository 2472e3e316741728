//! Engine systems.
//!
//! This module groups the per-frame and per-event logic that drives the
//! services in [`crate::resources`].
//!
//! Submodules overview
//! - [`animation`] – advance one animation clip by a time step
//! - [`assetloader`] – background thread that fetches and decodes assets
//! - [`cutscene`] – run cutscene steps in order across frames
//! - [`gestures`] – recognize taps, long presses and swipes from pointer streams
//! - [`scenes`] – scene registry, switching and history
//! - [`sequence`] – match recent input tokens against registered macros
//! - [`services`] – the per-scene bundle of timers, cutscene runner and blackboard
//! - [`time`] – turn clock readings into capped frame deltas
//! - [`timers`] – pausable timeouts and intervals

pub mod animation;
pub mod assetloader;
pub mod cutscene;
pub mod gestures;
pub mod scenes;
pub mod sequence;
pub mod services;
pub mod time;
pub mod timers;
