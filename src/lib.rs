//! Pointclick engine library.
//!
//! The core of a 2D point-and-click game engine: an event bus, asset
//! loading, animations, input and gestures, game state, scenes with
//! per-scene timers and cutscenes, plugins, and puzzle evaluators. The
//! host supplies a render surface, a clock and raw input; the engine
//! produces events and draw calls.

pub mod components;
pub mod engine;
pub mod error;
pub mod events;
pub mod plugins;
pub mod puzzles;
pub mod resources;
pub mod save;
pub mod systems;
