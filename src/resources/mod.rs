//! Long-lived engine services and shared data.
//!
//! Overview
//! - `animationstore` – named animation clips, playback and completion events
//! - `assetsource` – where asset bytes come from (filesystem or memory)
//! - `assetstore` – asset cache fed by the background loader thread
//! - `blackboard` – typed scratch storage shared by a scene's hooks
//! - `gameconfig` – engine configuration loaded from an INI file
//! - `input` – host input normalization, held state, gestures and macros
//! - `rendertarget` – render surface contract and a recording surface
//! - `screensize` – surface bounds and client to canvas mapping
//! - `state` – key/value game state with undo and save slots
//! - `storage` – durable key/value backends for saves
//! - `worldtime` – clocks and frame timing
pub mod animationstore;
pub mod assetsource;
pub mod assetstore;
pub mod blackboard;
pub mod gameconfig;
pub mod input;
pub mod rendertarget;
pub mod screensize;
pub mod state;
pub mod storage;
pub mod worldtime;
