//! Error types shared across the engine.
//!
//! Lookup misses (unknown scene, absent asset, stale timer handle) are not
//! errors and never show up here; they are reported through `Option` or
//! `bool` return values by the owning service.

use std::path::PathBuf;

/// Failure to load a single asset or a batch of assets.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The asset locator could not be read.
    #[error("asset '{id}' could not be fetched from '{src}': {reason}")]
    Fetch {
        id: String,
        src: String,
        reason: String,
    },

    /// The payload was fetched but is not a decodable instance of its type.
    #[error("asset '{id}' could not be decoded: {reason}")]
    Decode { id: String, reason: String },

    /// The loader thread is gone (manager shut down).
    #[error("asset loader is not running")]
    LoaderUnavailable,
}

impl AssetError {
    /// Id of the asset this error refers to, if any.
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            AssetError::Fetch { id, .. } | AssetError::Decode { id, .. } => Some(id),
            AssetError::LoaderUnavailable => None,
        }
    }
}

/// Errors raised by the generic state store.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("value for '{key}' is not serializable: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },

    #[error("state import failed: {0}")]
    Import(String),
}

/// Errors raised while reading or migrating an engine-level save game.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("save data is malformed: {0}")]
    Malformed(String),

    #[error("save version {found} is not supported (current is {current})")]
    UnsupportedVersion { found: u32, current: u32 },

    #[error("migration from version {from} failed: {reason}")]
    MigrationFailed { from: u32, reason: String },

    #[error("storage write failed: {0}")]
    Storage(String),
}

/// Errors raised while loading or saving the INI configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config file {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// Errors raised when a puzzle definition is structurally invalid.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PuzzleError {
    #[error("grid is {width}x{height} but {tiles} tiles were given")]
    GridSize {
        width: usize,
        height: usize,
        tiles: usize,
    },

    #[error("gear '{0}' is not defined")]
    UnknownGear(String),

    #[error("gear '{0}' is defined twice")]
    DuplicateGear(String),

    #[error("puzzle definition could not be parsed: {0}")]
    Parse(String),
}

/// Errors raised by the cutscene runner.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CutsceneError {
    /// A run is in progress; callers must cancel it first.
    #[error("a cutscene is already running")]
    AlreadyRunning,
}

/// Top-level engine failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error("scene '{0}' is not registered")]
    SceneNotFound(String),

    #[error("scene '{0}' could not be entered")]
    SceneSwitch(String),

    #[error("engine has been destroyed")]
    Destroyed,
}
