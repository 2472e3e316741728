//! Engine configuration.
//!
//! Settings are loaded from an INI file. Missing keys keep their defaults,
//! so a partial file is valid.
//!
//! # Configuration File Format
//!
//! ```ini
//! [surface]
//! width = 800
//! height = 600
//! device_pixel_ratio = 2.0
//! background = #101018
//!
//! [loop]
//! max_delta = 0.1
//! debug_overlay = false
//!
//! [input]
//! swipe_threshold = 50
//! move_threshold = 10
//! long_press_ms = 500
//! double_tap_ms = 300
//! double_tap_distance = 30
//! sequence_window = 10
//!
//! [scenes]
//! history_limit = 10
//!
//! [state]
//! history_limit = 50
//! storage_prefix = pointclick
//! ```

use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Default safe values for startup
const DEFAULT_WIDTH: u32 = 800;
const DEFAULT_HEIGHT: u32 = 600;
const DEFAULT_DEVICE_PIXEL_RATIO: f32 = 1.0;
const DEFAULT_BACKGROUND: &str = "#000000";
const DEFAULT_MAX_DELTA: f32 = 0.1;
const DEFAULT_SWIPE_THRESHOLD: f32 = 50.0;
const DEFAULT_MOVE_THRESHOLD: f32 = 10.0;
const DEFAULT_LONG_PRESS_MS: f64 = 500.0;
const DEFAULT_DOUBLE_TAP_MS: f64 = 300.0;
const DEFAULT_DOUBLE_TAP_DISTANCE: f32 = 30.0;
const DEFAULT_SEQUENCE_WINDOW: usize = 10;
const DEFAULT_SCENE_HISTORY: usize = 10;
const DEFAULT_STATE_HISTORY: usize = 50;
const DEFAULT_STORAGE_PREFIX: &str = "pointclick";
const DEFAULT_CONFIG_PATH: &str = "./pointclick.ini";

/// Gesture thresholds used by the input manager.
#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    /// Minimum travel from gesture start, in device pixels, for a swipe.
    pub swipe_threshold: f32,
    /// Travel beyond which a press no longer counts as stationary.
    pub move_threshold: f32,
    pub long_press_ms: f64,
    /// Max time between two releases for a double tap.
    pub double_tap_ms: f64,
    /// Max distance between two releases for a double tap.
    pub double_tap_distance: f32,
    /// Number of recent tokens kept for sequence macros.
    pub sequence_window: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            swipe_threshold: DEFAULT_SWIPE_THRESHOLD,
            move_threshold: DEFAULT_MOVE_THRESHOLD,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            double_tap_ms: DEFAULT_DOUBLE_TAP_MS,
            double_tap_distance: DEFAULT_DOUBLE_TAP_DISTANCE,
            sequence_window: DEFAULT_SEQUENCE_WINDOW,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Logical surface width in CSS pixels.
    pub width: u32,
    /// Logical surface height in CSS pixels.
    pub height: u32,
    pub device_pixel_ratio: f32,
    /// Clear color, as a CSS color string.
    pub background: String,
    /// Upper bound of a single frame's delta, in seconds.
    pub max_delta: f32,
    pub debug_overlay: bool,
    pub input: InputConfig,
    pub scene_history_limit: usize,
    pub state_history_limit: usize,
    /// Prefix of every key written to durable storage.
    pub storage_prefix: String,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            device_pixel_ratio: DEFAULT_DEVICE_PIXEL_RATIO,
            background: DEFAULT_BACKGROUND.to_string(),
            max_delta: DEFAULT_MAX_DELTA,
            debug_overlay: false,
            input: InputConfig::default(),
            scene_history_limit: DEFAULT_SCENE_HISTORY,
            state_history_limit: DEFAULT_STATE_HISTORY,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    pub fn load_from_file(&mut self) -> Result<(), ConfigError> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|reason| ConfigError::Read {
                path: self.config_path.clone(),
                reason,
            })?;
        self.apply(&config);

        info!(
            "Loaded config: {}x{} @{}x, max_delta={}, history scenes={} state={}",
            self.width,
            self.height,
            self.device_pixel_ratio,
            self.max_delta,
            self.scene_history_limit,
            self.state_history_limit
        );
        Ok(())
    }

    /// Parse configuration from INI text, e.g. an embedded default file.
    pub fn load_from_str(&mut self, text: &str) -> Result<(), ConfigError> {
        let mut config = Ini::new();
        config.read(text.to_string()).map_err(|reason| ConfigError::Read {
            path: PathBuf::from("<string>"),
            reason,
        })?;
        self.apply(&config);
        Ok(())
    }

    fn apply(&mut self, config: &Ini) {
        let uint = |section: &str, key: &str| config.getuint(section, key).ok().flatten();
        let float = |section: &str, key: &str| config.getfloat(section, key).ok().flatten();
        let boolean = |section: &str, key: &str| config.getbool(section, key).ok().flatten();

        // [surface] section
        if let Some(width) = uint("surface", "width") {
            self.width = width as u32;
        }
        if let Some(height) = uint("surface", "height") {
            self.height = height as u32;
        }
        if let Some(dpr) = float("surface", "device_pixel_ratio").filter(|d| *d > 0.0) {
            self.device_pixel_ratio = dpr as f32;
        }
        if let Some(bg) = config.get("surface", "background") {
            self.background = bg;
        }

        // [loop] section
        if let Some(max_delta) = float("loop", "max_delta").filter(|d| *d > 0.0) {
            self.max_delta = max_delta as f32;
        }
        if let Some(debug) = boolean("loop", "debug_overlay") {
            self.debug_overlay = debug;
        }

        // [input] section
        if let Some(v) = float("input", "swipe_threshold") {
            self.input.swipe_threshold = v as f32;
        }
        if let Some(v) = float("input", "move_threshold") {
            self.input.move_threshold = v as f32;
        }
        if let Some(v) = float("input", "long_press_ms") {
            self.input.long_press_ms = v;
        }
        if let Some(v) = float("input", "double_tap_ms") {
            self.input.double_tap_ms = v;
        }
        if let Some(v) = float("input", "double_tap_distance") {
            self.input.double_tap_distance = v as f32;
        }
        if let Some(v) = uint("input", "sequence_window") {
            self.input.sequence_window = (v as usize).max(1);
        }

        // [scenes] and [state] sections
        if let Some(v) = uint("scenes", "history_limit") {
            self.scene_history_limit = v as usize;
        }
        if let Some(v) = uint("state", "history_limit") {
            self.state_history_limit = v as usize;
        }
        if let Some(prefix) = config.get("state", "storage_prefix") {
            self.storage_prefix = prefix;
        }
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), ConfigError> {
        let mut config = Ini::new();

        config.set("surface", "width", Some(self.width.to_string()));
        config.set("surface", "height", Some(self.height.to_string()));
        config.set(
            "surface",
            "device_pixel_ratio",
            Some(self.device_pixel_ratio.to_string()),
        );
        config.set("surface", "background", Some(self.background.clone()));

        config.set("loop", "max_delta", Some(self.max_delta.to_string()));
        config.set("loop", "debug_overlay", Some(self.debug_overlay.to_string()));

        let input = &self.input;
        config.set("input", "swipe_threshold", Some(input.swipe_threshold.to_string()));
        config.set("input", "move_threshold", Some(input.move_threshold.to_string()));
        config.set("input", "long_press_ms", Some(input.long_press_ms.to_string()));
        config.set("input", "double_tap_ms", Some(input.double_tap_ms.to_string()));
        config.set(
            "input",
            "double_tap_distance",
            Some(input.double_tap_distance.to_string()),
        );
        config.set("input", "sequence_window", Some(input.sequence_window.to_string()));

        config.set(
            "scenes",
            "history_limit",
            Some(self.scene_history_limit.to_string()),
        );
        config.set(
            "state",
            "history_limit",
            Some(self.state_history_limit.to_string()),
        );
        config.set("state", "storage_prefix", Some(self.storage_prefix.clone()));

        config
            .write(&self.config_path)
            .map_err(|e| ConfigError::Write {
                path: self.config_path.clone(),
                reason: e.to_string(),
            })?;

        info!("Saved config to {:?}", self.config_path);
        Ok(())
    }

    /// Set the logical surface size.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Backing-store size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.device_pixel_ratio).round() as u32,
            (self.height as f32 * self.device_pixel_ratio).round() as u32,
        )
    }
}
