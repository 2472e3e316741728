//! Engine-level save games.
//!
//! A save records the active scene, the game flags and the inventory:
//!
//! ```json
//! { "sceneId": "hall", "flags": { "lamp_on": true }, "inventory": ["key"], "v": 2 }
//! ```
//!
//! Older saves are upgraded one version at a time through a
//! [`MigrationRegistry`] before they are decoded. Version 1 kept the flags
//! under `ctx`.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SaveError;

pub const CURRENT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    #[serde(rename = "sceneId")]
    pub scene_id: String,
    #[serde(default)]
    pub flags: Map<String, Value>,
    #[serde(default)]
    pub inventory: Vec<String>,
    pub v: u32,
}

impl SaveGame {
    pub fn new(scene_id: impl Into<String>, flags: Map<String, Value>, inventory: Vec<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            flags,
            inventory,
            v: CURRENT_VERSION,
        }
    }

    pub fn to_json(&self) -> Result<String, SaveError> {
        serde_json::to_string(self).map_err(|e| SaveError::Malformed(e.to_string()))
    }

    /// Parse and upgrade a save of any supported version.
    pub fn from_json(text: &str) -> Result<Self, SaveError> {
        let raw: Value = serde_json::from_str(text).map_err(|e| SaveError::Malformed(e.to_string()))?;
        Self::from_value(raw, &MigrationRegistry::default())
    }

    pub fn from_value(raw: Value, registry: &MigrationRegistry) -> Result<Self, SaveError> {
        let found = version_of(&raw)?;
        let upgraded = registry.migrate(raw, found, CURRENT_VERSION)?;
        if found != CURRENT_VERSION {
            info!("save upgraded from v{} to v{}", found, CURRENT_VERSION);
        }
        serde_json::from_value(upgraded).map_err(|e| SaveError::Malformed(e.to_string()))
    }
}

/// Saves without `v` predate versioning and count as version 1.
fn version_of(raw: &Value) -> Result<u32, SaveError> {
    let Value::Object(map) = raw else {
        return Err(SaveError::Malformed("save is not a JSON object".into()));
    };
    match map.get("v") {
        None => Ok(1),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| SaveError::Malformed(format!("bad version field {}", v))),
    }
}

/// Upgrades a save document from version `N` to `N + 1`.
pub type MigrationFn = fn(Value) -> Result<Value, SaveError>;

/// Per-version upgrade steps, keyed by source version.
pub struct MigrationRegistry {
    steps: BTreeMap<u32, MigrationFn>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self {
            steps: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, from_version: u32, step: MigrationFn) {
        self.steps.insert(from_version, step);
    }

    pub fn can_migrate(&self, from: u32, to: u32) -> bool {
        from <= to && (from..to).all(|v| self.steps.contains_key(&v))
    }

    /// Chain the registered steps from `from` up to `to`.
    pub fn migrate(&self, data: Value, from: u32, to: u32) -> Result<Value, SaveError> {
        if !self.can_migrate(from, to) {
            return Err(SaveError::UnsupportedVersion {
                found: from,
                current: to,
            });
        }
        let mut data = data;
        for version in from..to {
            if let Some(step) = self.steps.get(&version) {
                debug!("migrating save v{} -> v{}", version, version + 1);
                data = step(data)?;
            }
        }
        Ok(data)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

impl Default for MigrationRegistry {
    /// Registry with every built-in upgrade step.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(1, v1_to_v2);
        registry
    }
}

fn v1_to_v2(data: Value) -> Result<Value, SaveError> {
    let Value::Object(mut map) = data else {
        return Err(SaveError::MigrationFailed {
            from: 1,
            reason: "save is not a JSON object".into(),
        });
    };
    let flags = match map.remove("ctx") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::Object(ctx)) => Value::Object(ctx),
        Some(other) => {
            return Err(SaveError::MigrationFailed {
                from: 1,
                reason: format!("ctx must be an object, found {}", other),
            });
        }
    };
    map.entry("flags").or_insert(flags);
    map.insert("v".into(), Value::from(2));
    Ok(Value::Object(map))
}
