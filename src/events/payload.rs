//! Data carried by event emissions.

use serde_json::Value;

use crate::events::input::{Gesture, InputEvent};

/// Scene switch notification, sent with `scene:exit` and `scene:enter`,
/// and as the request carried by `scene:request`.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTransition {
    pub from: Option<String>,
    pub to: String,
    /// Payload handed to the incoming scene's enter hook.
    pub data: Option<Value>,
}

/// A single effective change in the state store.
///
/// `value` is `None` when the key was deleted; `previous` is `None` when the
/// key did not exist before.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub key: String,
    pub value: Option<Value>,
    pub previous: Option<Value>,
}

/// Payload of an emission. The set of cases is closed so handlers can match
/// exhaustively; free-form data travels in [`Payload::Value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Scene(SceneTransition),
    Input(InputEvent),
    Gesture(Gesture),
    Macro { name: String, tokens: Vec<String> },
    Asset { id: String },
    AssetFailed { id: String, error: String },
    StateChange(StateChange),
    Animation { name: String, frame: usize },
    Say { speaker: Option<String>, text: String },
    Value(Value),
}

impl Payload {
    /// Convenience for `Payload::Text`.
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Text(s.into())
    }

    /// The text of a `Text` payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The JSON value of a `Value` payload.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }
}
