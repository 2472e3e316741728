//! Input vocabulary.
//!
//! The host surface delivers [`RawInput`] (mouse, touch and keyboard events
//! in client coordinates). The [`InputManager`](crate::resources::input::InputManager)
//! normalizes them into [`InputEvent`]s (`pointerdown/move/up`,
//! `keydown/up`) and derives [`Gesture`]s from pointer streams.

use serde::{Deserialize, Serialize};

/// Pointer id reported for the mouse. Touch points keep their host ids.
pub const MOUSE_POINTER_ID: u32 = u32::MAX;

/// One changed touch point of a touch event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: u32,
    pub client_x: f32,
    pub client_y: f32,
}

impl TouchPoint {
    pub fn new(id: u32, client_x: f32, client_y: f32) -> Self {
        Self {
            id,
            client_x,
            client_y,
        }
    }
}

/// Input as delivered by the host surface, in client (page) coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawInput {
    MouseDown { client_x: f32, client_y: f32, button: u8 },
    MouseMove { client_x: f32, client_y: f32 },
    MouseUp { client_x: f32, client_y: f32, button: u8 },
    /// `touches` are the changed touch points only.
    TouchStart { touches: Vec<TouchPoint> },
    TouchMove { touches: Vec<TouchPoint> },
    TouchEnd { touches: Vec<TouchPoint> },
    TouchCancel { touches: Vec<TouchPoint> },
    KeyDown { key: String, repeat: bool },
    KeyUp { key: String },
    /// Surface lost focus; everything held is released.
    Blur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerKind {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEventKind {
    PointerDown,
    PointerMove,
    PointerUp,
    PointerCancel,
    KeyDown,
    KeyUp,
}

impl InputEventKind {
    /// Token name used in topics and sequence macros.
    pub fn name(self) -> &'static str {
        match self {
            InputEventKind::PointerDown => "pointerdown",
            InputEventKind::PointerMove => "pointermove",
            InputEventKind::PointerUp => "pointerup",
            InputEventKind::PointerCancel => "pointercancel",
            InputEventKind::KeyDown => "keydown",
            InputEventKind::KeyUp => "keyup",
        }
    }

    pub fn is_pointer(self) -> bool {
        !matches!(self, InputEventKind::KeyDown | InputEventKind::KeyUp)
    }
}

/// Normalized input event. Coordinates are canvas-relative device pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub kind: InputEventKind,
    pub pointer_id: Option<u32>,
    pub pointer_kind: Option<PointerKind>,
    pub x: f32,
    pub y: f32,
    pub button: Option<u8>,
    pub key: Option<String>,
    pub timestamp_ms: f64,
}

impl InputEvent {
    pub fn pointer(
        kind: InputEventKind,
        pointer_id: u32,
        pointer_kind: PointerKind,
        x: f32,
        y: f32,
        timestamp_ms: f64,
    ) -> Self {
        Self {
            kind,
            pointer_id: Some(pointer_id),
            pointer_kind: Some(pointer_kind),
            x,
            y,
            button: None,
            key: None,
            timestamp_ms,
        }
    }

    pub fn key(kind: InputEventKind, key: impl Into<String>, timestamp_ms: f64) -> Self {
        Self {
            kind,
            pointer_id: None,
            pointer_kind: None,
            x: 0.0,
            y: 0.0,
            button: None,
            key: Some(key.into()),
            timestamp_ms,
        }
    }

    /// Sequence token: `pointerdown`, `keydown:Space`, ...
    pub fn token(&self) -> String {
        match (&self.key, self.kind.is_pointer()) {
            (Some(key), false) => format!("{}:{}", self.kind.name(), key),
            _ => self.kind.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    /// Direction of the axis with the greater absolute delta.
    /// Ties go to the horizontal axis.
    pub fn from_delta(dx: f32, dy: f32) -> Self {
        if dx.abs() >= dy.abs() {
            if dx >= 0.0 {
                SwipeDirection::Right
            } else {
                SwipeDirection::Left
            }
        } else if dy >= 0.0 {
            SwipeDirection::Down
        } else {
            SwipeDirection::Up
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureKind {
    Tap,
    DoubleTap,
    LongPress,
    Swipe,
}

impl GestureKind {
    pub fn name(self) -> &'static str {
        match self {
            GestureKind::Tap => "tap",
            GestureKind::DoubleTap => "doubletap",
            GestureKind::LongPress => "longpress",
            GestureKind::Swipe => "swipe",
        }
    }
}

/// Higher-level gesture derived from pointer streams.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Tap {
        pointer_id: u32,
        x: f32,
        y: f32,
    },
    DoubleTap {
        pointer_id: u32,
        x: f32,
        y: f32,
    },
    LongPress {
        pointer_id: u32,
        x: f32,
        y: f32,
        duration_ms: f64,
    },
    Swipe {
        pointer_id: u32,
        direction: SwipeDirection,
        start_x: f32,
        start_y: f32,
        end_x: f32,
        end_y: f32,
        distance: f32,
        duration_ms: f64,
    },
}

impl Gesture {
    pub fn kind(&self) -> GestureKind {
        match self {
            Gesture::Tap { .. } => GestureKind::Tap,
            Gesture::DoubleTap { .. } => GestureKind::DoubleTap,
            Gesture::LongPress { .. } => GestureKind::LongPress,
            Gesture::Swipe { .. } => GestureKind::Swipe,
        }
    }

    /// Where the gesture happened. Swipes report their start point.
    pub fn position(&self) -> (f32, f32) {
        match *self {
            Gesture::Tap { x, y, .. }
            | Gesture::DoubleTap { x, y, .. }
            | Gesture::LongPress { x, y, .. } => (x, y),
            Gesture::Swipe {
                start_x, start_y, ..
            } => (start_x, start_y),
        }
    }

    /// Same gesture with every coordinate and distance divided by `ratio`.
    /// Turns device-pixel gestures into logical pixels.
    pub fn scaled(&self, ratio: f32) -> Gesture {
        if ratio <= 0.0 || ratio == 1.0 {
            return self.clone();
        }
        let mut out = self.clone();
        match &mut out {
            Gesture::Tap { x, y, .. }
            | Gesture::DoubleTap { x, y, .. }
            | Gesture::LongPress { x, y, .. } => {
                *x /= ratio;
                *y /= ratio;
            }
            Gesture::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
                distance,
                ..
            } => {
                *start_x /= ratio;
                *start_y /= ratio;
                *end_x /= ratio;
                *end_y /= ratio;
                *distance /= ratio;
            }
        }
        out
    }

    /// Sequence token: `tap`, `longpress`, `swipe:left`, ...
    pub fn token(&self) -> String {
        match self {
            Gesture::Swipe { direction, .. } => format!("swipe:{}", direction.name()),
            other => other.kind().name().to_string(),
        }
    }
}
