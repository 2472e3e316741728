//! Cutscene script steps.

use std::fmt;

use crate::events::EventSystem;

/// Side effect run by an `Effect` step. An `Err` is logged and the script
/// moves on.
pub type EffectFn = Box<dyn FnMut(&EventSystem) -> Result<(), String>>;
/// Per-tick callback of an `Animate` step. Receives seconds since the step
/// began and returns true once finished.
pub type AnimateFn = Box<dyn FnMut(f32) -> bool>;

/// What a `Wait` step suspends on.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitFor {
    /// Milliseconds on the scene's timer service.
    Duration(f64),
    /// The next emission of a topic.
    Event(String),
}

pub enum CutsceneStep {
    /// Emit a line on `cutscene:say`.
    Say {
        speaker: Option<String>,
        text: String,
    },
    Wait(WaitFor),
    Effect(EffectFn),
    Animate(AnimateFn),
}

impl CutsceneStep {
    pub fn say(text: impl Into<String>) -> Self {
        CutsceneStep::Say {
            speaker: None,
            text: text.into(),
        }
    }

    pub fn say_as(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        CutsceneStep::Say {
            speaker: Some(speaker.into()),
            text: text.into(),
        }
    }

    pub fn wait_ms(ms: f64) -> Self {
        CutsceneStep::Wait(WaitFor::Duration(ms))
    }

    pub fn wait_for(topic: impl Into<String>) -> Self {
        CutsceneStep::Wait(WaitFor::Event(topic.into()))
    }

    pub fn effect(f: impl FnMut(&EventSystem) -> Result<(), String> + 'static) -> Self {
        CutsceneStep::Effect(Box::new(f))
    }

    pub fn animate(f: impl FnMut(f32) -> bool + 'static) -> Self {
        CutsceneStep::Animate(Box::new(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CutsceneStep::Say { .. } => "say",
            CutsceneStep::Wait(_) => "wait",
            CutsceneStep::Effect(_) => "effect",
            CutsceneStep::Animate(_) => "animate",
        }
    }
}

impl fmt::Debug for CutsceneStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutsceneStep::Say { speaker, text } => f
                .debug_struct("Say")
                .field("speaker", speaker)
                .field("text", text)
                .finish(),
            CutsceneStep::Wait(wait) => f.debug_tuple("Wait").field(wait).finish(),
            CutsceneStep::Effect(_) => f.write_str("Effect(..)"),
            CutsceneStep::Animate(_) => f.write_str("Animate(..)"),
        }
    }
}

/// Lifecycle of a [`CutsceneRunner`](crate::systems::cutscene::CutsceneRunner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutsceneStatus {
    #[default]
    Idle,
    Running,
    Done,
    Cancelled,
}
