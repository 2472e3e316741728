//! Animation registry and playback control.
//!
//! The [`AnimationManager`] owns every clip, keyed by name. Registering a
//! name twice replaces the earlier clip. The engine calls
//! [`AnimationManager::update`] once per frame with the capped delta.
//!
//! Callbacks attached to a clip run inside `update` and must not reach back
//! into the manager; subscribe to `animation:complete` on the event bus for
//! that, it is emitted after all clips have advanced.

use log::{debug, warn};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::components::animation::{Animation, AnimationConfig};
use crate::events::{EventSystem, Payload, topics};
use crate::systems::animation::advance_animation;

pub struct AnimationManager {
    clips: FxHashMap<String, Animation>,
    events: EventSystem,
}

impl AnimationManager {
    pub fn new(events: EventSystem) -> Self {
        Self {
            clips: FxHashMap::default(),
            events,
        }
    }

    /// Register a clip. An existing clip with the same name is replaced.
    pub fn create(&mut self, config: AnimationConfig) {
        if config.frame_duration_invalid() {
            warn!(
                "animation '{}' has frame rate {} and will not advance",
                config.name, config.frame_rate
            );
        }
        let anim = Animation::from(config);
        let name = anim.name.clone();
        if self.clips.insert(name.clone(), anim).is_some() {
            debug!("animation '{}' replaced by newer registration", name);
        }
    }

    /// Start playback, optionally rewinding first. False for unknown names.
    pub fn play(&mut self, name: &str, reset: bool) -> bool {
        let Some(anim) = self.clips.get_mut(name) else {
            return false;
        };
        if reset {
            anim.reset();
        }
        anim.playing = true;
        true
    }

    pub fn pause(&mut self, name: &str) -> bool {
        match self.clips.get_mut(name) {
            Some(anim) => {
                anim.playing = false;
                true
            }
            None => false,
        }
    }

    /// Pause and rewind.
    pub fn stop(&mut self, name: &str) -> bool {
        match self.clips.get_mut(name) {
            Some(anim) => {
                anim.playing = false;
                anim.reset();
                true
            }
            None => false,
        }
    }

    /// Advance every playing clip by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let mut completed: SmallVec<[(String, usize); 4]> = SmallVec::new();
        for anim in self.clips.values_mut() {
            if advance_animation(anim, dt) {
                completed.push((anim.name.clone(), anim.frame().unwrap_or(0)));
            }
        }
        completed.sort_unstable();
        for (name, frame) in completed {
            self.events
                .emit(topics::ANIMATION_COMPLETE, &Payload::Animation { name, frame });
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.clips.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.clips.clear();
    }

    pub fn get(&self, name: &str) -> Option<&Animation> {
        self.clips.get(name)
    }

    /// Frame value under the clip's cursor.
    pub fn current_frame(&self, name: &str) -> Option<usize> {
        self.clips.get(name).and_then(Animation::frame)
    }

    pub fn is_playing(&self, name: &str) -> bool {
        self.clips.get(name).is_some_and(|a| a.playing)
    }

    /// Registered clip names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clips.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl AnimationConfig {
    fn frame_duration_invalid(&self) -> bool {
        !(self.frame_rate.is_finite() && self.frame_rate > 0.0)
    }
}
