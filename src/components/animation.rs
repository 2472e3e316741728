//! Frame-sequenced animation clips.
//!
//! An [`Animation`] is a named list of frame indices (into a sprite sheet or
//! any other frame table) played back at a fixed rate. Clips are owned by
//! the [`AnimationManager`](crate::resources::animationstore::AnimationManager)
//! and advanced by [`advance_animation`](crate::systems::animation::advance_animation).

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use log::error;

use crate::events::describe_panic;

/// Called with the new frame value each time a frame boundary is crossed.
pub type FrameCallback = Box<dyn FnMut(usize)>;
/// Called when a clip reaches its end (every wrap for looping clips).
pub type CompleteCallback = Box<dyn FnMut()>;

/// Builder describing a clip before registration.
pub struct AnimationConfig {
    pub name: String,
    pub frames: Vec<usize>,
    /// Frames per second.
    pub frame_rate: f32,
    pub looping: bool,
    pub on_frame: Option<FrameCallback>,
    pub on_complete: Option<CompleteCallback>,
}

impl AnimationConfig {
    pub fn new(name: impl Into<String>, frames: Vec<usize>, frame_rate: f32) -> Self {
        Self {
            name: name.into(),
            frames,
            frame_rate,
            looping: false,
            on_frame: None,
            on_complete: None,
        }
    }

    /// Frames `0..count` in order.
    pub fn sequential(name: impl Into<String>, count: usize, frame_rate: f32) -> Self {
        Self::new(name, (0..count).collect(), frame_rate)
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn on_frame(mut self, callback: impl FnMut(usize) + 'static) -> Self {
        self.on_frame = Some(Box::new(callback));
        self
    }

    pub fn on_complete(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

/// A registered clip and its playback cursor.
pub struct Animation {
    pub name: String,
    pub frames: Vec<usize>,
    pub frame_rate: f32,
    pub looping: bool,
    /// Index into `frames`.
    pub cursor: usize,
    /// Seconds accumulated inside the current frame.
    pub elapsed: f32,
    pub playing: bool,
    pub(crate) on_frame: Option<FrameCallback>,
    pub(crate) on_complete: Option<CompleteCallback>,
}

impl Animation {
    /// The frame value under the cursor. `None` for an empty clip.
    pub fn frame(&self) -> Option<usize> {
        self.frames.get(self.cursor).copied()
    }

    /// Seconds per frame, or `None` when the rate cannot drive playback.
    pub fn frame_duration(&self) -> Option<f32> {
        (self.frame_rate.is_finite() && self.frame_rate > 0.0).then(|| 1.0 / self.frame_rate)
    }

    pub fn is_last_frame(&self) -> bool {
        self.cursor + 1 >= self.frames.len()
    }

    /// Rewind to the first frame.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.elapsed = 0.0;
    }

    pub(crate) fn fire_frame(&mut self) {
        if let (Some(frame), Some(cb)) = (self.frame(), self.on_frame.as_mut()) {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| cb(frame))) {
                error!(
                    "animation '{}' frame callback panicked: {}",
                    self.name,
                    describe_panic(panic.as_ref())
                );
            }
        }
    }

    pub(crate) fn fire_complete(&mut self) {
        if let Some(cb) = self.on_complete.as_mut() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| cb())) {
                error!(
                    "animation '{}' completion callback panicked: {}",
                    self.name,
                    describe_panic(panic.as_ref())
                );
            }
        }
    }
}

impl From<AnimationConfig> for Animation {
    fn from(config: AnimationConfig) -> Self {
        Self {
            name: config.name,
            frames: config.frames,
            frame_rate: config.frame_rate,
            looping: config.looping,
            cursor: 0,
            elapsed: 0.0,
            playing: false,
            on_frame: config.on_frame,
            on_complete: config.on_complete,
        }
    }
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("name", &self.name)
            .field("frames", &self.frames)
            .field("frame_rate", &self.frame_rate)
            .field("looping", &self.looping)
            .field("cursor", &self.cursor)
            .field("elapsed", &self.elapsed)
            .field("playing", &self.playing)
            .finish_non_exhaustive()
    }
}
