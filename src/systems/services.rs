//! Per-scene service bundle.
//!
//! Each registered scene gets its own [`SceneServices`]: a timer service, a
//! cutscene runner wired to those timers, and a blackboard. The scene
//! manager pauses the timers when the scene exits, resumes them when it
//! enters again, and disposes the whole bundle when the manager is
//! destroyed.

use crate::events::EventSystem;
use crate::resources::blackboard::Blackboard;
use crate::resources::worldtime::SharedClock;
use crate::systems::cutscene::CutsceneRunner;
use crate::systems::timers::TimerService;

pub struct SceneServices {
    pub timers: TimerService,
    pub cutscene: CutsceneRunner,
    pub blackboard: Blackboard,
}

impl SceneServices {
    pub fn new(events: EventSystem, clock: SharedClock) -> Self {
        let timers = TimerService::new(clock);
        let cutscene = CutsceneRunner::new(events, timers.clone());
        Self {
            timers,
            cutscene,
            blackboard: Blackboard::new(),
        }
    }

    /// Fire due timers, then drive the cutscene so waits released by those
    /// timers resume in the same frame.
    pub fn tick(&mut self, dt: f32) {
        self.timers.tick();
        self.cutscene.update(dt);
    }

    /// Freeze timers while the owning scene is inactive.
    pub fn suspend(&mut self) {
        self.timers.pause_all();
    }

    /// Undo [`suspend`](Self::suspend). Timers paused through a handle stay paused.
    pub fn resume(&mut self) {
        self.timers.resume_all();
    }

    /// Cancel the cutscene and every timer, and empty the blackboard.
    pub fn dispose(&mut self) {
        self.cutscene.cancel();
        self.timers.cancel_all();
        self.blackboard.clear();
    }
}
