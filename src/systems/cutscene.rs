//! Sequential cutscene scripts.
//!
//! A [`CutsceneRunner`] executes one step list at a time, strictly in order.
//! `Say` and `Effect` steps complete immediately; `Wait` and `Animate` steps
//! suspend the script until a later [`CutsceneRunner::update`]:
//! - `Wait(Duration)` arms a timeout on the scene's [`TimerService`]
//! - `Wait(Event)` subscribes once to the topic and resumes on its next
//!   emission
//! - `Animate` is called every update with the seconds since the step began
//!   until it returns true
//!
//! [`CutsceneRunner::cancel`] stops the script at the step boundary, cancels
//! a pending timer and disposes a pending event subscription.
//!
//! Emits `cutscene:start`, `cutscene:say`, `cutscene:done` and
//! `cutscene:cancelled`.

use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use log::{debug, error, warn};

use crate::components::cutscene::{AnimateFn, CutsceneStatus, CutsceneStep, WaitFor};
use crate::error::CutsceneError;
use crate::events::{EventSystem, Payload, Subscription, describe_panic, topics};
use crate::systems::timers::{TimerHandle, TimerService};

type FinishFn = Box<dyn FnOnce(CutsceneStatus)>;

/// What the current step is blocked on.
enum Pending {
    Timer {
        handle: TimerHandle,
        fired: Rc<Cell<bool>>,
    },
    Event {
        subscription: Subscription,
        fired: Rc<Cell<bool>>,
    },
    Animate {
        callback: AnimateFn,
        elapsed: f32,
    },
}

impl Pending {
    fn dispose(self) {
        match self {
            Pending::Timer { handle, .. } => {
                handle.cancel();
            }
            Pending::Event { subscription, .. } => {
                subscription.unsubscribe();
            }
            Pending::Animate { .. } => {}
        }
    }
}

pub struct CutsceneRunner {
    events: EventSystem,
    timers: TimerService,
    steps: VecDeque<CutsceneStep>,
    pending: Option<Pending>,
    status: CutsceneStatus,
    on_finish: Vec<FinishFn>,
}

impl CutsceneRunner {
    pub fn new(events: EventSystem, timers: TimerService) -> Self {
        Self {
            events,
            timers,
            steps: VecDeque::new(),
            pending: None,
            status: CutsceneStatus::Idle,
            on_finish: Vec::new(),
        }
    }

    /// Start a script. Steps that need no waiting run immediately.
    ///
    /// Fails if a script is already running; cancel it first.
    pub fn run(&mut self, steps: Vec<CutsceneStep>) -> Result<(), CutsceneError> {
        if self.status == CutsceneStatus::Running {
            return Err(CutsceneError::AlreadyRunning);
        }
        debug!("cutscene started with {} steps", steps.len());
        self.steps = steps.into();
        self.status = CutsceneStatus::Running;
        self.events.emit(topics::CUTSCENE_START, &Payload::Empty);
        self.advance(0.0);
        Ok(())
    }

    /// Drive the script by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if self.status == CutsceneStatus::Running {
            self.advance(dt);
        }
    }

    /// Stop the running script. Returns false when nothing was running.
    pub fn cancel(&mut self) -> bool {
        if self.status != CutsceneStatus::Running {
            return false;
        }
        if let Some(pending) = self.pending.take() {
            pending.dispose();
        }
        let dropped = self.steps.len();
        self.steps.clear();
        debug!("cutscene cancelled with {} steps left", dropped);
        self.finish(CutsceneStatus::Cancelled);
        true
    }

    pub fn status(&self) -> CutsceneStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == CutsceneStatus::Running
    }

    /// Steps not yet started.
    pub fn remaining_steps(&self) -> usize {
        self.steps.len()
    }

    /// Call `callback` when the current (or next) run ends, with its final
    /// status.
    pub fn on_finish(&mut self, callback: impl FnOnce(CutsceneStatus) + 'static) {
        self.on_finish.push(Box::new(callback));
    }

    fn advance(&mut self, mut dt: f32) {
        loop {
            match self.pending.as_mut() {
                Some(Pending::Timer { fired, .. }) | Some(Pending::Event { fired, .. }) => {
                    if !fired.get() {
                        return;
                    }
                    // The timeout is gone and the once-listener removed itself.
                    self.pending = None;
                }
                Some(Pending::Animate { callback, elapsed }) => {
                    *elapsed += dt;
                    dt = 0.0;
                    let elapsed = *elapsed;
                    match catch_unwind(AssertUnwindSafe(|| callback(elapsed))) {
                        Ok(false) => return,
                        Ok(true) => {}
                        Err(panic) => error!(
                            "cutscene animate step panicked: {}",
                            describe_panic(panic.as_ref())
                        ),
                    }
                    self.pending = None;
                }
                None => {}
            }

            let Some(step) = self.steps.pop_front() else {
                self.finish(CutsceneStatus::Done);
                return;
            };
            match step {
                CutsceneStep::Say { speaker, text } => {
                    self.events
                        .emit(topics::CUTSCENE_SAY, &Payload::Say { speaker, text });
                }
                CutsceneStep::Wait(WaitFor::Duration(ms)) => {
                    let fired = Rc::new(Cell::new(false));
                    let f = Rc::clone(&fired);
                    let handle = self.timers.create_timeout(ms, move || f.set(true));
                    self.pending = Some(Pending::Timer { handle, fired });
                    return;
                }
                CutsceneStep::Wait(WaitFor::Event(topic)) => {
                    let fired = Rc::new(Cell::new(false));
                    let f = Rc::clone(&fired);
                    let subscription = self.events.once(&topic, move |_| f.set(true));
                    self.pending = Some(Pending::Event {
                        subscription,
                        fired,
                    });
                    return;
                }
                CutsceneStep::Effect(mut effect) => {
                    let events = &self.events;
                    match catch_unwind(AssertUnwindSafe(|| effect(events))) {
                        Ok(Ok(())) => {}
                        Ok(Err(reason)) => warn!("cutscene effect failed: {}", reason),
                        Err(panic) => error!(
                            "cutscene effect panicked: {}",
                            describe_panic(panic.as_ref())
                        ),
                    }
                }
                CutsceneStep::Animate(callback) => {
                    self.pending = Some(Pending::Animate {
                        callback,
                        elapsed: 0.0,
                    });
                    return;
                }
            }
        }
    }

    fn finish(&mut self, status: CutsceneStatus) {
        self.status = status;
        let topic = match status {
            CutsceneStatus::Cancelled => topics::CUTSCENE_CANCELLED,
            _ => topics::CUTSCENE_DONE,
        };
        self.events.emit(topic, &Payload::Empty);
        for callback in std::mem::take(&mut self.on_finish) {
            callback(status);
        }
    }
}
