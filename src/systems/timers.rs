//! Pausable timeouts and intervals.
//!
//! A [`TimerService`] keeps its records in a shared table and is driven by
//! [`TimerService::tick`], which the owning scene services call once per
//! frame. Due times are measured against the injected clock from each
//! record's last (re)start, so frame jitter and pause/resume never lose or
//! double-count time.
//!
//! The tick loop is marked suspended whenever the table empties and resumes
//! on the next creation; a suspended service returns from `tick` without
//! reading the clock.
//!
//! Handles are weak: a [`TimerHandle`] for a fired, cancelled or disposed
//! timer turns every operation into a no-op.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use log::{debug, error};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::components::timer::{TimerCallback, TimerRecord};
use crate::events::describe_panic;
use crate::resources::worldtime::SharedClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Default)]
struct TimerTable {
    timers: FxHashMap<TimerId, TimerRecord>,
    next_id: u64,
    running: bool,
}

impl TimerTable {
    fn suspend_if_idle(&mut self) {
        if self.running && self.timers.is_empty() {
            self.running = false;
            debug!("timer loop suspended, no timers registered");
        }
    }
}

/// Owner of a set of timers.
///
/// Clones share the same table.
#[derive(Clone)]
pub struct TimerService {
    table: Rc<RefCell<TimerTable>>,
    clock: SharedClock,
}

impl TimerService {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            table: Rc::new(RefCell::new(TimerTable::default())),
            clock,
        }
    }

    /// Run `callback` once, `ms` milliseconds from now.
    pub fn create_timeout(&self, ms: f64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.insert(ms, None, Box::new(callback))
    }

    /// Run `callback` every `ms` milliseconds until cancelled.
    pub fn create_interval(&self, ms: f64, callback: impl FnMut() + 'static) -> TimerHandle {
        self.insert(ms, Some(ms), Box::new(callback))
    }

    fn insert(&self, ms: f64, period: Option<f64>, callback: TimerCallback) -> TimerHandle {
        let now = self.clock.now_ms();
        let mut table = self.table.borrow_mut();
        table.next_id += 1;
        let id = TimerId(table.next_id);
        table
            .timers
            .insert(id, TimerRecord::new(ms, period, now, callback));
        if !table.running {
            table.running = true;
            debug!("timer loop resumed");
        }
        TimerHandle {
            id,
            table: Rc::downgrade(&self.table),
            clock: Rc::clone(&self.clock),
        }
    }

    /// Fire every due timer. Returns how many fired.
    ///
    /// Callbacks run with the table unlocked, so they may create, pause or
    /// cancel timers (including their own).
    pub fn tick(&self) -> usize {
        if !self.table.borrow().running {
            return 0;
        }
        let now = self.clock.now_ms();
        let mut due: SmallVec<[TimerId; 8]> = self
            .table
            .borrow()
            .timers
            .iter()
            .filter(|(_, rec)| rec.is_due(now))
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();

        let mut fired = 0;
        for id in due {
            let callback = {
                let mut table = self.table.borrow_mut();
                let Some(rec) = table.timers.get_mut(&id) else {
                    continue;
                };
                // An earlier callback of this tick may have paused it.
                if !rec.is_due(now) {
                    continue;
                }
                let period = rec.period_ms;
                match period {
                    Some(period) => {
                        rec.duration_ms = period;
                        rec.started_at = now;
                        rec.callback.take()
                    }
                    None => table.timers.remove(&id).and_then(|mut rec| rec.callback.take()),
                }
            };
            let Some(mut callback) = callback else {
                continue;
            };
            fired += 1;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback())) {
                error!("timer callback panicked: {}", describe_panic(panic.as_ref()));
            }
            // Hand an interval's callback back unless it was cancelled meanwhile.
            if let Some(rec) = self.table.borrow_mut().timers.get_mut(&id) {
                if rec.callback.is_none() {
                    rec.callback = Some(callback);
                }
            }
        }
        self.table.borrow_mut().suspend_if_idle();
        fired
    }

    /// Hold every timer without touching the pause state set through
    /// handles. Undone by [`resume_all`](Self::resume_all).
    pub fn pause_all(&self) {
        let now = self.clock.now_ms();
        for rec in self.table.borrow_mut().timers.values_mut() {
            rec.suspend(now);
        }
    }

    /// Release the hold from [`pause_all`](Self::pause_all). Timers paused
    /// through their handle stay paused.
    pub fn resume_all(&self) {
        let now = self.clock.now_ms();
        for rec in self.table.borrow_mut().timers.values_mut() {
            rec.unsuspend(now);
        }
    }

    pub fn cancel_all(&self) {
        let mut table = self.table.borrow_mut();
        table.timers.clear();
        table.suspend_if_idle();
    }

    pub fn len(&self) -> usize {
        self.table.borrow().timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the tick loop is live (at least one timer since the last
    /// suspension).
    pub fn is_running(&self) -> bool {
        self.table.borrow().running
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

/// Opaque handle to one timer.
#[derive(Clone)]
pub struct TimerHandle {
    id: TimerId,
    table: Weak<RefCell<TimerTable>>,
    clock: SharedClock,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }

    fn with_record<R>(&self, f: impl FnOnce(&mut TimerRecord, f64) -> R) -> Option<R> {
        let table = self.table.upgrade()?;
        let now = self.clock.now_ms();
        let mut table = table.borrow_mut();
        table.timers.get_mut(&self.id).map(|rec| f(rec, now))
    }

    /// Freeze the countdown. False if the timer no longer exists.
    pub fn pause(&self) -> bool {
        self.with_record(|rec, now| rec.pause(now)).is_some()
    }

    /// Restart the countdown from the frozen remainder.
    pub fn resume(&self) -> bool {
        self.with_record(|rec, now| rec.resume(now)).is_some()
    }

    /// Remove the timer permanently.
    pub fn cancel(&self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let mut table = table.borrow_mut();
        let removed = table.timers.remove(&self.id).is_some();
        table.suspend_if_idle();
        removed
    }

    /// Registered, not paused and not held by its scene.
    pub fn is_active(&self) -> bool {
        self.with_record(|rec, _| rec.is_running()).unwrap_or(false)
    }

    pub fn remaining_ms(&self) -> Option<f64> {
        self.with_record(|rec, now| rec.remaining_at(now))
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TimerHandle").field(&self.id.0).finish()
    }
}
