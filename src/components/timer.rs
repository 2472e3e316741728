//! Timer records owned by a [`TimerService`](crate::systems::timers::TimerService).
//!
//! A record counts down `duration_ms` from `started_at`. Stopping the clock
//! folds the time already spent into `duration_ms`, so after a restart the
//! countdown continues from the frozen remainder.
//!
//! Two independent holds can stop a record: `active == false` is a pause
//! requested through its handle, `suspended` is set while the owning scene
//! is inactive. The countdown only runs when neither is in effect.

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnMut()>;

pub struct TimerRecord {
    /// Milliseconds left as of `started_at`.
    pub duration_ms: f64,
    /// Repeat period for intervals, `None` for one-shot timeouts.
    pub period_ms: Option<f64>,
    pub active: bool,
    pub suspended: bool,
    /// Clock reading of the last start, resume or repeat.
    pub started_at: f64,
    pub(crate) callback: Option<TimerCallback>,
}

impl TimerRecord {
    pub fn new(duration_ms: f64, period_ms: Option<f64>, now_ms: f64, callback: TimerCallback) -> Self {
        Self {
            duration_ms: duration_ms.max(0.0),
            period_ms: period_ms.map(|p| p.max(0.0)),
            active: true,
            suspended: false,
            started_at: now_ms,
            callback: Some(callback),
        }
    }

    /// Counting down right now.
    pub fn is_running(&self) -> bool {
        self.active && !self.suspended
    }

    /// Milliseconds left at `now_ms`. Frozen while held.
    pub fn remaining_at(&self, now_ms: f64) -> f64 {
        if self.is_running() {
            (self.duration_ms - (now_ms - self.started_at)).max(0.0)
        } else {
            self.duration_ms
        }
    }

    pub fn is_due(&self, now_ms: f64) -> bool {
        self.is_running() && now_ms - self.started_at >= self.duration_ms
    }

    fn freeze(&mut self, now_ms: f64) {
        if self.is_running() {
            self.duration_ms = self.remaining_at(now_ms);
        }
    }

    fn thaw(&mut self, now_ms: f64) {
        if self.is_running() {
            self.started_at = now_ms;
        }
    }

    pub fn pause(&mut self, now_ms: f64) {
        self.freeze(now_ms);
        self.active = false;
    }

    pub fn resume(&mut self, now_ms: f64) {
        if !self.active {
            self.active = true;
            self.thaw(now_ms);
        }
    }

    pub fn suspend(&mut self, now_ms: f64) {
        self.freeze(now_ms);
        self.suspended = true;
    }

    pub fn unsuspend(&mut self, now_ms: f64) {
        if self.suspended {
            self.suspended = false;
            self.thaw(now_ms);
        }
    }

    pub fn is_interval(&self) -> bool {
        self.period_ms.is_some()
    }
}
