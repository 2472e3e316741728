//! Time sources and per-frame time bookkeeping.
//!
//! Everything time-based in the engine (timers, gestures, cutscene waits)
//! reads milliseconds from a shared [`Clock`]. Hosts use [`SystemClock`];
//! tests and headless runs drive a [`ManualClock`] by hand.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Milliseconds since construction, from `std::time::Instant`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Shared clock handle passed to services.
pub type SharedClock = Rc<dyn Clock>;

/// Frame timing as seen by the update loop.
#[derive(Debug, Clone, Copy)]
pub struct WorldTime {
    /// Seconds of scaled time since the loop started.
    pub elapsed: f32,
    /// Scaled, capped delta of the last frame in seconds.
    pub delta: f32,
    pub time_scale: f32,
    pub frame_count: u64,
    /// Clock reading of the previous frame, `None` before the first one.
    pub last_frame_ms: Option<f64>,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime {
            elapsed: 0.0,
            delta: 0.0,
            time_scale: 1.0,
            frame_count: 0,
            last_frame_ms: None,
        }
    }
}

impl WorldTime {
    pub fn with_time_scale(mut self, scale: f32) -> Self {
        self.time_scale = scale;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(250.0);
        assert_eq!(other.now_ms(), 250.0);
        other.set(1000.0);
        assert_eq!(clock.now_ms(), 1000.0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
