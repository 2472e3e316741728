//! Frame time update.
//!
//! Turns successive clock readings into the per-frame delta used by the
//! update loop, capped so a stalled host (backgrounded tab, debugger pause)
//! does not produce one huge step.

use crate::resources::worldtime::WorldTime;

/// Advance `wt` to `now_ms` and return the scaled, capped delta in seconds.
///
/// The first call after construction yields a zero delta.
pub fn update_world_time(wt: &mut WorldTime, now_ms: f64, max_delta: f32) -> f32 {
    let raw = match wt.last_frame_ms {
        Some(prev) => ((now_ms - prev) / 1000.0).max(0.0) as f32,
        None => 0.0,
    };
    wt.last_frame_ms = Some(now_ms);
    let scaled_dt = raw.min(max_delta) * wt.time_scale;
    wt.elapsed += scaled_dt;
    wt.delta = scaled_dt;
    wt.frame_count += 1;
    scaled_dt
}
