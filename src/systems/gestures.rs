//! Gesture recognition over normalized pointer events.
//!
//! Each pointer is tracked from `pointerdown` to `pointerup` (or cancel):
//! - swipe: on release, travel from the start point is at least
//!   `swipe_threshold`; direction is the dominant axis
//! - long-press: held for `long_press_ms` without travelling more than
//!   `move_threshold`; detected by [`GestureRecognizer::update`] while held,
//!   or at release if no update ran in between
//! - tap: released without moving and before the long-press delay
//! - double-tap: a tap whose release is within `double_tap_ms` and
//!   `double_tap_distance` of the previous tap's release
//!
//! Distances are in canvas device pixels.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::events::input::{Gesture, InputEvent, SwipeDirection};
use crate::resources::gameconfig::InputConfig;

#[derive(Debug, Clone, Copy)]
struct PointerTrack {
    start_x: f32,
    start_y: f32,
    x: f32,
    y: f32,
    started_at: f64,
    moved: bool,
    long_pressed: bool,
}

impl PointerTrack {
    fn travel(&self) -> f32 {
        (self.x - self.start_x).hypot(self.y - self.start_y)
    }
}

#[derive(Debug, Clone, Copy)]
struct TapRecord {
    x: f32,
    y: f32,
    at: f64,
}

pub type Gestures = SmallVec<[Gesture; 2]>;

#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    config: InputConfig,
    tracks: FxHashMap<u32, PointerTrack>,
    last_tap: Option<TapRecord>,
}

impl GestureRecognizer {
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            tracks: FxHashMap::default(),
            last_tap: None,
        }
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn pointer_down(&mut self, ev: &InputEvent) {
        let Some(id) = ev.pointer_id else { return };
        self.tracks.insert(
            id,
            PointerTrack {
                start_x: ev.x,
                start_y: ev.y,
                x: ev.x,
                y: ev.y,
                started_at: ev.timestamp_ms,
                moved: false,
                long_pressed: false,
            },
        );
    }

    pub fn pointer_move(&mut self, ev: &InputEvent) {
        let Some(track) = ev.pointer_id.and_then(|id| self.tracks.get_mut(&id)) else {
            return;
        };
        track.x = ev.x;
        track.y = ev.y;
        if track.travel() > self.config.move_threshold {
            track.moved = true;
        }
    }

    /// Finish the pointer's gesture.
    pub fn pointer_up(&mut self, ev: &InputEvent) -> Gestures {
        let mut out = Gestures::new();
        let Some(id) = ev.pointer_id else { return out };
        let Some(mut track) = self.tracks.remove(&id) else {
            return out;
        };
        track.x = ev.x;
        track.y = ev.y;
        let distance = track.travel();
        let duration_ms = (ev.timestamp_ms - track.started_at).max(0.0);

        if distance >= self.config.swipe_threshold {
            out.push(Gesture::Swipe {
                pointer_id: id,
                direction: SwipeDirection::from_delta(
                    track.x - track.start_x,
                    track.y - track.start_y,
                ),
                start_x: track.start_x,
                start_y: track.start_y,
                end_x: track.x,
                end_y: track.y,
                distance,
                duration_ms,
            });
            return out;
        }
        if track.moved || distance > self.config.move_threshold || track.long_pressed {
            return out;
        }
        if duration_ms >= self.config.long_press_ms {
            out.push(Gesture::LongPress {
                pointer_id: id,
                x: track.start_x,
                y: track.start_y,
                duration_ms,
            });
            return out;
        }

        out.push(Gesture::Tap {
            pointer_id: id,
            x: ev.x,
            y: ev.y,
        });
        let tap = TapRecord {
            x: ev.x,
            y: ev.y,
            at: ev.timestamp_ms,
        };
        match self.last_tap.take() {
            Some(prev)
                if tap.at - prev.at <= self.config.double_tap_ms
                    && (tap.x - prev.x).hypot(tap.y - prev.y)
                        <= self.config.double_tap_distance =>
            {
                out.push(Gesture::DoubleTap {
                    pointer_id: id,
                    x: ev.x,
                    y: ev.y,
                });
            }
            _ => self.last_tap = Some(tap),
        }
        out
    }

    /// Forget a pointer without producing a gesture.
    pub fn pointer_cancel(&mut self, pointer_id: u32) {
        self.tracks.remove(&pointer_id);
    }

    /// Long-presses that matured since the last call, in pointer id order.
    pub fn update(&mut self, now_ms: f64) -> Gestures {
        let mut out = Gestures::new();
        for (&id, track) in self.tracks.iter_mut() {
            if track.long_pressed || track.moved {
                continue;
            }
            let held = now_ms - track.started_at;
            if held >= self.config.long_press_ms {
                track.long_pressed = true;
                out.push(Gesture::LongPress {
                    pointer_id: id,
                    x: track.start_x,
                    y: track.start_y,
                    duration_ms: held,
                });
            }
        }
        out.sort_by_key(|g| match g {
            Gesture::LongPress { pointer_id, .. } => *pointer_id,
            _ => 0,
        });
        out
    }

    pub fn is_tracking(&self, pointer_id: u32) -> bool {
        self.tracks.contains_key(&pointer_id)
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
        self.last_tap = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::input::{GestureKind, InputEventKind, PointerKind};

    fn ev(kind: InputEventKind, x: f32, y: f32, t: f64) -> InputEvent {
        InputEvent::pointer(kind, 1, PointerKind::Touch, x, y, t)
    }

    fn kinds(g: &Gestures) -> Vec<GestureKind> {
        g.iter().map(Gesture::kind).collect()
    }

    #[test]
    fn swipe_uses_dominant_axis() {
        let mut rec = GestureRecognizer::new(InputConfig::default());
        rec.pointer_down(&ev(InputEventKind::PointerDown, 100.0, 100.0, 0.0));
        rec.pointer_move(&ev(InputEventKind::PointerMove, 60.0, 110.0, 50.0));
        let out = rec.pointer_up(&ev(InputEventKind::PointerUp, 30.0, 120.0, 100.0));
        match out.as_slice() {
            [Gesture::Swipe { direction, distance, .. }] => {
                assert_eq!(*direction, SwipeDirection::Left);
                assert!(*distance > 70.0);
            }
            other => panic!("expected a swipe, got {other:?}"),
        }
    }

    #[test]
    fn short_drag_is_neither_swipe_nor_tap() {
        let mut rec = GestureRecognizer::new(InputConfig::default());
        rec.pointer_down(&ev(InputEventKind::PointerDown, 0.0, 0.0, 0.0));
        rec.pointer_move(&ev(InputEventKind::PointerMove, 30.0, 0.0, 10.0));
        let out = rec.pointer_up(&ev(InputEventKind::PointerUp, 30.0, 0.0, 20.0));
        assert!(out.is_empty());
    }

    #[test]
    fn long_press_detected_while_held() {
        let mut rec = GestureRecognizer::new(InputConfig::default());
        rec.pointer_down(&ev(InputEventKind::PointerDown, 5.0, 5.0, 0.0));
        assert!(rec.update(499.0).is_empty());
        assert_eq!(kinds(&rec.update(500.0)), vec![GestureKind::LongPress]);
        assert!(rec.update(900.0).is_empty());
        // Release after a long press is not a tap.
        assert!(rec.pointer_up(&ev(InputEventKind::PointerUp, 5.0, 5.0, 950.0)).is_empty());
    }

    #[test]
    fn long_press_suppressed_by_movement() {
        let mut rec = GestureRecognizer::new(InputConfig::default());
        rec.pointer_down(&ev(InputEventKind::PointerDown, 0.0, 0.0, 0.0));
        rec.pointer_move(&ev(InputEventKind::PointerMove, 0.0, 15.0, 100.0));
        assert!(rec.update(800.0).is_empty());
    }

    #[test]
    fn long_press_recognized_at_release_without_update() {
        let mut rec = GestureRecognizer::new(InputConfig::default());
        rec.pointer_down(&ev(InputEventKind::PointerDown, 0.0, 0.0, 0.0));
        let out = rec.pointer_up(&ev(InputEventKind::PointerUp, 1.0, 1.0, 700.0));
        assert_eq!(kinds(&out), vec![GestureKind::LongPress]);
    }

    #[test]
    fn double_tap_within_windows() {
        let mut rec = GestureRecognizer::new(InputConfig::default());
        rec.pointer_down(&ev(InputEventKind::PointerDown, 10.0, 10.0, 0.0));
        let first = rec.pointer_up(&ev(InputEventKind::PointerUp, 10.0, 10.0, 50.0));
        assert_eq!(kinds(&first), vec![GestureKind::Tap]);
        rec.pointer_down(&ev(InputEventKind::PointerDown, 20.0, 15.0, 200.0));
        let second = rec.pointer_up(&ev(InputEventKind::PointerUp, 20.0, 15.0, 250.0));
        assert_eq!(kinds(&second), vec![GestureKind::Tap, GestureKind::DoubleTap]);

        // A third tap starts a new pair.
        rec.pointer_down(&ev(InputEventKind::PointerDown, 20.0, 15.0, 300.0));
        let third = rec.pointer_up(&ev(InputEventKind::PointerUp, 20.0, 15.0, 320.0));
        assert_eq!(kinds(&third), vec![GestureKind::Tap]);
    }

    #[test]
    fn taps_too_far_apart_are_not_a_double_tap() {
        let mut rec = GestureRecognizer::new(InputConfig::default());
        rec.pointer_down(&ev(InputEventKind::PointerDown, 0.0, 0.0, 0.0));
        rec.pointer_up(&ev(InputEventKind::PointerUp, 0.0, 0.0, 10.0));
        rec.pointer_down(&ev(InputEventKind::PointerDown, 100.0, 0.0, 50.0));
        let out = rec.pointer_up(&ev(InputEventKind::PointerUp, 100.0, 0.0, 60.0));
        assert_eq!(kinds(&out), vec![GestureKind::Tap]);

        rec.pointer_down(&ev(InputEventKind::PointerDown, 100.0, 0.0, 1000.0));
        let late = rec.pointer_up(&ev(InputEventKind::PointerUp, 100.0, 0.0, 1010.0));
        assert_eq!(kinds(&late), vec![GestureKind::Tap]);
    }

    #[test]
    fn cancel_drops_tracking() {
        let mut rec = GestureRecognizer::new(InputConfig::default());
        rec.pointer_down(&ev(InputEventKind::PointerDown, 0.0, 0.0, 0.0));
        assert!(rec.is_tracking(1));
        rec.pointer_cancel(1);
        assert!(rec.update(10_000.0).is_empty());
        assert!(rec.pointer_up(&ev(InputEventKind::PointerUp, 0.0, 0.0, 10.0)).is_empty());
    }
}
