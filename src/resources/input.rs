//! Input state and normalization.
//!
//! The [`InputManager`] turns host [`RawInput`] into the engine's single
//! pointer/key vocabulary, keeps the current pointer, key and touch state
//! for polling, and derives gestures and sequence macros.
//!
//! Raw input arrives two ways:
//! - pushed synchronously with [`InputManager::handle_raw`]
//! - sent from any thread through the channel returned by
//!   [`InputManager::sender`]; [`InputManager::update`] drains it
//!
//! `update` runs once per engine frame. It drains the channel, matures
//! long-presses, re-emits held keys/pointer/touches and hands back the
//! events and gestures gathered since the previous frame so the scene
//! manager can dispatch them to interaction zones.
//!
//! Topics emitted:
//! - `input:pointerdown|pointermove|pointerup|pointercancel` and
//!   `input:keydown|keyup` with [`Payload::Input`]
//! - `input:tap|doubletap|longpress|swipe` with [`Payload::Gesture`]
//! - `input:keyheld` ([`Payload::Text`]), `input:pointerheld` and
//!   `input:touchheld` ([`Payload::Input`]) every frame while held
//! - `input:macro:<name>` with [`Payload::Macro`]

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::events::input::{
    Gesture, InputEvent, InputEventKind, MOUSE_POINTER_ID, PointerKind, RawInput, TouchPoint,
};
use crate::events::{EventSystem, Payload, topics};
use crate::resources::gameconfig::InputConfig;
use crate::resources::screensize::SurfaceBounds;
use crate::resources::worldtime::SharedClock;
use crate::systems::gestures::GestureRecognizer;
use crate::systems::sequence::SequenceMatcher;

/// Last known primary pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub down: bool,
    pub pointer_id: u32,
    pub kind: PointerKind,
}

impl Default for PointerState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            down: false,
            pointer_id: MOUSE_POINTER_ID,
            kind: PointerKind::Mouse,
        }
    }
}

/// Everything that happened since the previous `update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    pub events: Vec<InputEvent>,
    pub gestures: Vec<Gesture>,
}

impl InputFrame {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.gestures.is_empty()
    }
}

pub struct InputManager {
    events: EventSystem,
    clock: SharedClock,
    bounds: SurfaceBounds,
    channel: Option<(Sender<RawInput>, Receiver<RawInput>)>,
    pointer: PointerState,
    keys_down: FxHashSet<String>,
    touches: FxHashMap<u32, (f32, f32)>,
    gestures: GestureRecognizer,
    sequence: SequenceMatcher,
    frame: InputFrame,
}

impl InputManager {
    pub fn new(
        config: &InputConfig,
        bounds: SurfaceBounds,
        events: EventSystem,
        clock: SharedClock,
    ) -> Self {
        Self {
            events,
            clock,
            bounds,
            channel: Some(unbounded()),
            pointer: PointerState::default(),
            keys_down: FxHashSet::default(),
            touches: FxHashMap::default(),
            gestures: GestureRecognizer::new(config.clone()),
            sequence: SequenceMatcher::new(config.sequence_window),
            frame: InputFrame::default(),
        }
    }

    /// Sender for raw host input. `None` once detached.
    pub fn sender(&self) -> Option<Sender<RawInput>> {
        self.channel.as_ref().map(|(tx, _)| tx.clone())
    }

    pub fn is_attached(&self) -> bool {
        self.channel.is_some()
    }

    /// Stop listening: drop the raw-input channel and release everything
    /// held. Input pushed afterwards is ignored.
    pub fn detach(&mut self) {
        if self.channel.take().is_some() {
            info!("input detached");
        }
        self.keys_down.clear();
        self.touches.clear();
        self.pointer.down = false;
        self.gestures.reset();
        self.sequence.reset();
        self.frame = InputFrame::default();
    }

    /// Reopen the raw-input channel after [`detach`](Self::detach).
    pub fn attach(&mut self) {
        if self.channel.is_none() {
            self.channel = Some(unbounded());
        }
    }

    pub fn set_bounds(&mut self, bounds: SurfaceBounds) {
        self.bounds = bounds;
    }

    pub fn bounds(&self) -> SurfaceBounds {
        self.bounds
    }

    /// Per-frame step. See the module docs.
    pub fn update(&mut self) -> InputFrame {
        let queued: Vec<RawInput> = match &self.channel {
            Some((_, rx)) => rx.try_iter().collect(),
            None => Vec::new(),
        };
        for raw in queued {
            self.handle_raw(raw);
        }

        let now = self.clock.now_ms();
        for gesture in self.gestures.update(now) {
            self.gesture(gesture);
        }
        self.emit_held(now);
        std::mem::take(&mut self.frame)
    }

    /// Process one raw host event immediately.
    pub fn handle_raw(&mut self, raw: RawInput) {
        if self.channel.is_none() {
            return;
        }
        let now = self.clock.now_ms();
        match raw {
            RawInput::MouseDown {
                client_x,
                client_y,
                button,
            } => {
                let mut ev = self.pointer_event(
                    InputEventKind::PointerDown,
                    MOUSE_POINTER_ID,
                    PointerKind::Mouse,
                    client_x,
                    client_y,
                    now,
                );
                ev.button = Some(button);
                self.pointer_down(ev);
            }
            RawInput::MouseMove { client_x, client_y } => {
                let ev = self.pointer_event(
                    InputEventKind::PointerMove,
                    MOUSE_POINTER_ID,
                    PointerKind::Mouse,
                    client_x,
                    client_y,
                    now,
                );
                self.pointer_move(ev);
            }
            RawInput::MouseUp {
                client_x,
                client_y,
                button,
            } => {
                let mut ev = self.pointer_event(
                    InputEventKind::PointerUp,
                    MOUSE_POINTER_ID,
                    PointerKind::Mouse,
                    client_x,
                    client_y,
                    now,
                );
                ev.button = Some(button);
                self.pointer_up(ev);
            }
            RawInput::TouchStart { touches } => {
                for ev in self.touch_events(InputEventKind::PointerDown, &touches, now) {
                    self.pointer_down(ev);
                }
            }
            RawInput::TouchMove { touches } => {
                for ev in self.touch_events(InputEventKind::PointerMove, &touches, now) {
                    self.pointer_move(ev);
                }
            }
            RawInput::TouchEnd { touches } => {
                for ev in self.touch_events(InputEventKind::PointerUp, &touches, now) {
                    self.pointer_up(ev);
                }
            }
            RawInput::TouchCancel { touches } => {
                for ev in self.touch_events(InputEventKind::PointerCancel, &touches, now) {
                    self.pointer_cancel(ev);
                }
            }
            RawInput::KeyDown { key, repeat } => {
                // Auto-repeat is covered by `input:keyheld`.
                if repeat || !self.keys_down.insert(key.clone()) {
                    return;
                }
                let ev = InputEvent::key(InputEventKind::KeyDown, key, now);
                self.record(topics::INPUT_KEY_DOWN, ev, true);
            }
            RawInput::KeyUp { key } => {
                if !self.keys_down.remove(&key) {
                    return;
                }
                let ev = InputEvent::key(InputEventKind::KeyUp, key, now);
                self.record(topics::INPUT_KEY_UP, ev, true);
            }
            RawInput::Blur => self.release_all(now),
        }
    }

    fn pointer_event(
        &self,
        kind: InputEventKind,
        id: u32,
        pointer_kind: PointerKind,
        client_x: f32,
        client_y: f32,
        now: f64,
    ) -> InputEvent {
        let (x, y) = self.bounds.to_canvas(client_x, client_y);
        InputEvent::pointer(kind, id, pointer_kind, x, y, now)
    }

    fn touch_events(
        &self,
        kind: InputEventKind,
        touches: &[TouchPoint],
        now: f64,
    ) -> Vec<InputEvent> {
        touches
            .iter()
            .map(|t| self.pointer_event(kind, t.id, PointerKind::Touch, t.client_x, t.client_y, now))
            .collect()
    }

    fn track_pointer(&mut self, ev: &InputEvent, down: bool) {
        let (Some(id), Some(kind)) = (ev.pointer_id, ev.pointer_kind) else {
            return;
        };
        if kind == PointerKind::Touch {
            if down {
                self.touches.insert(id, (ev.x, ev.y));
            } else {
                self.touches.remove(&id);
            }
        }
        self.pointer = PointerState {
            x: ev.x,
            y: ev.y,
            down: down || !self.touches.is_empty(),
            pointer_id: id,
            kind,
        };
    }

    fn pointer_down(&mut self, ev: InputEvent) {
        self.track_pointer(&ev, true);
        self.gestures.pointer_down(&ev);
        self.record(topics::INPUT_POINTER_DOWN, ev, true);
    }

    fn pointer_move(&mut self, ev: InputEvent) {
        let Some(id) = ev.pointer_id else { return };
        if ev.pointer_kind == Some(PointerKind::Touch) {
            if !self.touches.contains_key(&id) {
                return;
            }
            self.touches.insert(id, (ev.x, ev.y));
        }
        let down = if ev.pointer_kind == Some(PointerKind::Mouse) {
            self.gestures.is_tracking(id)
        } else {
            true
        };
        self.track_pointer(&ev, down);
        self.gestures.pointer_move(&ev);
        self.record(topics::INPUT_POINTER_MOVE, ev, false);
    }

    fn pointer_up(&mut self, ev: InputEvent) {
        self.track_pointer(&ev, false);
        let gestures = self.gestures.pointer_up(&ev);
        // A release that finishes a gesture is sequenced as that gesture.
        self.record(topics::INPUT_POINTER_UP, ev, gestures.is_empty());
        for gesture in gestures {
            self.gesture(gesture);
        }
    }

    fn pointer_cancel(&mut self, ev: InputEvent) {
        self.track_pointer(&ev, false);
        if let Some(id) = ev.pointer_id {
            self.gestures.pointer_cancel(id);
        }
        self.record(topics::INPUT_POINTER_CANCEL, ev, true);
    }

    fn release_all(&mut self, now: f64) {
        debug!("input blur, releasing held keys and pointers");
        let mut keys: Vec<String> = self.keys_down.drain().collect();
        keys.sort_unstable();
        for key in keys {
            let ev = InputEvent::key(InputEventKind::KeyUp, key, now);
            self.record(topics::INPUT_KEY_UP, ev, true);
        }
        let mut touches: Vec<(u32, (f32, f32))> = self.touches.drain().collect();
        touches.sort_unstable_by_key(|(id, _)| *id);
        for (id, (x, y)) in touches {
            let ev = InputEvent::pointer(
                InputEventKind::PointerCancel,
                id,
                PointerKind::Touch,
                x,
                y,
                now,
            );
            self.record(topics::INPUT_POINTER_CANCEL, ev, true);
        }
        if self.pointer.down && self.pointer.kind == PointerKind::Mouse {
            let ev = InputEvent::pointer(
                InputEventKind::PointerCancel,
                MOUSE_POINTER_ID,
                PointerKind::Mouse,
                self.pointer.x,
                self.pointer.y,
                now,
            );
            self.record(topics::INPUT_POINTER_CANCEL, ev, true);
        }
        self.pointer.down = false;
        self.gestures.reset();
    }

    /// Emit, buffer for the frame and, unless it is a move, feed the
    /// sequence matcher.
    fn record(&mut self, topic: &str, ev: InputEvent, sequenced: bool) {
        let token = sequenced.then(|| ev.token());
        self.events.emit(topic, &Payload::Input(ev.clone()));
        self.frame.events.push(ev);
        if let Some(token) = token {
            self.sequence_token(token);
        }
    }

    fn gesture(&mut self, gesture: Gesture) {
        let topic = topics::topic("input", gesture.kind().name());
        self.events.emit(&topic, &Payload::Gesture(gesture.clone()));
        let token = gesture.token();
        self.frame.gestures.push(gesture);
        self.sequence_token(token);
    }

    fn sequence_token(&mut self, token: String) {
        if let Some(hit) = self.sequence.push(token) {
            debug!("input macro '{}' matched", hit.name);
            self.events.emit(
                &topics::macro_topic(&hit.name),
                &Payload::Macro {
                    name: hit.name,
                    tokens: hit.tokens,
                },
            );
        }
    }

    fn emit_held(&self, now: f64) {
        let mut keys: Vec<&String> = self.keys_down.iter().collect();
        keys.sort_unstable();
        for key in keys {
            self.events
                .emit(topics::INPUT_KEY_HELD, &Payload::Text(key.clone()));
        }
        if self.pointer.down && self.pointer.kind == PointerKind::Mouse {
            let ev = InputEvent::pointer(
                InputEventKind::PointerDown,
                MOUSE_POINTER_ID,
                PointerKind::Mouse,
                self.pointer.x,
                self.pointer.y,
                now,
            );
            self.events
                .emit(topics::INPUT_POINTER_HELD, &Payload::Input(ev));
        }
        let mut touches: Vec<(&u32, &(f32, f32))> = self.touches.iter().collect();
        touches.sort_unstable_by_key(|(id, _)| **id);
        for (&id, &(x, y)) in touches {
            let ev = InputEvent::pointer(
                InputEventKind::PointerDown,
                id,
                PointerKind::Touch,
                x,
                y,
                now,
            );
            self.events
                .emit(topics::INPUT_TOUCH_HELD, &Payload::Input(ev));
        }
    }

    /// Register a named token sequence, e.g. `["pointerdown", "longpress",
    /// "swipe"]`. Fires `input:macro:<name>` when matched.
    pub fn register_macro(&mut self, name: impl Into<String>, tokens: &[&str]) -> bool {
        self.sequence
            .register(name, tokens.iter().map(|t| t.to_string()).collect())
    }

    pub fn remove_macro(&mut self, name: &str) -> bool {
        self.sequence.remove(name)
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn is_pointer_down(&self) -> bool {
        self.pointer.down
    }

    pub fn is_key_down(&self, key: &str) -> bool {
        self.keys_down.contains(key)
    }

    /// Keys currently held, sorted.
    pub fn keys_down(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.keys_down.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Active touch points as `(id, x, y)`, sorted by id.
    pub fn touches(&self) -> Vec<(u32, f32, f32)> {
        let mut touches: Vec<(u32, f32, f32)> =
            self.touches.iter().map(|(&id, &(x, y))| (id, x, y)).collect();
        touches.sort_unstable_by_key(|t| t.0);
        touches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::input::GestureKind;
    use crate::resources::worldtime::ManualClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Rig {
        input: InputManager,
        clock: ManualClock,
        events: EventSystem,
    }

    fn rig() -> Rig {
        let events = EventSystem::new();
        let clock = ManualClock::new();
        let input = InputManager::new(
            &InputConfig::default(),
            SurfaceBounds::new(400, 300, 2.0),
            events.clone(),
            Rc::new(clock.clone()),
        );
        Rig {
            input,
            clock,
            events,
        }
    }

    fn collect(events: &EventSystem, topic: &str) -> Rc<RefCell<Vec<Payload>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        events.on(topic, move |p| s.borrow_mut().push(p.clone()));
        seen
    }

    #[test]
    fn mouse_coordinates_are_scaled_to_device_pixels() {
        let mut rig = rig();
        rig.input.handle_raw(RawInput::MouseDown {
            client_x: 10.0,
            client_y: 20.0,
            button: 0,
        });
        let p = rig.input.pointer();
        assert_eq!((p.x, p.y), (20.0, 40.0));
        assert!(rig.input.is_pointer_down());
        rig.input.handle_raw(RawInput::MouseUp {
            client_x: 10.0,
            client_y: 20.0,
            button: 0,
        });
        assert!(!rig.input.is_pointer_down());
    }

    #[test]
    fn channel_input_is_drained_by_update() {
        let mut rig = rig();
        let tx = rig.input.sender().unwrap();
        let std_thread = std::thread::spawn(move || {
            tx.send(RawInput::KeyDown {
                key: "Space".into(),
                repeat: false,
            })
            .unwrap();
        });
        std_thread.join().unwrap();
        let frame = rig.input.update();
        assert_eq!(frame.events.len(), 1);
        assert!(rig.input.is_key_down("Space"));
        assert!(rig.input.update().is_empty());
    }

    #[test]
    fn held_keys_are_reemitted_each_update() {
        let mut rig = rig();
        let held = collect(&rig.events, topics::INPUT_KEY_HELD);
        rig.input.handle_raw(RawInput::KeyDown {
            key: "a".into(),
            repeat: false,
        });
        rig.input.handle_raw(RawInput::KeyDown {
            key: "a".into(),
            repeat: true,
        });
        rig.input.update();
        rig.input.update();
        assert_eq!(held.borrow().len(), 2);
        rig.input.handle_raw(RawInput::KeyUp { key: "a".into() });
        rig.input.update();
        assert_eq!(held.borrow().len(), 2);
        assert!(rig.input.keys_down().is_empty());
    }

    #[test]
    fn multi_touch_is_tracked_per_id() {
        let mut rig = rig();
        let touch_held = collect(&rig.events, topics::INPUT_TOUCH_HELD);
        rig.input.handle_raw(RawInput::TouchStart {
            touches: vec![TouchPoint::new(1, 0.0, 0.0), TouchPoint::new(2, 50.0, 50.0)],
        });
        assert_eq!(rig.input.touches().len(), 2);
        rig.input.update();
        assert_eq!(touch_held.borrow().len(), 2);
        rig.input.handle_raw(RawInput::TouchEnd {
            touches: vec![TouchPoint::new(1, 0.0, 0.0)],
        });
        assert_eq!(rig.input.touches(), vec![(2, 100.0, 100.0)]);
        assert!(rig.input.is_pointer_down());
        rig.input.handle_raw(RawInput::TouchCancel {
            touches: vec![TouchPoint::new(2, 50.0, 50.0)],
        });
        assert!(!rig.input.is_pointer_down());
    }

    #[test]
    fn long_press_matures_during_update() {
        let mut rig = rig();
        let presses = collect(&rig.events, topics::INPUT_LONG_PRESS);
        rig.input.handle_raw(RawInput::TouchStart {
            touches: vec![TouchPoint::new(7, 10.0, 10.0)],
        });
        rig.clock.advance(600.0);
        let frame = rig.input.update();
        assert_eq!(frame.gestures.len(), 1);
        assert_eq!(frame.gestures[0].kind(), GestureKind::LongPress);
        assert_eq!(presses.borrow().len(), 1);
    }

    #[test]
    fn macro_fires_on_hold_then_swipe() {
        let mut rig = rig();
        let hits = collect(&rig.events, &topics::macro_topic("hold_drag"));
        rig.input
            .register_macro("hold_drag", &["pointerdown", "longpress", "swipe"]);
        rig.input.handle_raw(RawInput::MouseDown {
            client_x: 100.0,
            client_y: 100.0,
            button: 0,
        });
        rig.clock.advance(600.0);
        rig.input.update();
        rig.input.handle_raw(RawInput::MouseMove {
            client_x: 150.0,
            client_y: 100.0,
        });
        rig.input.handle_raw(RawInput::MouseUp {
            client_x: 200.0,
            client_y: 100.0,
            button: 0,
        });
        assert_eq!(hits.borrow().len(), 1);
        assert_eq!(
            *hits.borrow(),
            vec![Payload::Macro {
                name: "hold_drag".into(),
                tokens: vec!["pointerdown".into(), "longpress".into(), "swipe".into()],
            }]
        );
    }

    #[test]
    fn plain_release_is_still_sequenced() {
        let mut rig = rig();
        let hits = collect(&rig.events, &topics::macro_topic("hold_release"));
        rig.input
            .register_macro("hold_release", &["longpress", "pointerup"]);
        rig.input.handle_raw(RawInput::MouseDown {
            client_x: 100.0,
            client_y: 100.0,
            button: 0,
        });
        rig.clock.advance(600.0);
        rig.input.update();
        // Released in place after the long-press already fired: no gesture.
        rig.input.handle_raw(RawInput::MouseUp {
            client_x: 100.0,
            client_y: 100.0,
            button: 0,
        });
        assert_eq!(hits.borrow().len(), 1);
    }

    #[test]
    fn blur_releases_everything() {
        let mut rig = rig();
        let ups = collect(&rig.events, topics::INPUT_KEY_UP);
        rig.input.handle_raw(RawInput::KeyDown {
            key: "Shift".into(),
            repeat: false,
        });
        rig.input.handle_raw(RawInput::MouseDown {
            client_x: 1.0,
            client_y: 1.0,
            button: 0,
        });
        rig.input.handle_raw(RawInput::Blur);
        assert_eq!(ups.borrow().len(), 1);
        assert!(!rig.input.is_pointer_down());
        assert!(rig.input.keys_down().is_empty());
    }

    #[test]
    fn detach_ignores_further_input() {
        let mut rig = rig();
        rig.input.handle_raw(RawInput::KeyDown {
            key: "x".into(),
            repeat: false,
        });
        rig.input.detach();
        assert!(rig.input.sender().is_none());
        assert!(!rig.input.is_key_down("x"));
        rig.input.handle_raw(RawInput::KeyDown {
            key: "y".into(),
            repeat: false,
        });
        assert!(!rig.input.is_key_down("y"));
        rig.input.attach();
        assert!(rig.input.sender().is_some());
    }
}
