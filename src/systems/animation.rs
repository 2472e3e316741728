//! Frame advance for animation clips.
//!
//! Playback is time based: `dt` accumulates in the clip and every full frame
//! duration moves the cursor one step, so a large `dt` may cross several
//! frame boundaries in one call. The per-frame callback fires once per
//! boundary crossed.
//!
//! End of clip:
//! - looping clips wrap to the first frame and fire completion on each wrap
//! - one-shot clips stay on the last frame, stop playing and fire completion
//!   once

use crate::components::animation::Animation;

/// Advance `anim` by `dt` seconds. Returns true if the clip completed (or
/// wrapped) during this call.
pub fn advance_animation(anim: &mut Animation, dt: f32) -> bool {
    if !anim.playing || anim.frames.is_empty() || dt <= 0.0 {
        return false;
    }
    let Some(frame_duration) = anim.frame_duration() else {
        return false;
    };

    anim.elapsed += dt;
    let mut completed = false;
    while anim.elapsed >= frame_duration {
        anim.elapsed -= frame_duration;
        if !anim.is_last_frame() {
            anim.cursor += 1;
            anim.fire_frame();
        } else if anim.looping {
            anim.cursor = 0;
            anim.fire_frame();
            anim.fire_complete();
            completed = true;
        } else {
            anim.playing = false;
            anim.elapsed = 0.0;
            anim.fire_complete();
            completed = true;
            break;
        }
    }
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::animation::AnimationConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn playing(config: AnimationConfig) -> Animation {
        let mut anim = Animation::from(config);
        anim.playing = true;
        anim
    }

    #[test]
    fn small_steps_accumulate() {
        let mut anim = playing(AnimationConfig::sequential("walk", 4, 10.0));
        assert!(!advance_animation(&mut anim, 0.05));
        assert_eq!(anim.cursor, 0);
        advance_animation(&mut anim, 0.06);
        assert_eq!(anim.cursor, 1);
    }

    #[test]
    fn large_delta_crosses_several_frames() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let mut anim = playing(
            AnimationConfig::new("run", vec![7, 8, 9, 10], 10.0)
                .on_frame(move |f| s.borrow_mut().push(f)),
        );
        advance_animation(&mut anim, 0.35);
        assert_eq!(*seen.borrow(), vec![8, 9, 10]);
        assert_eq!(anim.frame(), Some(10));
    }

    #[test]
    fn looping_clip_wraps_and_completes_each_cycle() {
        let completions = Rc::new(RefCell::new(0));
        let c = Rc::clone(&completions);
        let mut anim = playing(
            AnimationConfig::sequential("idle", 2, 10.0)
                .looping(true)
                .on_complete(move || *c.borrow_mut() += 1),
        );
        assert!(advance_animation(&mut anim, 0.45));
        // 0 -> 1 -> wrap 0 -> 1 -> wrap 0
        assert_eq!(*completions.borrow(), 2);
        assert_eq!(anim.cursor, 0);
        assert!(anim.playing);
    }

    #[test]
    fn one_shot_clip_clamps_and_stops() {
        let completions = Rc::new(RefCell::new(0));
        let c = Rc::clone(&completions);
        let mut anim = playing(
            AnimationConfig::sequential("door", 3, 10.0).on_complete(move || *c.borrow_mut() += 1),
        );
        assert!(advance_animation(&mut anim, 1.0));
        assert_eq!(anim.cursor, 2);
        assert!(!anim.playing);
        assert!(!advance_animation(&mut anim, 1.0));
        assert_eq!(*completions.borrow(), 1);
    }

    #[test]
    fn panicking_callbacks_do_not_stop_playback() {
        let mut anim = playing(
            AnimationConfig::sequential("spark", 3, 10.0)
                .on_frame(|_| panic!("bad frame hook"))
                .on_complete(|| panic!("bad completion hook")),
        );
        assert!(advance_animation(&mut anim, 0.35));
        assert_eq!(anim.cursor, 2);
        assert!(!anim.playing);
    }

    #[test]
    fn paused_or_rateless_clip_does_not_move() {
        let mut anim = Animation::from(AnimationConfig::sequential("still", 3, 10.0));
        advance_animation(&mut anim, 1.0);
        assert_eq!(anim.cursor, 0);

        let mut zero = playing(AnimationConfig::sequential("zero", 3, 0.0));
        assert!(!advance_animation(&mut zero, 1.0));
        assert_eq!(zero.cursor, 0);
    }
}
