use std::collections::HashSet;

use flecs_ecs::macros::Component;
pub use winit::keyboard::KeyCode;

#[derive(Component, Default, Debug)]
pub struct Input {
    pressed: HashSet<KeyCode>,
    just_pressed: HashSet<KeyCode>,
    mouse_buttons_held: u32,
    // per-frame mouse delta
    pub mouse_delta: (f32, f32),
}

impl Input {
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// True only on the frame the key went down.
    pub fn just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn press(&mut self, key: KeyCode) {
        if self.pressed.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    pub fn mouse_button(&mut self, down: bool) {
        if down {
            self.mouse_buttons_held += 1;
        } else {
            self.mouse_buttons_held = self.mouse_buttons_held.saturating_sub(1);
        }
    }

    pub fn is_mouse_held(&self) -> bool {
        self.mouse_buttons_held > 0
    }

    pub fn accumulate_mouse(&mut self, dx: f32, dy: f32) {
        self.mouse_delta.0 += dx;
        self.mouse_delta.1 += dy;
    }

    /// Focus lost: forget everything so keys don't get stuck.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.just_pressed.clear();
        self.mouse_buttons_held = 0;
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.mouse_delta = (0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn just_pressed_lasts_one_frame() {
        let mut input = Input::default();
        input.press(KeyCode::KeyW);
        assert!(input.is_pressed(KeyCode::KeyW));
        assert!(input.just_pressed(KeyCode::KeyW));

        input.end_frame();
        assert!(input.is_pressed(KeyCode::KeyW));
        assert!(!input.just_pressed(KeyCode::KeyW));

        // key repeat must not re-trigger
        input.press(KeyCode::KeyW);
        assert!(!input.just_pressed(KeyCode::KeyW));
    }

    #[test]
    fn reset_clears_held_state() {
        let mut input = Input::default();
        input.press(KeyCode::ShiftLeft);
        input.mouse_button(true);
        input.accumulate_mouse(3.0, -2.0);

        input.reset();
        assert!(!input.is_pressed(KeyCode::ShiftLeft));
        assert!(!input.is_mouse_held());
        assert_eq!(input.mouse_delta, (0.0, 0.0));
    }
}
