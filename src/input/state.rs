//! Input handling

use glam::Vec2;
use std::collections::HashSet;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

/// Keyboard and mouse state sampled once per frame
#[derive(Debug, Default)]
pub struct Input {
    /// Currently pressed keys
    pressed_keys: HashSet<KeyCode>,
    /// Keys that were just pressed this frame
    just_pressed_keys: HashSet<KeyCode>,
    /// Keys that were just released this frame
    just_released_keys: HashSet<KeyCode>,
    /// Raw mouse motion since the last frame, +y pointing down
    mouse_delta: Vec2,
}

impl Input {
    /// Create a new input manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the end of each frame to clear per-frame state
    pub fn update(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.mouse_delta = Vec2::ZERO;
    }

    /// Process a keyboard event
    pub fn process_keyboard(&mut self, key_code: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.pressed_keys.contains(&key_code) {
                    self.just_pressed_keys.insert(key_code);
                }
                self.pressed_keys.insert(key_code);
            }
            ElementState::Released => {
                self.pressed_keys.remove(&key_code);
                self.just_released_keys.insert(key_code);
            }
        }
    }

    /// Accumulate raw mouse motion
    pub fn process_mouse_delta(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    /// Release every key, e.g. when the window loses focus
    pub fn release_all(&mut self) {
        self.just_released_keys.extend(self.pressed_keys.drain());
    }

    /// Check if a key is currently pressed
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Check if a key was just pressed this frame
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    /// Check if a key was just released this frame
    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    /// Mouse movement since the last frame, +y pointing down
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }
}
