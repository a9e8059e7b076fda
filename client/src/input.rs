//! Keyboard sampling

use macroquad::prelude::*;

/// Player intents gathered in one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub up: bool,
    pub down: bool,
    /// Any key went down this frame
    pub ready: bool,
    pub quit: bool,
}

/// Samples the keyboard once per frame
pub struct InputManager {
    // Previous frame key state for edge detection
    prev_key_escape: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_key_escape: false,
        }
    }

    /// W/S or the arrow keys move, any key readies, Escape quits
    pub fn update(&mut self) -> FrameInput {
        let up = is_key_down(KeyCode::W) || is_key_down(KeyCode::Up);
        let down = is_key_down(KeyCode::S) || is_key_down(KeyCode::Down);
        let ready = get_last_key_pressed().is_some();

        let key_escape = is_key_down(KeyCode::Escape);
        let quit = key_escape && !self.prev_key_escape;
        self.prev_key_escape = key_escape;

        FrameInput {
            up,
            down,
            ready,
            quit,
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
