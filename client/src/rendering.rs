//! Drawing the match with macroquad
//!
//! Game coordinates have y growing upward, so every body is flipped into
//! screen space before it is drawn. `shared::Vec2` is imported by name and
//! shadows the macroquad prelude's own vector type.

use crate::game::{BallView, ClientGameState, PaddleView};
use macroquad::prelude::*;
use shared::{MatchState, SceneConfig, Vec2};

/// Everything the HUD shows besides the playfield
#[derive(Debug, Clone)]
pub struct UiConfig {
    pub connected: bool,
    pub server: String,
}

pub struct Renderer {
    width: f32,
    height: f32,
    paddle_size: Vec2,
    ball_size: Vec2,
}

impl Renderer {
    pub fn new(width: usize, height: usize, scene: &SceneConfig) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
            paddle_size: scene.paddle_size,
            ball_size: scene.ball_size,
        }
    }

    pub fn render(&mut self, game: &ClientGameState, ui: &UiConfig) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        self.draw_board();

        if let Some(me) = &game.me {
            self.draw_paddle(me, GREEN);
        }
        if let Some(foe) = &game.foe {
            self.draw_paddle(foe, Color::from_rgba(255, 68, 68, 255));
        }
        if let Some(ball) = &game.ball {
            self.draw_ball(ball);
        }

        self.draw_scores(game);
        self.draw_banner(game, ui);
        self.draw_ui(ui);
    }

    /// Game space has y growing upward; the screen has it growing downward.
    fn to_screen(&self, center: Vec2, size: Vec2) -> (f32, f32) {
        (
            center.x - size.x / 2.0,
            self.height - center.y - size.y / 2.0,
        )
    }

    fn draw_board(&mut self) {
        let dash = 16.0;
        let mut y = 0.0;
        while y < self.height {
            draw_rectangle(
                self.width / 2.0 - 2.0,
                y,
                4.0,
                dash / 2.0,
                Color::from_rgba(68, 68, 68, 255),
            );
            y += dash;
        }
        draw_rectangle_lines(0.0, 0.0, self.width, self.height, 2.0, GRAY);
    }

    fn draw_paddle(&mut self, paddle: &PaddleView, color: Color) {
        let (x, y) = self.to_screen(paddle.position, self.paddle_size);
        draw_rectangle(x, y, self.paddle_size.x, self.paddle_size.y, color);
        draw_rectangle_lines(x, y, self.paddle_size.x, self.paddle_size.y, 2.0, WHITE);
    }

    fn draw_ball(&mut self, ball: &BallView) {
        let (x, y) = self.to_screen(ball.position, self.ball_size);
        draw_rectangle(x, y, self.ball_size.x, self.ball_size.y, WHITE);
    }

    /// Player 1's score on the left; grows and centers during a score pause.
    fn draw_scores(&mut self, game: &ClientGameState) {
        let (Some(me), foe) = (&game.me, &game.foe) else {
            return;
        };
        let foe_score = foe.map(|f| f.score).unwrap_or(0);
        let text = if me.number == 1 {
            format!("{}   {}", me.score, foe_score)
        } else {
            format!("{}   {}", foe_score, me.score)
        };

        let (font_size, y) = if game.state == Some(MatchState::Score) {
            (100.0, self.height / 2.0)
        } else {
            (48.0, 60.0)
        };
        let dims = measure_text(&text, None, font_size as u16, 1.0);
        draw_text(
            &text,
            (self.width - dims.width) / 2.0,
            y,
            font_size,
            Color::from_rgba(136, 136, 136, 255),
        );
    }

    fn draw_banner(&mut self, game: &ClientGameState, ui: &UiConfig) {
        let text = match game.state {
            _ if !ui.connected => "Connecting...",
            None => "Waiting for server...",
            Some(MatchState::WaitingForPlayer) => "Waiting for another player",
            Some(MatchState::Begin) => "Press any key when ready",
            Some(MatchState::GameSet) => "Game set",
            Some(MatchState::Playing) | Some(MatchState::Score) => return,
        };

        let dims = measure_text(text, None, 32, 1.0);
        draw_text(
            text,
            (self.width - dims.width) / 2.0,
            self.height * 0.75,
            32.0,
            YELLOW,
        );
    }

    fn draw_ui(&mut self, ui: &UiConfig) {
        let y_start = 10.0;
        let connection_color = if ui.connected { GREEN } else { RED };
        draw_rectangle(10.0, y_start, 8.0, 8.0, connection_color);
        draw_text(&ui.server, 20.0, y_start + 8.0, 12.0, WHITE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_screen_flips_vertical_axis() {
        let renderer = Renderer::new(800, 600, &SceneConfig::default());
        let (x, y) = renderer.to_screen(Vec2::new(400.0, 300.0), Vec2::new(32.0, 32.0));
        assert_eq!((x, y), (384.0, 284.0));

        let (_, top) = renderer.to_screen(Vec2::new(0.0, 600.0), Vec2::new(0.0, 0.0));
        assert_eq!(top, 0.0);
    }
}
