//! Tunables consumed by the transport, the scene and the player client
//!
//! Each struct is built once by the binary's argument parser and handed to the
//! constructor that needs it.

use crate::codec::Codec;
use crate::math::Vec2;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 54212;

/// Settings both peers must agree on out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetConfig {
    pub codec: Codec,
    pub compression: bool,
}

/// Server-side simulation tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub board_width: f32,
    pub board_height: f32,
    /// Simulation steps per second.
    pub tick_rate: u32,
    pub gravity: Vec2,

    pub paddle_impulse: f32,
    pub paddle_friction: f32,
    pub paddle_mass: f32,
    pub paddle_max_velocity: f32,
    pub paddle_size: Vec2,
    /// Start position of player 1; player 2 mirrors it horizontally.
    pub paddle_start: Vec2,

    pub ball_mass: f32,
    pub ball_max_velocity: f32,
    pub ball_size: Vec2,
    pub ball_start: Vec2,
    pub ball_serve_impulse: Vec2,
    pub ball_min_speed: f32,
    pub ball_boost: f32,

    pub score_limit: u32,
    pub score_delay: Duration,
}

impl SceneConfig {
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f32(self.tick_delta())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        let board_width = 800.0;
        let board_height = 600.0;

        Self {
            board_width,
            board_height,
            tick_rate: 66,
            gravity: Vec2::ZERO,

            paddle_impulse: 3200.0,
            paddle_friction: 0.8,
            paddle_mass: 100.0,
            paddle_max_velocity: 1600.0,
            paddle_size: Vec2::new(32.0, 64.0),
            paddle_start: Vec2::new(32.0, (board_height / 2.0).floor()),

            ball_mass: 10.0,
            ball_max_velocity: 800.0,
            ball_size: Vec2::new(32.0, 32.0),
            ball_start: Vec2::new((board_width / 2.0).floor(), (board_height / 2.0).floor()),
            ball_serve_impulse: Vec2::new(-1500.0, 0.0),
            ball_min_speed: 200.0,
            ball_boost: 1.02,

            score_limit: 10,
            score_delay: Duration::from_secs(3),
        }
    }
}

/// Server loop settings outside the simulation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// How long a finished match stays on screen before a new one begins.
    pub game_set_delay: Duration,
    /// Players silent for longer than this are dropped.
    pub client_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            game_set_delay: Duration::from_secs(5),
            client_timeout: Duration::from_secs(5),
        }
    }
}

/// Player client request pacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientConfig {
    /// Movement commands per second while a key is held.
    pub cmd_rate: u32,
    /// Update requests (and freshness lock rearms) per second.
    pub update_rate: u32,
}

impl ClientConfig {
    pub fn cmd_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.cmd_rate.max(1) as f32)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.update_rate.max(1) as f32)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cmd_rate: 30,
            update_rate: 20,
        }
    }
}
