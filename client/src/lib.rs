//! # Pong Client Library
//!
//! Client side of a two-player networked Pong match. The server owns the
//! simulation; the client submits intents and shows the latest snapshot,
//! advanced locally between snapshots so motion stays smooth at low update
//! rates.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Mirror of the match built from server snapshots:
//! - Own and foe paddle, ball, scores and match state
//! - Dead-reckoning prediction while the match is in play
//!
//! ### Network Module (`network`)
//! The `PlayerClient` talking to the server:
//! - Connect handshake and identity adoption
//! - Movement, ready and update request streams at their own rates
//! - Freshness lock so at most one response is applied per update cycle
//!
//! ### Input Module (`input`)
//! Keyboard sampling into per-frame intents.
//!
//! ### Rendering Module (`rendering`)
//! Draws the board, paddles, ball, scores and a state banner.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::input::FrameInput;
//! use client::network::PlayerClient;
//! use shared::{ClientConfig, NetConfig, DEFAULT_PORT};
//!
//! # fn main() -> Result<(), client::network::ClientError> {
//! let mut player = PlayerClient::connect(
//!     "127.0.0.1",
//!     DEFAULT_PORT,
//!     &NetConfig::default(),
//!     ClientConfig::default(),
//! )?;
//!
//! loop {
//!     player.frame(1.0 / 60.0, FrameInput::default())?;
//!     if let Some(ball) = player.game().ball {
//!         println!("ball at {:?}", ball.position);
//!     }
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
