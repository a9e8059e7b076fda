//! # Pong Server Library
//!
//! Authoritative server for two-player networked Pong. The server owns the
//! only real copy of the match: paddles, ball, scores and match state all
//! live here, and clients receive a full snapshot of them every tick.
//!
//! ## Module Organization
//!
//! ### Physics Module (`physics`)
//! A small axis-aligned rigid-body world. Bodies are addressed by handle,
//! respond to impulses, and report begin-of-contact events for watched
//! category pairs (ball against either goal).
//!
//! ### Board Module (`board`)
//! The four static slabs around the field. The left and right slabs are the
//! goals.
//!
//! ### Client Manager Module (`client_manager`)
//! The two-seat player roster: identities, addresses, ordinals, opponent
//! links, ready flags, scores and liveness.
//!
//! ### Scene Module (`scene`)
//! The match state machine (waiting, begin, playing, score, game set) and
//! the per-tick pipeline: apply requests, step the world, score goals,
//! build snapshots.
//!
//! ### Network Module (`network`)
//! Binds the UDP channel and runs the fixed-rate loop that feeds the scene
//! and sends out its replies.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::{NetConfig, SceneConfig, ServerSettings};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind(
//!         "127.0.0.1:54212",
//!         &NetConfig::default(),
//!         SceneConfig::default(),
//!         ServerSettings::default(),
//!     )?;
//!
//!     // Ticks at the scene's tick rate until Ctrl+C
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod client_manager;
pub mod network;
pub mod physics;
pub mod scene;
