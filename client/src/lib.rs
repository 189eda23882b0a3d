//! # Game Client Library
//!
//! A headless NutBurst client. It speaks the same WebSocket event protocol
//! as the browser client, keeps a local mirror of the room, and can play
//! rounds on its own by pressing the key at a steady, slightly jittered
//! pace. Useful for filling a room during development and for driving the
//! server from integration tests.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Local roster and round state rebuilt from server events, including
//! working out which player is this client.
//!
//! ### Input Module (`input`)
//! Press pacing: base interval plus random jitter.
//!
//! ### Network Module (`network`)
//! - [`network::Connection`]: raw event stream, one JSON text frame per event
//! - [`network::Bot`]: joins, names itself, optionally starts rounds and
//!   mashes until the configured number of rounds is over
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Bot, BotConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut bot = Bot::connect(BotConfig {
//!         server_url: "ws://127.0.0.1:8080/socket".to_string(),
//!         name: "masher".to_string(),
//!         start_game: true,
//!         press_interval: Duration::from_millis(210),
//!         jitter: Duration::from_millis(30),
//!         rounds: 1,
//!     })
//!     .await?;
//!
//!     let summary = bot.run().await?;
//!     println!("{:?}", summary);
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
