//! # Game Server Library
//!
//! This library provides the authoritative server for NutBurst, a party game
//! where everyone in one shared room mashes a key to inflate a nut. The
//! server owns the roster and the round, decides who wins, and tells every
//! connected client what changed.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Session
//! All game decisions are made here. Clients only send intents (`keyPress`,
//! `updateName`, `startGame`) and render whatever the server broadcasts.
//!
//! ### Input Rate Limiting
//! Each player may score at most one press per cooldown window, measured
//! from their last accepted press. Extra presses are dropped silently.
//!
//! ### Round Lifecycle
//! A round ends either when its timer runs out or as soon as someone reaches
//! the target press count. Both paths go through the same end-of-round
//! routine, which only acts once per round.
//!
//! ### Inactivity Cleanup
//! Players who did not press at all during a round are removed shortly after
//! the result is announced, once clients have had time to play the ending.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Connection tasks and timers never touch game state. They send messages to
//! one loop that owns the [`session::SessionManager`], so every handler runs
//! to completion before the next event is processed and no locks guard the
//! roster or the round.
//!
//! ### WebSocket Transport
//! Browsers connect to `/socket` and exchange JSON text frames of the form
//! `{"event": ..., "data": ...}`. The same HTTP server serves static assets
//! and a `/api/status` health check.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Player registry, key-press handling, round start/end and eviction.
//!
//! ### Game Module (`game`)
//! Round phase and timing, winner selection and final-height scoring.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection id allocation and per-connection outbound queues.
//!
//! ### Network Module (`network`)
//! Event loop, outbound fan-out task and per-socket reader/writer.
//!
//! ### Routes Module (`routes`)
//! HTTP router, status endpoint and request logging.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::session::SessionConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new("0.0.0.0:8080", "public", SessionConfig::default()).await?;
//!
//!     // Serves HTTP and WebSocket traffic and runs the session loop until
//!     // a shutdown message arrives.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
pub mod routes;
pub mod session;
pub mod utils;
