//! # Quiz Buzzer Server Library
//!
//! This library provides the authoritative server for a real-time,
//! multi-participant quiz session. Players connect over TCP, chat, and race
//! to hit the buzzer (an empty line) once the master starts a countdown.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! The server owns the roster, the single master, the current phase and
//! the active buzzer holder. Clients only send text lines; every decision
//! about who may answer is made here.
//!
//! ### Session Management
//! Handles the complete lifecycle of a connection:
//! - Joining with a placeholder name
//! - Forwarding decoded lines to the engine in the order they were read
//! - Draining a private FIFO mailbox back onto the connection
//! - Idempotent teardown on remote close or server shutdown
//!
//! ### Message Routing
//! Every outbound message is a broadcast (all online players), a whisper
//! (one player) or a system notice (audit channel only). An optional audit
//! channel receives a tagged copy of each, which is what the integration
//! tests observe.
//!
//! ## Architecture Design
//!
//! ### Single Serialized Engine
//! All state lives in [`game::Game`] and is mutated only from its event
//! loop. Session input and countdown phase changes are both converted
//! into [`game::GameEvent`]s and queued, so each transition runs to
//! completion before the next one starts and no locks are needed.
//!
//! ### Phased Round Timer
//! `:time N` arms a countdown that reports a warning five seconds before
//! the end and then expiry. Timer tasks post events into the engine queue
//! tagged with their round, and superseded countdowns are aborted.
//!
//! ## Module Organization
//!
//! ### Player Module (`player`)
//! Player records and the append-only roster, addressed by [`player::PlayerId`].
//!
//! ### Command Module (`command`)
//! Parses `:`-prefixed lines into a closed [`command::Command`] enumeration.
//!
//! ### Router Module (`router`)
//! Broadcast, whisper and system delivery plus audit tagging.
//!
//! ### Timer Module (`timer`)
//! Cancelable two-segment round countdown.
//!
//! ### Game Module (`game`)
//! The phase state machine and the event loop that drives it.
//!
//! ### Session Module (`session`)
//! Per-connection read and write loops.
//!
//! ### Network Module (`network`)
//! TCP listener, accept loop and shutdown handling.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameConfig;
//! use server::network::Server;
//! use shared::Wire;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:9999", Wire::Plain, GameConfig::default(), None).await?;
//!
//!     // Runs until the master sends `:exit` or Ctrl+C is pressed
//!     server
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod game;
pub mod network;
pub mod player;
pub mod router;
pub mod session;
pub mod timer;
