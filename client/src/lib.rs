//! # Quiz Client Library
//!
//! A terminal client for the quiz buzzer server. It forwards every line
//! typed on stdin to the server and prints what comes back.
//!
//! ## Controls
//!
//! - Any text is a chat line, or an answer once you hold the floor
//! - An empty line (just Enter) is the buzzer
//! - Lines starting with `:` are commands (`:rename`, `:master`, `:game`,
//!   `:chat`, `:time [seconds]`, `:reset`, `:exit`)
//!
//! ## Module Organization
//!
//! ### Display Module (`display`)
//! Turns received lines into printable text. With the `json` wire it
//! tracks the client's own identity from `whoami` control messages and
//! summarizes `updatePlayers` rosters.
//!
//! ### Network Module (`network`)
//! TCP connection handling: stdin to server, server to stdout.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::Wire;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:9999", Wire::Plain).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod network;
