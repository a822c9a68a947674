//! # Zed Client Library
//!
//! Client side of the zed shooter: joins a server, downloads the map, runs
//! the shared simulation locally and conforms to the server's player state.
//!
//! ## Architecture Overview
//!
//! ### Join Handshake
//! The client repeats requests every 200 ms until answered. First it asks
//! for each of the four map chunks it is missing, then for its client
//! info. The CLIENTINFO reply assigns the local player id and ends the
//! handshake.
//!
//! ### Local Simulation
//! Every frame the local input is fed to the local player and the shared
//! `World::step` runs over the downloaded map, so movement responds
//! immediately.
//!
//! ### Hard Overwrite
//! PLAYERUPDATE packets replace a player's state outright. There is no
//! input history and no replay; whatever the local step predicted is
//! discarded when the server's copy arrives.
//!
//! ## Module Organization
//!
//! ### Connection Module (`connection`)
//! Handshake state: downloaded chunk flags, assigned id, resend timing.
//!
//! ### Game Module (`game`)
//! Client world plus the view surface a renderer reads.
//!
//! ### Input Module (`input`)
//! Key bits and look deltas to wire-form input, and a headless autopilot.
//!
//! ### Network Module (`network`)
//! UDP socket and the frame-capped client loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", ClientConfig::default()).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod game;
pub mod input;
pub mod network;
