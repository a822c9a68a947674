//! # Zed Server Library
//!
//! Authoritative server for the zed shooter. It owns the canonical world,
//! applies client input, runs the shared simulation step and replicates
//! player state to every connected peer.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the same `shared::World::step` the clients predict with.
//! Clients never send positions; they send a key bitmask and two quantized
//! look angles, and the server decides the outcome.
//!
//! ### Session Management
//! Each peer address owns one of a fixed number of slots:
//! - Any valid datagram from a new address claims the first free slot
//! - The peer downloads the map in four 256-byte chunks
//! - GETCLIENTINFO promotes the session and spawns the player
//! - Five seconds of silence frees the slot and removes the player
//!
//! ### State Broadcasting
//! Every 50 ms each active peer receives one PLAYERUPDATE per active player.
//! Updates are absolute, so a lost datagram is corrected by the next one.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns the socket, the sessions and the world. Each iteration
//! drains pending datagrams without blocking, expires quiet sessions,
//! advances the simulation by the clamped frame delta and broadcasts when
//! the cadence allows. No locks are needed.
//!
//! ## Module Organization
//!
//! ### Level Module (`level`)
//! Seeded procedural map: buildings, doorways, pickup caches and the
//! initial zed population.
//!
//! ### Game Module (`game`)
//! Thin wrapper over the shared world exposing the operations the session
//! layer drives.
//!
//! ### Session Module (`session`)
//! Slot table, connection lifecycle and packet dispatch.
//!
//! ### Network Module (`network`)
//! UDP socket, frame-capped loop and broadcast cadence.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         seed: 42,
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new("127.0.0.1:8080", config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod level;
pub mod network;
pub mod session;
