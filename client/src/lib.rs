//! # Game Client Library
//!
//! A headless peer for the game server. It joins over WebSocket, mirrors the
//! world from the server's event stream and sends movement commands.
//!
//! ## Protocol Overview
//!
//! Every frame the server sends is a batch of length-prefixed records, each
//! one an encoded [`shared::Event`]. The first frame after joining carries
//! `Init`, the snapshot of all units plus this client's own id. After that
//! the client sees `Connect` when someone joins, `Exit` when someone leaves,
//! and every `Opaque` event any peer sent, its own included.
//!
//! The server does not interpret commands; it relays them. Each client
//! applies the `Move`/`Stop` commands it receives to its own [`game::ClientWorld`].
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The local world mirror and its event application rules.
//!
//! ### Network Module (`network`)
//! The WebSocket connection, frame decoding and the [`network::ClientError`] type.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::{Command, Direction};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("ws://127.0.0.1:8080").await?;
//!
//!     // The first frame holds the snapshot
//!     client.recv_events().await?;
//!     let id = client.player_id().unwrap_or_default();
//!
//!     client
//!         .send_command(&Command::Move { player_id: id, direction: Direction::Left })
//!         .await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;

pub use network::{Client, ClientError};
