//! # Game Server Library
//!
//! This library provides the realtime transport of the multiplayer game: it
//! accepts players over WebSocket, relays what each of them sends to every
//! connected peer, and keeps a shared world model in step with the traffic.
//!
//! ## Core Responsibilities
//!
//! ### Connection Lifecycle
//! Every accepted socket goes through the same path:
//! - Upgrade to WebSocket with a bounded inbound message size
//! - Join handshake: register, send the `Init` snapshot, announce `Connect`
//! - Two pumps per connection, one reading and one writing
//! - Exactly one `Exit` announcement when the reader ends
//!
//! ### Broadcast Fan-out
//! A single hub task owns the registry of live connections and copies each
//! broadcast into every connection's bounded outbound queue. Delivery never
//! blocks on a slow peer; a peer whose queue is full is disconnected.
//!
//! ### Liveness
//! The writer pings every `ping_period`. The reader gives up on a peer that
//! has been silent for `pong_wait`, and the writer gives up on any write that
//! takes longer than `write_wait`.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Timing constants, queue capacity and message size limits.
//!
//! ### Hub Module (`hub`)
//! The registry actor and the cloneable [`hub::HubHandle`] used to reach it.
//!
//! ### Connection Module (`connection`)
//! The reader and writer pumps and the exit path.
//!
//! ### Session Module (`session`)
//! The join handshake that turns an upgraded socket into a live connection.
//!
//! ### Game Module (`game`)
//! The [`game::Simulation`] seam and the reference [`game::World`].
//!
//! ### Network Module (`network`)
//! TCP listener, WebSocket upgrade and the accept loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::game::World;
//! use server::network::Server;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let world = Arc::new(World::new());
//!     let server = Server::bind(ServerConfig::new("127.0.0.1:8080"), world).await?;
//!
//!     // Accepts players until the process is stopped
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod hub;
pub mod network;
pub mod session;

pub use config::ServerConfig;
pub use error::ServerError;
