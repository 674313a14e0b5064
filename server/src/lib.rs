//! # Snake Arena Server Library
//!
//! This library provides the authoritative simulation for a multiplayer snake
//! arena on a toroidal grid. It owns the canonical world, applies player
//! intents, advances the world in discrete ticks and publishes a snapshot
//! after every tick for the transport to broadcast.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every movement, collision, feeding and respawn decision is made here.
//! Clients only send intents (connect, turn, heartbeat, disconnect) and
//! render whatever the server last published.
//!
//! ### Player Lifecycle
//! Handles the complete lifecycle of a player:
//! - Joining and receiving a display number
//! - Dying, waiting out the respawn delay and respawning
//! - Leaving, which frees the display number for reuse
//!
//! ### State Broadcasting
//! Each tick produces an immutable [`entity_store::WorldSnapshot`] shared
//! through an `Arc`, so the network layer never reads the world while it is
//! being mutated.
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! One task owns [`game::GameState`]. Inbound packets and tick timer events
//! are handled sequentially by the same `select!` loop, so at most one tick
//! runs at a time and every intent is applied between ticks.
//!
//! ### Deterministic Steps
//! Snakes are stored in id order and collision outcomes are computed from
//! the pre-move world, so the result of a tick never depends on iteration
//! order. With a fixed seed the whole simulation is reproducible.
//!
//! ## Module Organization
//!
//! - `grid`: occupancy index mapping cells to body segments
//! - `entity_store`: snakes and food, plus snapshot production
//! - `spawn`: random free-cell and free-body allocation
//! - `simulation`: the per-tick movement and collision rules
//! - `lifecycle`: sessions, display numbers, death and respawn timers
//! - `game`: the world owner tying the above together
//! - `client_manager` and `network`: the UDP transport adapter
//! - `config` and `error`: tunables and the domain error type
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // 20x20 arena at 10 ticks per second, at most 32 clients
//!     let mut server = Server::new("127.0.0.1:8080", GameConfig::default(), 32).await?;
//!
//!     // Runs until a shutdown message arrives:
//!     // - receives intents and applies them to the world
//!     // - steps the simulation once per tick
//!     // - broadcasts the snapshot and lifecycle events
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod entity_store;
pub mod error;
pub mod game;
pub mod grid;
pub mod lifecycle;
pub mod network;
pub mod simulation;
pub mod spawn;
