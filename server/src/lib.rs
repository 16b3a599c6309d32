//! # Game Server Library
//!
//! This library provides the server side of the position synchronization
//! protocol. It keeps the canonical table of player positions, accepts
//! position updates reported by clients and hands the merged view back to
//! anyone who asks for it.
//!
//! ## Core Responsibilities
//!
//! ### Client-Authoritative State
//! Clients decide where their own player is and report it. The server does
//! not validate movement; its job is to record the latest report from each
//! player exactly once and to serve a consistent snapshot of all of them.
//!
//! ### Idempotent Command Acceptance
//! Every mutating request carries a per-player sequence number. A request
//! whose number is not newer than the last one accepted for that player is
//! acknowledged and ignored, so clients can retry freely and late or
//! reordered deliveries cannot roll a player back.
//!
//! ## Architecture Design
//!
//! ### Single-Owner World Actor
//! All mutable state lives in [`world::World`], owned by one actor task.
//! Connection handlers never lock it: they submit a typed command and wait for
//! the reply. Commands run strictly one at a time in arrival order, and each
//! one performs its sequence check and its mutation together.
//!
//! ### TCP Request/Response
//! Each client holds one TCP connection. Every request frame gets exactly one
//! response frame, and connections are served concurrently on their own tasks.
//!
//! ## Module Organization
//!
//! ### Sequence Module (`sequence`)
//! Per-player high-water marks and the admit/drop decision.
//!
//! ### World Module (`world`)
//! The player table, its sequence records and the id counter, plus the
//! command enum the world actor understands.
//!
//! ### Service Module (`service`)
//! Connect, UpdateState, GetState and Disconnect expressed as world actor
//! submissions, and the mapping from wire requests to responses.
//!
//! ### Network Module (`network`)
//! Accept loop, per-connection framing and shutdown handling.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::service::GameService;
//! use server::world::World;
//! use shared::{actor, PlayerState};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (world, _world_task) = actor::spawn(World::new(PlayerState::new(1, 1)), 1024);
//!     let server = Server::bind("127.0.0.1:12345", GameService::new(world)).await?;
//!
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     server.run(shutdown_rx).await;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod sequence;
pub mod service;
pub mod world;
