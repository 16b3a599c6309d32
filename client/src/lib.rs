//! # Game Client Library
//!
//! This library provides the client side of the position synchronization
//! protocol. It decides where the local player may move, reports every move to
//! the server and keeps a local mirror of all players that is refreshed from
//! the server on a fixed timer.
//!
//! ## Architecture Overview
//!
//! ### Client-Authoritative Movement
//! Movement is checked and applied locally, against the map and the positions
//! of other players in the mirror. A successful move is drawn right away and
//! sent to the server in the background; the server records it without
//! validation.
//!
//! ### Serialized, Retried Remote Calls
//! All calls share one connection guarded by an async mutex, so only one call
//! is ever on the wire. A failed call is retried a bounded number of times
//! with a fixed backoff. Mutating commands carry a sequence number allocated
//! when the command is issued and reused by its retries, so the server can
//! discard duplicates and late deliveries.
//!
//! ### Periodic Reconciliation
//! A background task pulls the server's table every tick and replaces the
//! mirror with it. The server's view wins, including for the local player.
//!
//! ## Module Organization
//!
//! ### RPC Module (`rpc`)
//! - `Transport` seam and its TCP implementation with lazy redial
//! - `RemoteCaller` with the call lock, retry loop and sequence counter
//!
//! ### World Module (`world`)
//! The local mirror as an actor: movement rules, reconciliation and views.
//!
//! ### Reconciler Module (`reconciler`)
//! The timer-driven GetState loop and the redraw signal handling.
//!
//! ### Input Module (`input`)
//! Parsing of line-based commands read from stdin.
//!
//! ### Rendering Module (`rendering`)
//! The `Renderer` seam and a renderer that writes frames to the log.
//!
//! ### Network Module (`network`)
//! The `Client` context tying everything together, including startup and
//! shutdown.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::spawn_stdin_reader;
//! use client::network::{Client, ClientConfig};
//! use client::rendering::LogRenderer;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(ClientConfig::default(), Box::new(LogRenderer::new())).await?;
//!
//!     let (tx, rx) = mpsc::channel(32);
//!     spawn_stdin_reader(tx)?;
//!     client.run(rx).await?;
//!
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod input;
pub mod network;
pub mod reconciler;
pub mod rendering;
pub mod rpc;
pub mod world;
