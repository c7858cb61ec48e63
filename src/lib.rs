//! Interest-matched 1:1 WebSocket Chat Server Library
//!
//! Pairs anonymous clients who declare the same interest into a private
//! two-person room and relays chat between them until one side leaves or
//! disconnects.
//!
//! # Features
//! - WebSocket connection handling
//! - FIFO waiting queues per interest tag
//! - Automatic pairing with a system notice naming the shared interest
//! - Room-scoped chat relay
//! - Partner notification on leave or disconnect
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the connection registry and the `Lobby`
//! - `Lobby` holds the waiting pool and the rooms; its operations are synchronous
//!   and return the messages to deliver
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use pairchat::{ChatServer, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:5000").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod lobby;
pub mod matchmaker;
pub mod message;
pub mod room;
pub mod server;
pub mod types;
pub mod waiting;

// Re-export main types for convenience
pub use client::Client;
pub use config::ServerConfig;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use lobby::{Lobby, LobbyStats, Presence};
pub use matchmaker::{MatchResult, Matchmaker};
pub use message::{ClientMessage, Delivery, ErrorCode, ServerMessage};
pub use room::{Member, Room, RoomManager};
pub use server::{ChatServer, ServerCommand, ServerStats};
pub use types::{ClientId, RoomId};
pub use waiting::{WaitingEntry, WaitingPool};
