//! Error types for the chat server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// A required field was missing or blank
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),

    /// A field exceeded its length limit
    #[error("Field '{field}' exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    /// Client is already queued in the waiting pool
    #[error("Already waiting for a partner")]
    AlreadyWaiting,

    /// Client is already in a room
    #[error("Already in room")]
    AlreadyInRoom,
}

/// Message send errors
///
/// Occurs when a client's outbound channel cannot take another message.
#[derive(Debug, Error)]
pub enum SendError {
    /// The client is not draining its channel
    #[error("Channel full")]
    Full,
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
