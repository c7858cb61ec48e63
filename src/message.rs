//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::ClientId;

/// Maximum display name length (characters)
pub const MAX_DISPLAY_NAME_LEN: usize = 32;
/// Maximum interest tag length (characters)
pub const MAX_INTEREST_LEN: usize = 64;
/// Maximum chat body length (characters)
pub const MAX_BODY_LEN: usize = 2000;
/// Maximum room id length (characters)
pub const MAX_ROOM_ID_LEN: usize = 128;

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask to be paired with someone sharing `interest`
    Join {
        display_name: String,
        interest: String,
    },
    /// Send a chat message into a room
    Chat {
        room_id: String,
        display_name: String,
        body: String,
    },
    /// Leave a room
    LeaveRoom { room_id: String },
}

impl ClientMessage {
    /// Check payload shape before it reaches the server actor
    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            ClientMessage::Join {
                display_name,
                interest,
            } => {
                check_field("display_name", display_name, MAX_DISPLAY_NAME_LEN)?;
                check_field("interest", interest, MAX_INTEREST_LEN)
            }
            ClientMessage::Chat {
                room_id,
                display_name,
                body,
            } => {
                check_field("room_id", room_id, MAX_ROOM_ID_LEN)?;
                check_field("display_name", display_name, MAX_DISPLAY_NAME_LEN)?;
                check_field("body", body, MAX_BODY_LEN)
            }
            ClientMessage::LeaveRoom { room_id } => check_field("room_id", room_id, MAX_ROOM_ID_LEN),
        }
    }
}

fn check_field(field: &'static str, value: &str, max: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::EmptyField(field));
    }
    if value.chars().count() > max {
        return Err(AppError::FieldTooLong { field, max });
    }
    Ok(())
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection successful, client ID issued
    Connected { client_id: String },
    /// No partner yet, queued under `interest`
    Waiting { interest: String },
    /// Paired with a partner in a new room
    Matched { room_id: String, partner: String },
    /// Chat message received (also used for system notices)
    Chat { display_name: String, body: String },
    /// The other room member left or lost connection
    PartnerDisconnected,
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// An outbound message addressed to one client
///
/// Matchmaking and room operations never touch channels directly; they
/// append deliveries in the order clients must observe them.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ClientId,
    pub message: ServerMessage,
}

impl Delivery {
    pub fn new(to: ClientId, message: ServerMessage) -> Self {
        Self { to, message }
    }
}

/// Error codes for ServerMessage::Error
///
/// Represents different error scenarios that can be communicated to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Join while already queued
    AlreadyWaiting,
    /// Join while already in a room
    AlreadyInRoom,
    /// Invalid message format
    InvalidMessage,
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let (code, message) = match &err {
            AppError::AlreadyWaiting => (
                ErrorCode::AlreadyWaiting,
                "You are already waiting for a partner".to_string(),
            ),
            AppError::AlreadyInRoom => {
                (ErrorCode::AlreadyInRoom, "You are already in a room".to_string())
            }
            AppError::EmptyField(_) | AppError::FieldTooLong { .. } => {
                (ErrorCode::InvalidMessage, err.to_string())
            }
            AppError::Json(e) => {
                (ErrorCode::InvalidMessage, format!("Invalid message format: {}", e))
            }
            // Fatal errors are not typically converted (connection closes)
            _ => (ErrorCode::InvalidMessage, "Internal error".to_string()),
        };
        ServerMessage::Error { code, message }
    }
}
