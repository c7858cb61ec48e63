//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake,
//! message parsing and validation, and bidirectional communication with
//! the ChatServer.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::ServerCommand;
use crate::types::{ClientId, RoomId};

/// Per-client outbound channel capacity
const CLIENT_CHANNEL_SIZE: usize = 32;

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, sets up bidirectional communication,
/// and manages the connection lifecycle.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    // Channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(CLIENT_CHANNEL_SIZE);

    // Register with ChatServer
    if cmd_tx
        .send(ServerCommand::Connect {
            client_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register client {} - server closed", client_id);
        return Err(AppError::ChannelSend);
    }

    let connected_msg = ServerMessage::Connected {
        client_id: client_id.to_string(),
    };
    let json = serde_json::to_string(&connected_msg)?;
    ws_sender.send(Message::Text(json.into())).await?;

    let cmd_tx_read = cmd_tx.clone();

    // Read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    let cmd = parse_command(client_id, &text);
                    if cmd_tx_read.send(cmd).await.is_err() {
                        debug!("Server closed, ending read task for {}", client_id);
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", client_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", client_id);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Write task (ServerMessage -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for client");

        let _ = ws_sender.close().await;
    });

    wait_for_first(client_id, read_task, write_task).await;

    // Disconnect must always reach the server, whatever state the client was in
    let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;

    info!("Client {} disconnected", client_id);

    Ok(())
}

/// Wait for either connection task to finish, then abort the other
///
/// Once one direction is gone the connection is over: a lingering read
/// task must not keep forwarding commands after `Disconnect`.
pub async fn wait_for_first(
    client_id: ClientId,
    mut read_task: JoinHandle<()>,
    mut write_task: JoinHandle<()>,
) {
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
        }
    }
}

/// Decode and validate one text frame
///
/// Anything malformed becomes a `Reject` so the client gets an error
/// notification while the connection stays open.
pub fn parse_command(client_id: ClientId, text: &str) -> ServerCommand {
    let parsed = serde_json::from_str::<ClientMessage>(text)
        .map_err(AppError::from)
        .and_then(|msg| {
            msg.validate()?;
            Ok(msg)
        });

    match parsed {
        Ok(msg) => client_message_to_command(client_id, msg),
        Err(error) => {
            warn!("Invalid message from {}: {}", client_id, error);
            ServerCommand::Reject { client_id, error }
        }
    }
}

/// Convert a ClientMessage to a ServerCommand
fn client_message_to_command(client_id: ClientId, msg: ClientMessage) -> ServerCommand {
    match msg {
        ClientMessage::Join {
            display_name,
            interest,
        } => ServerCommand::Join {
            client_id,
            display_name,
            interest,
        },
        ClientMessage::Chat {
            room_id,
            display_name,
            body,
        } => ServerCommand::Chat {
            client_id,
            room_id: RoomId::from_string(room_id),
            display_name,
            body,
        },
        ClientMessage::LeaveRoom { room_id } => ServerCommand::LeaveRoom {
            client_id,
            room_id: RoomId::from_string(room_id),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_wait_for_first_aborts_other_task() {
        let (alive_tx, alive_rx) = oneshot::channel::<()>();

        let finished = tokio::spawn(async {});
        let lingering = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });

        wait_for_first(ClientId::new(), finished, lingering).await;

        // The sender is dropped only when the lingering task is torn down
        let result = timeout(Duration::from_secs(2), alive_rx).await;
        assert!(matches!(result, Ok(Err(_))));
    }

    #[tokio::test]
    async fn test_wait_for_first_aborts_reader_when_writer_ends() {
        let (alive_tx, alive_rx) = oneshot::channel::<()>();

        let lingering = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        let finished = tokio::spawn(async {});

        wait_for_first(ClientId::new(), lingering, finished).await;

        let result = timeout(Duration::from_secs(2), alive_rx).await;
        assert!(matches!(result, Ok(Err(_))));
    }

    #[test]
    fn test_parse_join() {
        let id = ClientId::new();
        let cmd = parse_command(id, r#"{"type":"join","display_name":"Alice","interest":"music"}"#);
        match cmd {
            ServerCommand::Join {
                client_id,
                display_name,
                interest,
            } => {
                assert_eq!(client_id, id);
                assert_eq!(display_name, "Alice");
                assert_eq!(interest, "music");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_chat_room_id() {
        let id = ClientId::new();
        let cmd = parse_command(
            id,
            r#"{"type":"chat","room_id":" a#b ","display_name":"Alice","body":"hi"}"#,
        );
        assert!(matches!(cmd, ServerCommand::Chat { room_id, .. } if room_id == RoomId("a#b".into())));
    }

    #[test]
    fn test_parse_bad_json_rejected() {
        let cmd = parse_command(ClientId::new(), "not json");
        assert!(matches!(cmd, ServerCommand::Reject { error: AppError::Json(_), .. }));
    }

    #[test]
    fn test_parse_blank_interest_rejected() {
        let cmd = parse_command(
            ClientId::new(),
            r#"{"type":"join","display_name":"Alice","interest":"  "}"#,
        );
        assert!(matches!(
            cmd,
            ServerCommand::Reject {
                error: AppError::EmptyField("interest"),
                ..
            }
        ));
    }
}
