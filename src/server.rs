//! ChatServer Actor implementation
//!
//! The central actor that owns all state: the connection registry and the
//! lobby (waiting pool + rooms). Commands are processed one at a time, so a
//! join's lookup-then-match-or-enqueue can never interleave with another.
//!
//! The actor never waits on a client: outbound messages are queued with
//! `try_send`, and a client whose channel is full is dropped and cleaned up
//! as if it had disconnected.

use std::collections::{HashMap, VecDeque};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::{AppError, SendError};
use crate::lobby::{Lobby, LobbyStats, Presence};
use crate::matchmaker::MatchResult;
use crate::message::{Delivery, ServerMessage};
use crate::types::{ClientId, RoomId};

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New client connected
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Client disconnected
    Disconnect { client_id: ClientId },
    /// Ask to be matched on an interest
    Join {
        client_id: ClientId,
        display_name: String,
        interest: String,
    },
    /// Send a chat message into a room
    Chat {
        client_id: ClientId,
        room_id: RoomId,
        display_name: String,
        body: String,
    },
    /// Leave a room
    LeaveRoom { client_id: ClientId, room_id: RoomId },
    /// Inbound message could not be decoded or validated
    Reject { client_id: ClientId, error: AppError },
    /// Operational query: where a client sits, plus the lobby counters.
    /// Answered in command order, so a reply also means every earlier
    /// command has been handled.
    Inspect {
        client_id: ClientId,
        reply: oneshot::Sender<(Presence, LobbyStats)>,
    },
    /// Operational query: global counters (used by the periodic stats log)
    Stats { reply: oneshot::Sender<ServerStats> },
}

/// Registry and lobby counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub clients: usize,
    pub waiting: usize,
    pub rooms: usize,
}

/// The main ChatServer actor
///
/// Manages all state and processes commands from client handlers.
pub struct ChatServer {
    /// All connected clients: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// Waiting pool and active rooms
    lobby: Lobby,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self::with_lobby(receiver, Lobby::new())
    }

    /// Create a ChatServer around an existing lobby
    pub fn with_lobby(receiver: mpsc::Receiver<ServerCommand>, lobby: Lobby) -> Self {
        Self {
            clients: HashMap::new(),
            lobby,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { client_id, sender } => {
                self.handle_connect(client_id, sender);
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            ServerCommand::Join {
                client_id,
                display_name,
                interest,
            } => {
                self.handle_join(client_id, display_name, interest);
            }
            ServerCommand::Chat {
                client_id,
                room_id,
                display_name,
                body,
            } => {
                self.handle_chat(client_id, room_id, display_name, body);
            }
            ServerCommand::LeaveRoom { client_id, room_id } => {
                self.handle_leave_room(client_id, room_id);
            }
            ServerCommand::Reject { client_id, error } => {
                self.deliver(vec![Delivery::new(client_id, error.into())]);
            }
            ServerCommand::Inspect { client_id, reply } => {
                let _ = reply.send((self.lobby.presence(client_id), self.lobby.stats()));
            }
            ServerCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    /// Handle new client connection
    fn handle_connect(&mut self, client_id: ClientId, sender: mpsc::Sender<ServerMessage>) {
        info!("Client {} connected", client_id);
        let client = Client::new(client_id, sender);
        self.clients.insert(client_id, client);
        self.log_counts();
    }

    /// Handle client disconnection
    fn handle_disconnect(&mut self, client_id: ClientId) {
        info!("Client {} disconnected", client_id);

        // Remove client first so nothing is queued for a dead channel
        self.clients.remove(&client_id);

        let mut out = Vec::new();
        self.lobby.on_disconnect(client_id, &mut out);
        self.deliver(out);

        self.log_counts();
    }

    /// Handle a join request
    fn handle_join(&mut self, client_id: ClientId, display_name: String, interest: String) {
        if !self.clients.contains_key(&client_id) {
            return;
        }

        let mut out = Vec::new();
        match self.lobby.join(client_id, display_name, interest, &mut out) {
            Ok(MatchResult::Matched { room_id, partner }) => {
                debug!("Client {} matched with '{}' in {}", client_id, partner, room_id);
            }
            Ok(MatchResult::Waiting) => {}
            Err(e) => {
                debug!("Join from {} rejected: {}", client_id, e);
                out.push(Delivery::new(client_id, e.into()));
            }
        }
        self.deliver(out);
    }

    /// Handle chat message
    fn handle_chat(
        &mut self,
        client_id: ClientId,
        room_id: RoomId,
        display_name: String,
        body: String,
    ) {
        if !self.clients.contains_key(&client_id) {
            return;
        }

        let mut out = Vec::new();
        self.lobby
            .relay(&room_id, client_id, &display_name, &body, &mut out);
        self.deliver(out);
    }

    /// Handle voluntary room leaving
    fn handle_leave_room(&mut self, client_id: ClientId, room_id: RoomId) {
        let mut out = Vec::new();
        if self.lobby.leave(&room_id, client_id, &mut out) {
            info!("Client {} left room {}", client_id, room_id);
        }
        self.deliver(out);
        self.log_counts();
    }

    /// Push queued deliveries to their clients, in order
    ///
    /// Deliveries to clients that are gone are dropped. A client whose
    /// channel is full is removed and scrubbed from the lobby; the
    /// resulting partner notices are delivered in the same pass.
    fn deliver(&mut self, out: Vec<Delivery>) {
        let mut pending: VecDeque<Delivery> = out.into();

        while let Some(Delivery { to, message }) = pending.pop_front() {
            let Some(client) = self.clients.get(&to) else {
                debug!("Dropping message for unknown client {}", to);
                continue;
            };

            match client.send(message) {
                Ok(()) => {}
                Err(SendError::Full) => {
                    warn!("Client {} is not reading, dropping it", to);
                    self.clients.remove(&to);

                    let mut cleanup = Vec::new();
                    self.lobby.on_disconnect(to, &mut cleanup);
                    pending.extend(cleanup);
                }
                Err(SendError::ChannelClosed) => {
                    debug!("Channel to {} already closed", to);
                }
            }
        }
    }

    fn stats(&self) -> ServerStats {
        let lobby = self.lobby.stats();
        ServerStats {
            clients: self.clients.len(),
            waiting: lobby.waiting,
            rooms: lobby.rooms,
        }
    }

    fn log_counts(&self) {
        let stats = self.stats();
        debug!(
            "Total clients: {}, waiting: {}, rooms: {}",
            stats.clients, stats.waiting, stats.rooms
        );
    }
}
