//! Matching state
//!
//! `Lobby` bundles the matchmaker (waiting pool) and the room manager so
//! that every join, relay, leave and disconnect mutates both as one unit.
//! It is owned by the `ChatServer` actor, which processes one command at a
//! time; no operation here performs I/O.

use std::collections::HashSet;

use tracing::debug;

use crate::error::AppError;
use crate::matchmaker::{MatchResult, Matchmaker};
use crate::message::Delivery;
use crate::room::RoomManager;
use crate::types::{ClientId, RoomId};

/// Where a client currently sits
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    /// Neither waiting nor in a room
    Idle,
    /// Queued under an interest
    Waiting { interest: String },
    /// Member of an active room
    InRoom(RoomId),
}

/// Counters for logging and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LobbyStats {
    pub waiting: usize,
    pub rooms: usize,
}

/// Waiting pool and active rooms
#[derive(Debug, Default)]
pub struct Lobby {
    matchmaker: Matchmaker,
    rooms: RoomManager,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join request: match or enqueue
    pub fn join(
        &mut self,
        client_id: ClientId,
        display_name: String,
        interest: String,
        out: &mut Vec<Delivery>,
    ) -> Result<MatchResult, AppError> {
        self.matchmaker
            .join(&mut self.rooms, display_name, interest, client_id, out)
    }

    /// Chat message scoped to a room
    pub fn relay(
        &self,
        room_id: &RoomId,
        sender: ClientId,
        display_name: &str,
        body: &str,
        out: &mut Vec<Delivery>,
    ) {
        self.rooms.relay(room_id, sender, display_name, body, out);
    }

    /// Explicit leave
    pub fn leave(&mut self, room_id: &RoomId, client_id: ClientId, out: &mut Vec<Delivery>) -> bool {
        self.rooms.leave(room_id, client_id, out)
    }

    /// Scrub a disconnected client from the waiting pool and its room
    ///
    /// Safe for clients that never joined; calling it twice is a no-op.
    pub fn on_disconnect(&mut self, client_id: ClientId, out: &mut Vec<Delivery>) {
        let dequeued = self.matchmaker.cancel(client_id);
        let closed = self.rooms.leave_current(client_id, out);

        debug!(
            "Cleanup for {}: {} waiting entries removed, room closed: {}",
            client_id, dequeued, closed
        );
    }

    /// Locate a client
    pub fn presence(&self, client_id: ClientId) -> Presence {
        if let Some(room_id) = self.rooms.room_of(client_id) {
            return Presence::InRoom(room_id.clone());
        }
        match self.matchmaker.pool().interest_of(client_id) {
            Some(interest) => Presence::Waiting {
                interest: interest.to_string(),
            },
            None => Presence::Idle,
        }
    }

    pub fn stats(&self) -> LobbyStats {
        LobbyStats {
            waiting: self.matchmaker.pool().len(),
            rooms: self.rooms.len(),
        }
    }

    /// Check that no client is both waiting and in a room, queued twice,
    /// or a member of two rooms.
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();

        let waiting = self.matchmaker.pool().entries().map(|e| e.client_id);
        let members = self.rooms.rooms().flat_map(|r| r.member_ids());

        waiting.chain(members).all(|id| seen.insert(id))
    }
}
