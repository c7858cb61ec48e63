//! Rooms and the room manager
//!
//! A room is created at match time with exactly two members and is
//! destroyed as soon as either of them leaves or disconnects.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::message::{Delivery, ServerMessage};
use crate::types::{ClientId, RoomId};

/// Sender name used for server-originated chat notices
pub const SYSTEM_SENDER: &str = "System";

/// One side of a room
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub client_id: ClientId,
    pub display_name: String,
}

impl Member {
    pub fn new(client_id: ClientId, display_name: String) -> Self {
        Self {
            client_id,
            display_name,
        }
    }
}

/// 1:1 Chat Room
///
/// Always holds exactly two members. There is no host/guest distinction
/// and no way to add a third participant.
#[derive(Debug)]
pub struct Room {
    /// Room id, derived from both member ids
    pub id: RoomId,
    /// The two participants
    pub members: [Member; 2],
    /// Interest that produced the match (informational)
    pub interest: String,
    /// Room creation time
    pub created_at: Instant,
}

impl Room {
    /// Create a room for two members matched on `interest`
    pub fn new(first: Member, second: Member, interest: String) -> Self {
        Self {
            id: RoomId::for_pair(first.client_id, second.client_id),
            members: [first, second],
            interest,
            created_at: Instant::now(),
        }
    }

    /// Check if a client is in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.iter().any(|m| m.client_id == client_id)
    }

    /// Get the other member for a given client
    ///
    /// Returns None if the client is not in the room.
    pub fn partner_of(&self, client_id: ClientId) -> Option<&Member> {
        match &self.members {
            [a, b] if a.client_id == client_id => Some(b),
            [a, b] if b.client_id == client_id => Some(a),
            _ => None,
        }
    }

    /// Ids of both members
    pub fn member_ids(&self) -> [ClientId; 2] {
        [self.members[0].client_id, self.members[1].client_id]
    }
}

/// Owns all active rooms
///
/// Keeps a client → room index alongside the rooms so membership lookups
/// on disconnect do not scan every room.
#[derive(Debug, Default)]
pub struct RoomManager {
    /// All active rooms: RoomId -> Room
    rooms: HashMap<RoomId, Room>,
    /// Client to room mapping: ClientId -> RoomId
    client_rooms: HashMap<ClientId, RoomId>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly matched room and queue the match notifications
    ///
    /// Each member gets `matched` (naming the other member) followed by a
    /// system notice stating the shared interest.
    pub fn open(&mut self, room: Room, out: &mut Vec<Delivery>) -> RoomId {
        let room_id = room.id.clone();
        let notice = format!("You both have the same interest: {}", room.interest);

        for member in &room.members {
            let partner = room
                .partner_of(member.client_id)
                .map(|p| p.display_name.clone())
                .unwrap_or_default();
            out.push(Delivery::new(
                member.client_id,
                ServerMessage::Matched {
                    room_id: room_id.to_string(),
                    partner,
                },
            ));
        }
        for client_id in room.member_ids() {
            out.push(Delivery::new(
                client_id,
                ServerMessage::Chat {
                    display_name: SYSTEM_SENDER.to_string(),
                    body: notice.clone(),
                },
            ));
        }

        for client_id in room.member_ids() {
            self.client_rooms.insert(client_id, room_id.clone());
        }
        info!("Room {} opened on interest '{}'", room_id, room.interest);
        self.rooms.insert(room_id.clone(), room);

        room_id
    }

    /// Relay a chat message to every member of a room
    ///
    /// Unknown rooms and senders outside the room are ignored.
    pub fn relay(
        &self,
        room_id: &RoomId,
        sender: ClientId,
        display_name: &str,
        body: &str,
        out: &mut Vec<Delivery>,
    ) {
        let Some(room) = self.rooms.get(room_id) else {
            debug!("Relay to closed room {} dropped", room_id);
            return;
        };

        if !room.contains(sender) {
            warn!("Client {} relayed into room {} without being a member", sender, room_id);
            return;
        }

        for client_id in room.member_ids() {
            out.push(Delivery::new(
                client_id,
                ServerMessage::Chat {
                    display_name: display_name.to_string(),
                    body: body.to_string(),
                },
            ));
        }
    }

    /// Leave a room explicitly
    ///
    /// Idempotent: leaving a room that is gone, or that the client never
    /// belonged to, does nothing.
    pub fn leave(&mut self, room_id: &RoomId, leaving: ClientId, out: &mut Vec<Delivery>) -> bool {
        let Some(room) = self.rooms.get(room_id) else {
            debug!("Leave for closed room {} ignored", room_id);
            return false;
        };

        if !room.contains(leaving) {
            warn!("Client {} tried to leave room {} it is not in", leaving, room_id);
            return false;
        }

        self.close(room_id, leaving, out);
        true
    }

    /// Tear down whichever room `client_id` is in, if any
    pub fn leave_current(&mut self, client_id: ClientId, out: &mut Vec<Delivery>) -> bool {
        let Some(room_id) = self.client_rooms.get(&client_id).cloned() else {
            return false;
        };
        self.close(&room_id, client_id, out);
        true
    }

    /// Remove the room, clear both memberships and notify the partner
    fn close(&mut self, room_id: &RoomId, leaving: ClientId, out: &mut Vec<Delivery>) {
        let Some(room) = self.rooms.remove(room_id) else {
            return;
        };

        for client_id in room.member_ids() {
            self.client_rooms.remove(&client_id);
        }

        if let Some(partner) = room.partner_of(leaving) {
            out.push(Delivery::new(partner.client_id, ServerMessage::PartnerDisconnected));
        }

        info!(
            "Room {} closed by {} after {:?}",
            room_id,
            leaving,
            room.created_at.elapsed()
        );
    }

    /// Room the client is currently in
    pub fn room_of(&self, client_id: ClientId) -> Option<&RoomId> {
        self.client_rooms.get(&client_id)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Iterate over all active rooms
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Number of active rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
