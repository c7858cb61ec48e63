//! Matchmaker
//!
//! Pairs a join request with the earliest compatible waiting entry, or
//! queues the requester when nobody suitable is waiting.

use tracing::{debug, info};

use crate::error::AppError;
use crate::message::{Delivery, ServerMessage};
use crate::room::{Member, Room, RoomManager};
use crate::types::{ClientId, RoomId};
use crate::waiting::{WaitingEntry, WaitingPool};

/// Outcome of a join request
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// No partner yet; the requester is queued
    Waiting,
    /// Paired with `partner` in a new room
    Matched { room_id: RoomId, partner: String },
}

/// Owns the waiting pool and performs matching
#[derive(Debug, Default)]
pub struct Matchmaker {
    pool: WaitingPool,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a join request
    ///
    /// A client that is already waiting or already in a room is rejected
    /// and nothing changes. Otherwise the first waiting entry on the same
    /// interest (other than the requester) is matched; if there is none
    /// the requester is queued.
    pub fn join(
        &mut self,
        rooms: &mut RoomManager,
        display_name: String,
        interest: String,
        requester: ClientId,
        out: &mut Vec<Delivery>,
    ) -> Result<MatchResult, AppError> {
        if self.pool.contains(requester) {
            return Err(AppError::AlreadyWaiting);
        }
        if rooms.room_of(requester).is_some() {
            return Err(AppError::AlreadyInRoom);
        }

        let Some(candidate) = self.pool.take_first_except(&interest, requester) else {
            info!(
                "Client {} ('{}') waiting on interest '{}'",
                requester, display_name, interest
            );
            out.push(Delivery::new(
                requester,
                ServerMessage::Waiting {
                    interest: interest.clone(),
                },
            ));
            self.pool
                .push(WaitingEntry::new(display_name, interest, requester));
            debug!("Waiting entries: {}", self.pool.len());
            return Ok(MatchResult::Waiting);
        };

        info!(
            "Matched {} with {} on interest '{}'",
            requester, candidate.client_id, interest
        );

        let partner = candidate.display_name.clone();
        let room = Room::new(
            Member::new(requester, display_name),
            Member::new(candidate.client_id, candidate.display_name),
            interest,
        );
        let room_id = rooms.open(room, out);

        Ok(MatchResult::Matched { room_id, partner })
    }

    /// Drop every waiting entry held by `client_id`
    pub fn cancel(&mut self, client_id: ClientId) -> usize {
        self.pool.remove_client(client_id)
    }

    /// Read-only view of the waiting pool
    pub fn pool(&self) -> &WaitingPool {
        &self.pool
    }
}
