//! Waiting pool
//!
//! Join requests that found no partner, partitioned by interest tag.
//! Each interest keeps its own FIFO queue; empty queues are dropped.

use std::collections::{HashMap, VecDeque};

use crate::types::ClientId;

/// A queued join request
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingEntry {
    /// Name shown to the eventual partner
    pub display_name: String,
    /// Interest tag the client asked to be matched on
    pub interest: String,
    /// Connection waiting for a partner
    pub client_id: ClientId,
}

impl WaitingEntry {
    pub fn new(display_name: String, interest: String, client_id: ClientId) -> Self {
        Self {
            display_name,
            interest,
            client_id,
        }
    }
}

/// Interest tag → queue of waiting entries (arrival order)
#[derive(Debug, Default)]
pub struct WaitingPool {
    queues: HashMap<String, VecDeque<WaitingEntry>>,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the back of its interest queue
    pub fn push(&mut self, entry: WaitingEntry) {
        self.queues
            .entry(entry.interest.clone())
            .or_default()
            .push_back(entry);
    }

    /// Remove and return the earliest entry for `interest` that does not
    /// belong to `requester`.
    pub fn take_first_except(&mut self, interest: &str, requester: ClientId) -> Option<WaitingEntry> {
        let queue = self.queues.get_mut(interest)?;
        let pos = queue.iter().position(|e| e.client_id != requester)?;
        let entry = queue.remove(pos);

        if queue.is_empty() {
            self.queues.remove(interest);
        }

        entry
    }

    /// Remove every entry belonging to `client_id` across all interests
    ///
    /// Returns the number of entries removed (zero if the client was not queued).
    pub fn remove_client(&mut self, client_id: ClientId) -> usize {
        let mut removed = 0;

        self.queues.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|e| e.client_id != client_id);
            removed += before - queue.len();
            !queue.is_empty()
        });

        removed
    }

    /// Check if a client has an entry in any queue
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.interest_of(client_id).is_some()
    }

    /// Interest under which a client is waiting
    pub fn interest_of(&self, client_id: ClientId) -> Option<&str> {
        self.queues
            .values()
            .flatten()
            .find(|e| e.client_id == client_id)
            .map(|e| e.interest.as_str())
    }

    /// Number of entries waiting on `interest`
    pub fn queue_len(&self, interest: &str) -> usize {
        self.queues.get(interest).map_or(0, VecDeque::len)
    }

    /// Total number of waiting entries
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Iterate over every waiting entry
    pub fn entries(&self) -> impl Iterator<Item = &WaitingEntry> {
        self.queues.values().flatten()
    }
}
