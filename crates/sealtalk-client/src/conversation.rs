use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use sealtalk_shared::UserId;

/// One decrypted (or locally sent) message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEntry {
    pub id: Uuid,
    pub from_name: String,
    pub to_name: String,
    pub plaintext: String,
    pub timestamp: DateTime<Utc>,
    /// `true` for messages we sent.
    pub is_self: bool,
}

/// Per-peer message logs, in arrival order.
#[derive(Debug, Default)]
pub struct Conversations {
    by_peer: HashMap<UserId, Vec<ConversationEntry>>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, peer_id: &UserId, entry: ConversationEntry) {
        self.by_peer.entry(peer_id.clone()).or_default().push(entry);
    }

    /// Entries exchanged with `peer_id`; empty if we never talked.
    pub fn get(&self, peer_id: &UserId) -> &[ConversationEntry] {
        self.by_peer.get(peer_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
