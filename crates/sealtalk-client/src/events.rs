use sealtalk_shared::types::ConnectionStatus;
use sealtalk_shared::{CryptoError, OutgoingEnvelope, PeerRecord, RelayEnvelope, UserId};

use crate::conversation::ConversationEntry;

/// Notifications for the front-end, drained from the session after each
/// operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Peers currently online, self excluded, in roster order.
    RosterUpdated(Vec<PeerRecord>),

    /// Selection changed (auto-selected, cleared, or picked by the user).
    PeerSelected(Option<PeerRecord>),

    /// A new entry was appended to the conversation with `peer_id`.
    MessageAppended {
        peer_id: UserId,
        entry: ConversationEntry,
    },

    /// An envelope from `from_name` could not be opened and was dropped.
    DeliveryFailed {
        peer_id: UserId,
        from_name: String,
        error: CryptoError,
    },

    ConnectionChanged(ConnectionStatus),

    /// An envelope crossed the relay. Ciphertext only, never plaintext.
    Wire(WireRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireDirection {
    Outbound,
    Inbound,
}

/// The relay-visible fields of one envelope, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRecord {
    pub direction: WireDirection,
    pub from_id: UserId,
    pub from_name: String,
    pub to_id: UserId,
    pub nonce: String,
    pub ciphertext: String,
}

impl WireRecord {
    pub fn outbound(envelope: &OutgoingEnvelope) -> Self {
        Self {
            direction: WireDirection::Outbound,
            from_id: envelope.from_id.clone(),
            from_name: envelope.from_name.clone(),
            to_id: envelope.to_id.clone(),
            nonce: envelope.nonce.clone(),
            ciphertext: envelope.ciphertext.clone(),
        }
    }

    pub fn inbound(envelope: &RelayEnvelope) -> Self {
        Self {
            direction: WireDirection::Inbound,
            from_id: envelope.from_id.clone(),
            from_name: envelope.from_name.clone(),
            to_id: envelope.to_id.clone(),
            nonce: envelope.nonce.clone(),
            ciphertext: envelope.ciphertext.clone(),
        }
    }
}
