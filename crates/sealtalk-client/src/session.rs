//! Participant-side protocol state machine.
//!
//! The session performs no I/O. Callers feed it relay frames and user
//! actions, send whatever [`ClientMessage`] it hands back, and drain
//! [`SessionEvent`]s for display.
//!
//! ```text
//! Unauthenticated --login--> AwaitingRoster --users--> Ready
//!                                  ^                     |
//!                                  +----- reconnect -----+
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sealtalk_shared::envelope;
use sealtalk_shared::types::ConnectionStatus;
use sealtalk_shared::{
    ClientMessage, CryptoError, Identity, PeerRecord, RelayEnvelope, RelayMessage, UserId,
};

use crate::conversation::{ConversationEntry, Conversations};
use crate::error::SessionError;
use crate::events::{SessionEvent, WireRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AwaitingRoster,
    Ready,
}

/// An inbound envelope addressed to us, waiting to be decrypted.
///
/// Holds everything the decryption needs so it can run off the event loop.
pub struct PendingDecrypt {
    identity: Arc<Identity>,
    envelope: RelayEnvelope,
}

impl PendingDecrypt {
    pub fn run(self) -> DecryptOutcome {
        let result = envelope::open(&self.identity, &self.envelope);
        DecryptOutcome {
            envelope: self.envelope,
            result,
        }
    }
}

pub struct DecryptOutcome {
    envelope: RelayEnvelope,
    result: Result<String, CryptoError>,
}

pub struct Session {
    state: SessionState,
    identity: Option<Arc<Identity>>,
    peers: Vec<PeerRecord>,
    selected: Option<UserId>,
    conversations: Conversations,
    status: ConnectionStatus,
    events: VecDeque<SessionEvent>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            identity: None,
            peers: Vec::new(),
            selected: None,
            conversations: Conversations::new(),
            status: ConnectionStatus::Disconnected,
            events: VecDeque::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_deref()
    }

    /// Visible peers (never includes ourselves).
    pub fn peers(&self) -> &[PeerRecord] {
        &self.peers
    }

    pub fn peer(&self, id: &UserId) -> Option<&PeerRecord> {
        self.peers.iter().find(|p| &p.id == id)
    }

    pub fn selected_peer(&self) -> Option<&PeerRecord> {
        self.selected.as_ref().and_then(|id| self.peer(id))
    }

    pub fn conversation(&self, peer_id: &UserId) -> &[ConversationEntry] {
        self.conversations.get(peer_id)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    // -----------------------------------------------------------------------
    // Login / connectivity
    // -----------------------------------------------------------------------

    /// Create the session identity and return the login message announcing it.
    pub fn login(&mut self, name: &str) -> Result<ClientMessage, SessionError> {
        if self.state != SessionState::Unauthenticated {
            return Err(SessionError::AlreadyLoggedIn);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        let identity = Identity::generate(name)?;
        info!(
            id = %identity.id(),
            fingerprint = %identity.fingerprint(),
            "Created session identity"
        );

        let login = ClientMessage::Login(identity.login_message());
        self.identity = Some(Arc::new(identity));
        self.state = SessionState::AwaitingRoster;
        Ok(login)
    }

    /// The transport (re)connected. Returns the login to publish again, if
    /// an identity exists.
    pub fn on_connected(&mut self) -> Option<ClientMessage> {
        self.set_status(ConnectionStatus::Connected);
        let identity = self.identity.as_ref()?;
        self.state = SessionState::AwaitingRoster;
        Some(ClientMessage::Login(identity.login_message()))
    }

    pub fn on_disconnected(&mut self) {
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.status = status;
            self.events.push_back(SessionEvent::ConnectionChanged(status));
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Handle one raw relay frame. Returns a decryption job when the frame is
    /// an envelope we must open.
    pub fn handle_frame(&mut self, text: &str) -> Option<PendingDecrypt> {
        match RelayMessage::from_json(text) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                debug!(error = %e, "Discarding malformed relay frame");
                None
            }
        }
    }

    pub fn handle_message(&mut self, message: RelayMessage) -> Option<PendingDecrypt> {
        match message {
            RelayMessage::Users { users } => {
                self.apply_roster(users);
                None
            }
            RelayMessage::Ciphertext(envelope) => self.accept_envelope(envelope),
        }
    }

    /// Replace the peer set with a roster snapshot.
    pub fn apply_roster(&mut self, users: Vec<PeerRecord>) {
        let Some(me) = self.identity.clone() else {
            debug!("Ignoring roster received before login");
            return;
        };

        self.peers = users
            .into_iter()
            .filter(|user| &user.id != me.id())
            .filter(|user| {
                let valid = user.has_valid_key();
                if !valid {
                    warn!(peer = %user.id, name = %user.name, "Dropping peer with invalid public key");
                }
                valid
            })
            .collect();
        self.state = SessionState::Ready;

        debug!(peers = self.peers.len(), "Roster updated");
        self.events
            .push_back(SessionEvent::RosterUpdated(self.peers.clone()));

        if let Some(selected) = &self.selected {
            if self.peer(selected).is_none() {
                debug!(peer = %selected, "Selected peer left");
                self.selected = None;
                self.events.push_back(SessionEvent::PeerSelected(None));
            }
        }

        if self.selected.is_none() {
            if let Some(first) = self.peers.first().cloned() {
                self.selected = Some(first.id.clone());
                self.events.push_back(SessionEvent::PeerSelected(Some(first)));
            }
        }
    }

    /// Decide what to do with a relay-stamped envelope.
    ///
    /// Envelopes not involving us are ignored. Anything to or from us is
    /// reported as a wire record; echoes of our own messages stop there
    /// (they were recorded when sent).
    pub fn accept_envelope(&mut self, envelope: RelayEnvelope) -> Option<PendingDecrypt> {
        let me = self.identity.clone()?;
        let to_me = &envelope.to_id == me.id();
        let from_me = &envelope.from_id == me.id();

        if !to_me && !from_me {
            debug!(
                from = %envelope.from_id,
                to = %envelope.to_id,
                "Ignoring envelope not addressed to us"
            );
            return None;
        }

        self.events
            .push_back(SessionEvent::Wire(WireRecord::inbound(&envelope)));

        if to_me {
            Some(PendingDecrypt {
                identity: me,
                envelope,
            })
        } else {
            debug!(to = %envelope.to_id, "Relay echoed our own message");
            None
        }
    }

    /// Record the result of a decryption job.
    pub fn complete(&mut self, outcome: DecryptOutcome) {
        let DecryptOutcome { envelope, result } = outcome;
        let peer_id = envelope.from_id.clone();

        match result {
            Ok(plaintext) => {
                let to_name = self
                    .identity
                    .as_ref()
                    .map(|me| me.name().to_string())
                    .unwrap_or_default();
                let entry = ConversationEntry {
                    id: Uuid::new_v4(),
                    from_name: envelope.from_name,
                    to_name,
                    plaintext,
                    timestamp: DateTime::from_timestamp_millis(envelope.created_at)
                        .unwrap_or_else(Utc::now),
                    is_self: false,
                };
                debug!(from = %peer_id, "Decrypted incoming message");
                self.append(peer_id, entry);
            }
            Err(error) => {
                warn!(from = %peer_id, error = %error, "Dropping envelope that failed to open");
                self.events.push_back(SessionEvent::DeliveryFailed {
                    peer_id,
                    from_name: envelope.from_name,
                    error,
                });
            }
        }
    }

    /// Accept, decrypt and record an envelope in one step.
    pub fn receive(&mut self, envelope: RelayEnvelope) {
        if let Some(pending) = self.accept_envelope(envelope) {
            let outcome = pending.run();
            self.complete(outcome);
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    pub fn select_peer(&mut self, id: &UserId) -> Result<(), SessionError> {
        let peer = self
            .peer(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownPeer(id.clone()))?;
        self.selected = Some(peer.id.clone());
        self.events.push_back(SessionEvent::PeerSelected(Some(peer)));
        Ok(())
    }

    /// Encrypt `text` for the selected peer, record it locally and return
    /// the envelope to hand to the transport.
    pub fn send(&mut self, text: &str) -> Result<ClientMessage, SessionError> {
        let me = self.identity.clone().ok_or(SessionError::NotLoggedIn)?;
        if !self.is_connected() {
            return Err(SessionError::TransportDisconnected);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let peer = self.selected_peer().cloned().ok_or(SessionError::NoPeerSelected)?;

        let outgoing = envelope::seal(&me, &peer, text)?;

        let entry = ConversationEntry {
            id: Uuid::new_v4(),
            from_name: me.name().to_string(),
            to_name: peer.name.clone(),
            plaintext: text.to_string(),
            timestamp: Utc::now(),
            is_self: true,
        };
        self.append(peer.id.clone(), entry);
        self.events
            .push_back(SessionEvent::Wire(WireRecord::outbound(&outgoing)));

        debug!(
            to = %peer.id,
            ciphertext_len = outgoing.ciphertext.len(),
            "Sealed outgoing message"
        );
        Ok(ClientMessage::Ciphertext(outgoing))
    }

    fn append(&mut self, peer_id: UserId, entry: ConversationEntry) {
        self.conversations.append(&peer_id, entry.clone());
        self.events
            .push_back(SessionEvent::MessageAppended { peer_id, entry });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
