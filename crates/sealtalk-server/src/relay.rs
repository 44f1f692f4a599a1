//! Roster and message routing.
//!
//! [`RelaySession`] owns every live connection: its outbound queue and the
//! login it announced, if any. Roster changes and deliveries happen under a
//! single lock, so every connection sees roster broadcasts in the same order
//! and never a partially updated roster.
//!
//! The relay is blind: envelope `nonce` and `ciphertext` are forwarded as the
//! exact strings received and are never decoded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use sealtalk_shared::{ClientMessage, Login, OutgoingEnvelope, PeerRecord, RelayEnvelope, RelayMessage};

use crate::error::ServerError;

/// Opaque id of one WebSocket connection. Handles increase monotonically, so
/// map order is connection order.
pub type ConnectionHandle = u64;

struct Connection {
    tx: mpsc::Sender<String>,
    peer: Option<PeerRecord>,
}

#[derive(Clone)]
pub struct RelaySession {
    connections: Arc<Mutex<BTreeMap<ConnectionHandle, Connection>>>,
    next_handle: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl RelaySession {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Arc::new(Mutex::new(BTreeMap::new())),
            next_handle: Arc::new(AtomicU64::new(1)),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a fresh connection. It has no roster entry until it logs in.
    /// The receiver yields the text frames to write to the socket.
    pub async fn connect(&self) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let mut connections = self.connections.lock().await;
        connections.insert(handle, Connection { tx, peer: None });
        debug!(handle, connections = connections.len(), "Connection opened");

        (handle, rx)
    }

    /// Parse and dispatch one inbound text frame.
    pub async fn handle_frame(&self, handle: ConnectionHandle, text: &str) -> Result<(), ServerError> {
        match ClientMessage::from_json(text)? {
            ClientMessage::Login(login) => self.login(handle, login).await,
            ClientMessage::Ciphertext(envelope) => self.forward(handle, envelope).await,
        }
    }

    /// Record (or replace) the login for `handle` and broadcast the roster.
    pub async fn login(&self, handle: ConnectionHandle, login: Login) -> Result<(), ServerError> {
        let mut connections = self.connections.lock().await;
        let Some(connection) = connections.get_mut(&handle) else {
            debug!(handle, "Login from a closed connection");
            return Ok(());
        };

        info!(handle, id = %login.id, name = %login.name, "Participant logged in");
        connection.peer = Some(PeerRecord::from(login));

        broadcast_roster(&connections)
    }

    /// Stamp an envelope with the sender's announced key and the relay clock,
    /// then deliver it to every connection claiming `toId` or `fromId`.
    pub async fn forward(&self, handle: ConnectionHandle, envelope: OutgoingEnvelope) -> Result<(), ServerError> {
        let connections = self.connections.lock().await;

        let Some(sender) = connections.get(&handle).and_then(|c| c.peer.as_ref()) else {
            warn!(handle, "Dropping ciphertext from a connection that has not logged in");
            return Ok(());
        };

        let stamped = RelayEnvelope::stamp(
            envelope,
            sender.public_key_encoded.clone(),
            chrono::Utc::now().timestamp_millis(),
        );
        let (from_id, to_id) = (stamped.from_id.clone(), stamped.to_id.clone());
        let frame = RelayMessage::Ciphertext(stamped)
            .to_json()
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        let mut delivered = 0usize;
        for (target, connection) in connections.iter() {
            let Some(peer) = &connection.peer else { continue };
            if peer.id != to_id && peer.id != from_id {
                continue;
            }
            if enqueue(*target, connection, frame.clone()) {
                delivered += 1;
            }
        }

        debug!(
            from = %from_id.short(),
            to = %to_id.short(),
            bytes = frame.len(),
            delivered,
            "Forwarded ciphertext"
        );
        Ok(())
    }

    /// Remove `handle`. If it had logged in, the remaining connections get
    /// the updated roster.
    pub async fn disconnect(&self, handle: ConnectionHandle) {
        let mut connections = self.connections.lock().await;
        let Some(connection) = connections.remove(&handle) else {
            return;
        };

        debug!(handle, connections = connections.len(), "Connection closed");
        if let Some(peer) = connection.peer {
            info!(handle, id = %peer.id, name = %peer.name, "Participant left");
            if let Err(e) = broadcast_roster(&connections) {
                warn!(error = %e, "Failed to broadcast roster after disconnect");
            }
        }
    }

    /// Logged-in participants in connection order.
    pub async fn roster(&self) -> Vec<PeerRecord> {
        roster_of(&*self.connections.lock().await)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn participant_count(&self) -> usize {
        self.connections
            .lock()
            .await
            .values()
            .filter(|c| c.peer.is_some())
            .count()
    }
}

fn roster_of(connections: &BTreeMap<ConnectionHandle, Connection>) -> Vec<PeerRecord> {
    connections.values().filter_map(|c| c.peer.clone()).collect()
}

/// Send the full roster to every connected handle, logged in or not.
fn broadcast_roster(connections: &BTreeMap<ConnectionHandle, Connection>) -> Result<(), ServerError> {
    let users = roster_of(connections);
    let count = users.len();
    let frame = RelayMessage::Users { users }
        .to_json()
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    for (handle, connection) in connections.iter() {
        enqueue(*handle, connection, frame.clone());
    }
    debug!(participants = count, connections = connections.len(), "Broadcast roster");
    Ok(())
}

/// Non-blocking enqueue; a full or closed queue drops the frame.
fn enqueue(handle: ConnectionHandle, connection: &Connection, frame: String) -> bool {
    match connection.tx.try_send(frame) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!(handle, "Dropping frame for slow connection");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
