//! Line-oriented terminal front-end.

use sealtalk_shared::types::ConnectionStatus;
use sealtalk_shared::{PeerRecord, UserId};

use crate::events::{SessionEvent, WireDirection, WireRecord};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/peers`
    ListPeers,
    /// `/select <n|name|id>`
    Select(String),
    /// `/wire`: show or hide envelopes as they cross the relay
    ToggleWire,
    /// `/quit`
    Quit,
    /// `/help` or an unknown slash command
    Help,
    /// Anything else: plaintext for the selected peer
    Say(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if !line.starts_with('/') {
            return Some(Command::Say(line.to_string()));
        }

        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let command = match head {
            "/peers" | "/users" => Command::ListPeers,
            "/select" if !rest.trim().is_empty() => Command::Select(rest.trim().to_string()),
            "/wire" => Command::ToggleWire,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Help,
        };
        Some(command)
    }
}

/// Resolve a `/select` argument: 1-based roster index, exact id, or
/// case-insensitive display name.
pub fn resolve_peer(peers: &[PeerRecord], query: &str) -> Option<UserId> {
    if let Ok(index) = query.parse::<usize>() {
        if let Some(peer) = index.checked_sub(1).and_then(|i| peers.get(i)) {
            return Some(peer.id.clone());
        }
    }
    peers
        .iter()
        .find(|p| p.id.as_str() == query)
        .or_else(|| peers.iter().find(|p| p.name.eq_ignore_ascii_case(query)))
        .map(|p| p.id.clone())
}

pub fn help() -> &'static str {
    "commands: /peers, /select <n|name>, /wire, /quit; anything else is sent to the selected peer"
}

pub fn format_peers(session: &Session) -> String {
    if session.peers().is_empty() {
        return "no one else is online".to_string();
    }
    let selected = session.selected_peer().map(|p| &p.id);
    session
        .peers()
        .iter()
        .enumerate()
        .map(|(i, peer)| {
            let marker = if Some(&peer.id) == selected { '*' } else { ' ' };
            format!(
                "{marker}{:>2}. {} [{}]",
                i + 1,
                peer.name,
                peer.fingerprint().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_wire(record: &WireRecord) -> String {
    let arrow = match record.direction {
        WireDirection::Outbound => ">>",
        WireDirection::Inbound => "<<",
    };
    format!(
        "{arrow} wire {} -> {} nonce={} ciphertext={}",
        record.from_name,
        record.to_id.short(),
        record.nonce,
        record.ciphertext
    )
}

/// Render one session event as a line of text, or `None` for events that
/// need no output. Wire records only show when `show_wire` is set.
pub fn render(event: &SessionEvent, session: &Session, show_wire: bool) -> Option<String> {
    match event {
        SessionEvent::Wire(record) => show_wire.then(|| format_wire(record)),
        SessionEvent::RosterUpdated(peers) => Some(format!("* {} peer(s) online", peers.len())),
        SessionEvent::PeerSelected(Some(peer)) => Some(format!(
            "* chatting with {} [{}]",
            peer.name,
            peer.fingerprint().unwrap_or_default()
        )),
        SessionEvent::PeerSelected(None) => Some("* no peer selected".to_string()),
        SessionEvent::MessageAppended { peer_id, entry } => {
            let time = entry.timestamp.format("%H:%M");
            if entry.is_self {
                Some(format!("[{time}] you -> {}: {}", entry.to_name, entry.plaintext))
            } else if session.selected_peer().map(|p| &p.id) == Some(peer_id) {
                Some(format!("[{time}] {}: {}", entry.from_name, entry.plaintext))
            } else {
                Some(format!(
                    "[{time}] {} (not selected): {}",
                    entry.from_name, entry.plaintext
                ))
            }
        }
        SessionEvent::DeliveryFailed { from_name, error, .. } => {
            Some(format!("! message from {from_name} dropped: {error}"))
        }
        SessionEvent::ConnectionChanged(ConnectionStatus::Connected) => {
            Some("* connected to relay".to_string())
        }
        SessionEvent::ConnectionChanged(ConnectionStatus::Disconnected) => {
            Some("* disconnected from relay, sending disabled".to_string())
        }
    }
}
