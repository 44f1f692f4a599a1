use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{PeerRecord, UserId};

/// Messages a participant sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Publish our identity
    Login(Login),

    /// Encrypted message for one peer
    Ciphertext(OutgoingEnvelope),
}

/// Messages the relay sends to participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayMessage {
    /// Full roster snapshot
    Users { users: Vec<PeerRecord> },

    /// Relay-stamped encrypted message
    Ciphertext(RelayEnvelope),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub id: UserId,
    pub name: String,
    #[serde(alias = "publicKeyBase64")]
    pub public_key_encoded: String,
}

impl From<Login> for PeerRecord {
    fn from(login: Login) -> Self {
        Self {
            id: login.id,
            name: login.name,
            public_key_encoded: login.public_key_encoded,
        }
    }
}

/// An encrypted message as submitted by its sender.
///
/// `nonce` and `ciphertext` are base64 text and are never decoded by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEnvelope {
    pub from_id: UserId,
    pub to_id: UserId,
    pub from_name: String,
    #[serde(alias = "ivBase64")]
    pub nonce: String,
    #[serde(alias = "ciphertextBase64")]
    pub ciphertext: String,
}

/// An encrypted message as delivered by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
    pub from_id: UserId,
    pub to_id: UserId,
    pub from_name: String,
    #[serde(alias = "ivBase64")]
    pub nonce: String,
    #[serde(alias = "ciphertextBase64")]
    pub ciphertext: String,
    /// Sender key as recorded in the relay roster, not as claimed by the sender.
    #[serde(alias = "fromPublicKeyBase64")]
    pub from_public_key_encoded: String,
    /// Relay clock, Unix epoch millis.
    pub created_at: i64,
}

impl RelayEnvelope {
    /// Copy the sender-asserted fields verbatim and add the relay's stamp.
    pub fn stamp(envelope: OutgoingEnvelope, from_public_key_encoded: String, created_at: i64) -> Self {
        Self {
            from_id: envelope.from_id,
            to_id: envelope.to_id,
            from_name: envelope.from_name,
            nonce: envelope.nonce,
            ciphertext: envelope.ciphertext,
            from_public_key_encoded,
            created_at,
        }
    }
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
    }
}

impl RelayMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outgoing() -> OutgoingEnvelope {
        OutgoingEnvelope {
            from_id: UserId::from("alice-id"),
            to_id: UserId::from("bob-id"),
            from_name: "Alice".into(),
            nonce: "AAECAwQFBgcICQoL".into(),
            ciphertext: "c2VhbGVk".into(),
        }
    }

    #[test]
    fn test_login_wire_format() {
        let msg = ClientMessage::Login(Login {
            id: UserId::from("u1"),
            name: "Alice".into(),
            public_key_encoded: "BPub".into(),
        });
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "login");
        assert_eq!(value["id"], "u1");
        assert_eq!(value["name"], "Alice");
        assert_eq!(value["publicKeyEncoded"], "BPub");
    }

    #[test]
    fn test_users_wire_format() {
        let msg = RelayMessage::Users {
            users: vec![PeerRecord {
                id: UserId::from("u1"),
                name: "Alice".into(),
                public_key_encoded: "BPub".into(),
            }],
        };
        let json = msg.to_json().unwrap();
        assert!(json.starts_with(r#"{"type":"users","users":["#));
        assert_eq!(RelayMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_stamp_preserves_sender_fields() {
        let original = outgoing();
        let stamped = RelayEnvelope::stamp(original.clone(), "BKey".into(), 1_700_000_000_000);
        assert_eq!(stamped.from_id, original.from_id);
        assert_eq!(stamped.to_id, original.to_id);
        assert_eq!(stamped.from_name, original.from_name);
        assert_eq!(stamped.nonce, original.nonce);
        assert_eq!(stamped.ciphertext, original.ciphertext);

        let value: serde_json::Value =
            serde_json::from_str(&RelayMessage::Ciphertext(stamped).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "ciphertext");
        assert_eq!(value["fromPublicKeyEncoded"], "BKey");
        assert_eq!(value["createdAt"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_accepts_browser_field_names() {
        let json = r#"{"type":"ciphertext","fromId":"a","toId":"b","fromName":"A",
            "ivBase64":"bm9uY2U=","ciphertextBase64":"Y3Q="}"#;
        match ClientMessage::from_json(json).unwrap() {
            ClientMessage::Ciphertext(env) => {
                assert_eq!(env.nonce, "bm9uY2U=");
                assert_eq!(env.ciphertext, "Y3Q=");
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let login = r#"{"type":"login","id":"a","name":"A","publicKeyBase64":"BPub"}"#;
        assert!(matches!(
            ClientMessage::from_json(login).unwrap(),
            ClientMessage::Login(Login { ref public_key_encoded, .. }) if public_key_encoded == "BPub"
        ));
    }

    #[test]
    fn test_browser_field_names_are_input_only() {
        let stamped = RelayEnvelope::stamp(outgoing(), "BKey".into(), 0);
        let json = RelayMessage::Ciphertext(stamped).to_json().unwrap();
        for browser_name in ["ivBase64", "ciphertextBase64", "fromPublicKeyBase64"] {
            assert!(!json.contains(browser_name), "{browser_name} in {json}");
        }
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nonce"], "AAECAwQFBgcICQoL");
        assert_eq!(value["ciphertext"], "c2VhbGVk");
    }

    #[test]
    fn test_unknown_or_broken_messages_are_malformed() {
        for raw in [
            "not json",
            "{}",
            r#"{"type":"shout","text":"hi"}"#,
            r#"{"type":"login","id":"a"}"#,
            r#"{"type":"users","users":[]}"#,
        ] {
            assert!(matches!(
                ClientMessage::from_json(raw),
                Err(ProtocolError::MalformedMessage(_))
            ));
        }

        // a client-originated envelope lacks the relay stamp
        let unstamped = ClientMessage::Ciphertext(outgoing()).to_json().unwrap();
        assert!(RelayMessage::from_json(&unstamped).is_err());
    }
}
