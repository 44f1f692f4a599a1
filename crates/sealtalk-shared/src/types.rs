use serde::{Deserialize, Serialize};

use crate::crypto::import_public_key;
use crate::envelope;
use crate::error::CryptoError;
use crate::identity::fingerprint;

// Self-asserted participant id. Opaque: browser clients send UUID strings,
// nothing else is assumed about the format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A participant as announced in the relay's roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub id: UserId,
    pub name: String,
    /// Base64 of the uncompressed SEC1 public key.
    #[serde(alias = "publicKeyBase64")]
    pub public_key_encoded: String,
}

impl PeerRecord {
    /// Decode and import the advertised key, rejecting anything that is not
    /// a valid P-256 point.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let bytes =
            envelope::decode(&self.public_key_encoded).map_err(|_| CryptoError::InvalidPeerKey)?;
        import_public_key(&bytes)?;
        Ok(bytes)
    }

    pub fn has_valid_key(&self) -> bool {
        self.public_key_bytes().is_ok()
    }

    /// Short fingerprint of the advertised key, or `None` if it is invalid.
    pub fn fingerprint(&self) -> Option<String> {
        self.public_key_bytes().ok().map(|bytes| fingerprint(&bytes))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}
