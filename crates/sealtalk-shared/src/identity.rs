use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::constants::{FINGERPRINT_LEN, KDF_CONTEXT_FINGERPRINT, SECRET_KEY_SIZE};
use crate::crypto::{derive_shared_key, SharedKey};
use crate::envelope;
use crate::error::CryptoError;
use crate::protocol::Login;
use crate::types::{PeerRecord, UserId};

/// Rejection-sampling bound for the secret scalar; a uniformly random
/// 32-byte string is out of range with probability ~2^-32.
const KEYGEN_ATTEMPTS: usize = 8;

/// A participant's session identity: P-256 key pair, random id and
/// self-asserted display name.
///
/// Only the public half ever leaves the process.
#[derive(Clone)]
pub struct Identity {
    id: UserId,
    name: String,
    secret_key: SecretKey,
    public_key: Vec<u8>,
}

impl Identity {
    /// Generate a fresh identity from the OS random source.
    pub fn generate(name: impl Into<String>) -> Result<Self, CryptoError> {
        let secret_key = generate_secret_key()?;
        let public_key = secret_key
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        Ok(Self {
            id: UserId::new(),
            name: name.into(),
            secret_key,
            public_key,
        })
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed SEC1 encoding of the public key (65 bytes).
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }

    /// Base64 of [`Self::public_key_bytes`], as announced to the relay.
    pub fn public_key_encoded(&self) -> String {
        envelope::encode(&self.public_key)
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key)
    }

    /// Derive the key shared with the holder of `remote_public_key`.
    pub fn shared_key_with(&self, remote_public_key: &[u8]) -> Result<SharedKey, CryptoError> {
        derive_shared_key(&self.secret_key, remote_public_key)
    }

    /// The record other participants see in the roster.
    pub fn peer_record(&self) -> PeerRecord {
        PeerRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            public_key_encoded: self.public_key_encoded(),
        }
    }

    pub fn login_message(&self) -> Login {
        Login {
            id: self.id.clone(),
            name: self.name.clone(),
            public_key_encoded: self.public_key_encoded(),
        }
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

fn generate_secret_key() -> Result<SecretKey, CryptoError> {
    let mut seed = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
    for _ in 0..KEYGEN_ATTEMPTS {
        OsRng
            .try_fill_bytes(&mut seed[..])
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        if let Ok(secret_key) = SecretKey::from_slice(&seed[..]) {
            return Ok(secret_key);
        }
    }
    Err(CryptoError::KeyGeneration(
        "random source produced no valid scalar".to_string(),
    ))
}

/// Short, human-comparable digest of an encoded public key (BLAKE3).
pub fn fingerprint(public_key: &[u8]) -> String {
    let digest = blake3::derive_key(KDF_CONTEXT_FINGERPRINT, public_key);
    hex::encode(&digest[..FINGERPRINT_LEN])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::constants::PUBKEY_SIZE;

    #[test]
    fn test_identity_generation() {
        let id = Identity::generate("alice").unwrap();
        assert_eq!(id.name(), "alice");
        assert_eq!(id.public_key_bytes().len(), PUBKEY_SIZE);
        assert_eq!(id.public_key_bytes()[0], 0x04);
    }

    #[test]
    fn test_ids_do_not_collide() {
        let ids: HashSet<UserId> = (0..256)
            .map(|_| Identity::generate("x").unwrap().id().clone())
            .collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn test_public_key_roundtrips_through_encoding() {
        let id = Identity::generate("alice").unwrap();
        let decoded = envelope::decode(&id.public_key_encoded()).unwrap();
        assert_eq!(decoded, id.public_key_bytes());
        assert!(id.peer_record().has_valid_key());
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let id = Identity::generate("alice").unwrap();
        assert_eq!(id.fingerprint(), fingerprint(id.public_key_bytes()));
        assert_eq!(id.fingerprint().len(), FINGERPRINT_LEN * 2);

        let other = Identity::generate("alice").unwrap();
        assert_ne!(id.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_login_message_matches_identity() {
        let id = Identity::generate("bob").unwrap();
        let login = id.login_message();
        assert_eq!(&login.id, id.id());
        assert_eq!(login.name, "bob");
        assert_eq!(login.public_key_encoded, id.public_key_encoded());
    }

    #[test]
    fn test_debug_hides_secret() {
        let id = Identity::generate("carol").unwrap();
        let out = format!("{id:?}");
        assert!(out.contains("carol"));
        assert!(!out.contains("secret"));
    }
}
