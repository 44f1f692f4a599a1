//! Envelope codec.
//!
//! Binds the key deriver and the AEAD to the wire records of
//! [`crate::protocol`]: byte fields travel as standard (padded) base64,
//! the same alphabet browsers produce with `btoa`.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::crypto;
use crate::error::{CryptoError, ProtocolError};
use crate::identity::Identity;
use crate::protocol::{OutgoingEnvelope, RelayEnvelope};
use crate::types::PeerRecord;

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(text: &str) -> Result<Vec<u8>, ProtocolError> {
    STANDARD.decode(text).map_err(|_| ProtocolError::InvalidEncoding)
}

/// Encrypt `plaintext` for `peer` under a freshly derived key.
pub fn seal(
    identity: &Identity,
    peer: &PeerRecord,
    plaintext: &str,
) -> Result<OutgoingEnvelope, CryptoError> {
    let peer_key = peer.public_key_bytes()?;
    let key = identity.shared_key_with(&peer_key)?;
    let sealed = crypto::encrypt(&key, plaintext.as_bytes())?;

    Ok(OutgoingEnvelope {
        from_id: identity.id().clone(),
        to_id: peer.id.clone(),
        from_name: identity.name().to_string(),
        nonce: encode(&sealed.nonce),
        ciphertext: encode(&sealed.ciphertext),
    })
}

/// Decrypt an envelope addressed to `identity`, using the sender key the
/// relay attached.
pub fn open(identity: &Identity, envelope: &RelayEnvelope) -> Result<String, CryptoError> {
    let sender_key =
        decode(&envelope.from_public_key_encoded).map_err(|_| CryptoError::InvalidPeerKey)?;
    let key = identity.shared_key_with(&sender_key)?;

    let nonce = decode(&envelope.nonce).map_err(|_| CryptoError::DecryptionFailed)?;
    let ciphertext = decode(&envelope.ciphertext).map_err(|_| CryptoError::DecryptionFailed)?;
    let plaintext = crypto::decrypt(&key, &nonce, &ciphertext)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NONCE_SIZE;

    fn deliver(envelope: OutgoingEnvelope, sender: &Identity) -> RelayEnvelope {
        RelayEnvelope::stamp(envelope, sender.public_key_encoded(), 1_700_000_000_000)
    }

    #[test]
    fn test_base64_roundtrip_including_empty() {
        for bytes in [&b""[..], b"\x00", b"\xff\xfe\xfd", b"hello world"] {
            assert_eq!(decode(&encode(bytes)).unwrap(), bytes);
        }
        assert_eq!(encode(b""), "");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(decode("***").is_err());
        assert!(decode("abc").is_err());
    }

    #[test]
    fn test_seal_open_between_two_identities() {
        let alice = Identity::generate("Alice").unwrap();
        let bob = Identity::generate("Bob").unwrap();

        let envelope = seal(&alice, &bob.peer_record(), "hello").unwrap();
        assert_eq!(&envelope.from_id, alice.id());
        assert_eq!(&envelope.to_id, bob.id());
        assert_eq!(envelope.from_name, "Alice");
        assert_eq!(decode(&envelope.nonce).unwrap().len(), NONCE_SIZE);
        assert!(!envelope.ciphertext.contains("hello"));

        let opened = open(&bob, &deliver(envelope, &alice)).unwrap();
        assert_eq!(opened, "hello");
    }

    #[test]
    fn test_third_party_cannot_open() {
        let alice = Identity::generate("Alice").unwrap();
        let bob = Identity::generate("Bob").unwrap();
        let eve = Identity::generate("Eve").unwrap();

        let envelope = seal(&alice, &bob.peer_record(), "for bob only").unwrap();
        assert_eq!(
            open(&eve, &deliver(envelope, &alice)),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_substituted_sender_key_fails() {
        let alice = Identity::generate("Alice").unwrap();
        let bob = Identity::generate("Bob").unwrap();
        let mallory = Identity::generate("Mallory").unwrap();

        let envelope = seal(&alice, &bob.peer_record(), "hi").unwrap();
        let forged = RelayEnvelope::stamp(envelope, mallory.public_key_encoded(), 0);
        assert_eq!(open(&bob, &forged), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_corrupted_fields_are_reported() {
        let alice = Identity::generate("Alice").unwrap();
        let bob = Identity::generate("Bob").unwrap();
        let delivered = deliver(seal(&alice, &bob.peer_record(), "hi").unwrap(), &alice);

        let mut bad_key = delivered.clone();
        bad_key.from_public_key_encoded = encode(&[0x04; 65]);
        assert_eq!(open(&bob, &bad_key), Err(CryptoError::InvalidPeerKey));

        let mut bad_nonce = delivered.clone();
        bad_nonce.nonce = "%%%".into();
        assert_eq!(open(&bob, &bad_nonce), Err(CryptoError::DecryptionFailed));

        let mut bad_ciphertext = delivered;
        bad_ciphertext.ciphertext = encode(b"too short");
        assert_eq!(open(&bob, &bad_ciphertext), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_seal_rejects_invalid_peer_key() {
        let alice = Identity::generate("Alice").unwrap();
        let peer = PeerRecord {
            id: "p".into(),
            name: "P".into(),
            public_key_encoded: "bm90IGEga2V5".into(),
        };
        assert_eq!(seal(&alice, &peer, "x"), Err(CryptoError::InvalidPeerKey));
    }
}
