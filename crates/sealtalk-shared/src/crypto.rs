use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use p256::{ecdh, PublicKey, SecretKey};
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::constants::{NONCE_SIZE, SYMMETRIC_KEY_SIZE};
use crate::error::CryptoError;

/// Symmetric key agreed between one ordered pair of participants.
///
/// Lives for a single encrypt or decrypt call. It cannot be serialized,
/// its `Debug` output is redacted and the bytes are wiped on drop.
pub struct SharedKey(Zeroizing<[u8; SYMMETRIC_KEY_SIZE]>);

impl SharedKey {
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for SharedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey([redacted])")
    }
}

/// Nonce and ciphertext (with the GCM tag appended) of one sealed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Import a SEC1-encoded P-256 public key, rejecting off-curve points.
pub fn import_public_key(encoded: &[u8]) -> Result<PublicKey, CryptoError> {
    PublicKey::from_sec1_bytes(encoded).map_err(|_| CryptoError::InvalidPeerKey)
}

/// ECDH between our secret and the peer's encoded public key.
///
/// The 32-byte shared x-coordinate is used directly as the AES-256-GCM key,
/// matching WebCrypto's `deriveKey(ECDH -> AES-GCM 256)`.
pub fn derive_shared_key(
    local_secret: &SecretKey,
    remote_public_encoded: &[u8],
) -> Result<SharedKey, CryptoError> {
    let remote = import_public_key(remote_public_encoded)?;
    let shared = ecdh::diffie_hellman(local_secret.to_nonzero_scalar(), remote.as_affine());

    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    key.copy_from_slice(shared.raw_secret_bytes().as_slice());
    Ok(SharedKey(key))
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

pub fn encrypt(key: &SharedKey, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::EncryptionFailed)?;
    let nonce = generate_nonce();

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok(Sealed { nonce, ciphertext })
}

pub fn decrypt(key: &SharedKey, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::DecryptionFailed)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}
