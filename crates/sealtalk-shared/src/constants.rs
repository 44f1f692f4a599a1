/// Application name
pub const APP_NAME: &str = "Sealtalk";

/// AES-256-GCM nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Uncompressed SEC1 P-256 public key size in bytes
pub const PUBKEY_SIZE: usize = 65;

/// P-256 secret scalar size in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Symmetric key size in bytes (for AES-256-GCM)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Maximum WebSocket frame size accepted by the relay (256 KiB)
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// Default HTTP/WebSocket port of the relay
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Path of the WebSocket endpoint on the relay
pub const WS_PATH: &str = "/ws";

/// Key derivation context for public key fingerprints (BLAKE3)
pub const KDF_CONTEXT_FINGERPRINT: &str = "sealtalk-key-fingerprint-v1";

/// Number of fingerprint bytes shown to users
pub const FINGERPRINT_LEN: usize = 8;
