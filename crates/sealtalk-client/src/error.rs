use sealtalk_shared::{CryptoError, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Already logged in")]
    AlreadyLoggedIn,

    #[error("Display name must not be empty")]
    EmptyName,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("No peer selected")]
    NoPeerSelected,

    #[error("Unknown peer: {0}")]
    UnknownPeer(UserId),

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Not connected to the relay")]
    TransportDisconnected,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
