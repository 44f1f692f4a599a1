// End-to-end primitives shared by the relay and the participants.

pub mod constants;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod types;

pub use crypto::SharedKey;
pub use error::{CryptoError, ProtocolError};
pub use identity::Identity;
pub use protocol::{ClientMessage, Login, OutgoingEnvelope, RelayEnvelope, RelayMessage};
pub use types::{PeerRecord, UserId};
