// Participant side: session protocol, relay transport and terminal front-end.

pub mod app;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod session;
pub mod terminal;
pub mod transport;

pub use config::ClientConfig;
pub use conversation::ConversationEntry;
pub use error::SessionError;
pub use events::SessionEvent;
pub use session::{Session, SessionState};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the log subscriber. Logs go to stderr so they do not interleave
/// with the conversation on stdout.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,sealtalk_client=info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
