//! Client configuration loaded from environment variables.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the relay.
    /// Env: `RELAY_URL`
    /// Default: `ws://127.0.0.1:3000/ws`
    pub relay_url: String,

    /// Display name announced at login. Prompted on stdin when unset.
    /// Env: `SEALTALK_NAME`
    pub display_name: Option<String>,

    /// Pause between reconnection attempts.
    /// Env: `RECONNECT_DELAY_SECS`
    /// Default: `3`
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:3000/ws".to_string(),
            display_name: None,
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("RELAY_URL") {
            if url.starts_with("ws://") || url.starts_with("wss://") {
                config.relay_url = url;
            } else {
                tracing::warn!(value = %url, "Invalid RELAY_URL, using default");
            }
        }

        if let Some(name) = lookup("SEALTALK_NAME") {
            if !name.trim().is_empty() {
                config.display_name = Some(name.trim().to_string());
            }
        }

        if let Some(val) = lookup("RECONNECT_DELAY_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.reconnect_delay = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid RECONNECT_DELAY_SECS, using default"),
            }
        }

        config
    }
}
