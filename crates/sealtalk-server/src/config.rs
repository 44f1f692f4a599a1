//! Relay configuration loaded from environment variables.
//!
//! Every setting has a default so the relay starts with zero configuration
//! for local development.

use std::net::SocketAddr;

use sealtalk_shared::constants::DEFAULT_HTTP_PORT;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP/WebSocket listener.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// Human-readable name reported by `/info`.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Maximum number of concurrent WebSocket connections (0 = unlimited).
    /// Env: `MAX_CONNECTIONS`
    pub max_connections: usize,

    /// Frames buffered per connection before new ones are dropped.
    /// Env: `OUTBOUND_QUEUE`
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            instance_name: "Sealtalk Relay".to_string(),
            max_connections: 0,
            outbound_queue: 256,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            if !name.trim().is_empty() {
                config.instance_name = name;
            }
        }

        if let Some(val) = lookup("MAX_CONNECTIONS") {
            match val.parse::<usize>() {
                Ok(n) => config.max_connections = n,
                Err(_) => tracing::warn!(value = %val, "Invalid MAX_CONNECTIONS, using default"),
            }
        }

        if let Some(val) = lookup("OUTBOUND_QUEUE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.outbound_queue = n,
                _ => tracing::warn!(value = %val, "Invalid OUTBOUND_QUEUE, using default"),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    pub fn at_capacity(&self, connections: usize) -> bool {
        self.max_connections != 0 && connections >= self.max_connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert_eq!(config.instance_name, "Sealtalk Relay");
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.outbound_queue, 256);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("INSTANCE_NAME", "Lab"),
            ("MAX_CONNECTIONS", "2"),
            ("OUTBOUND_QUEUE", "8"),
        ]));
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.instance_name, "Lab");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.outbound_queue, 8);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("HTTP_ADDR", "not an address"),
            ("MAX_CONNECTIONS", "-1"),
            ("OUTBOUND_QUEUE", "0"),
        ]));
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.outbound_queue, 256);
    }

    #[test]
    fn test_at_capacity() {
        let mut config = ServerConfig::default();
        assert!(!config.at_capacity(10_000));
        config.max_connections = 2;
        assert!(!config.at_capacity(1));
        assert!(config.at_capacity(2));
    }
}
