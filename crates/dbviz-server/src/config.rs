//! Server configuration from environment variables.
//!
//! - `DBVIZ_BIND`: listen address (default `0.0.0.0`)
//! - `DBVIZ_PORT`: listen port (default `8080`)
//! - `DBVIZ_TICK_MS`: autoplay interval at speed 1.0 (default `1000`)
//!
//! An unparseable value falls back to its default with a warning.

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TICK_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub tick: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring {}={:?}: not a valid value", key, raw);
            default
        }),
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let tick_ms = parsed(&lookup, "DBVIZ_TICK_MS", DEFAULT_TICK_MS);
        let tick_ms = if tick_ms == 0 {
            tracing::warn!("ignoring DBVIZ_TICK_MS=0: interval must be positive");
            DEFAULT_TICK_MS
        } else {
            tick_ms
        };
        ServerConfig {
            bind: lookup("DBVIZ_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: parsed(&lookup, "DBVIZ_PORT", DEFAULT_PORT),
            tick: Duration::from_millis(tick_ms),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(from(&[]), ServerConfig::default());
        assert_eq!(ServerConfig::default().addr(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_overrides() {
        let config = from(&[("DBVIZ_PORT", "9000"), ("DBVIZ_BIND", "127.0.0.1"), ("DBVIZ_TICK_MS", "250")]);
        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.tick, Duration::from_millis(250));
    }

    #[test]
    fn bad_values_fall_back() {
        let config = from(&[("DBVIZ_PORT", "eighty"), ("DBVIZ_TICK_MS", "0")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.tick, Duration::from_millis(DEFAULT_TICK_MS));
    }
}
