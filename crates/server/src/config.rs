// crates/server/src/config.rs
//! Transport configuration. Read from environment variables one field at a
//! time, each falling back to a fixed default — plain "env var, parse,
//! fallback to const", rather than pulled in through a config crate.

use std::net::IpAddr;

const DEFAULT_PORT: u16 = 9090;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_BUFFER_SIZE: usize = 10_000;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub host: IpAddr,
    pub port: u16,
    pub buffer_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.parse().expect("default host is a valid IP"),
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl TransportConfig {
    /// Reads `RUNTIMESCOPE_HOST`, `RUNTIMESCOPE_PORT`, `RUNTIMESCOPE_BUFFER_SIZE`,
    /// `RUNTIMESCOPE_MAX_RETRIES`, `RUNTIMESCOPE_RETRY_DELAY_MS`, falling back
    /// to the defaults below for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_parsed("RUNTIMESCOPE_HOST").unwrap_or(defaults.host),
            port: env_parsed("RUNTIMESCOPE_PORT").unwrap_or(defaults.port),
            buffer_size: env_parsed("RUNTIMESCOPE_BUFFER_SIZE").unwrap_or(defaults.buffer_size),
            max_retries: env_parsed("RUNTIMESCOPE_MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay_ms: env_parsed("RUNTIMESCOPE_RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.host.to_string(), "127.0.0.1");
        assert_eq!(cfg.buffer_size, 10_000);
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.retry_delay_ms, 1000);
    }

    #[test]
    fn from_env_falls_back_on_unset() {
        std::env::remove_var("RUNTIMESCOPE_PORT");
        let cfg = TransportConfig::from_env();
        assert_eq!(cfg.port, 9090);
    }
}
