//! Connection settings for the telnet console

use std::fmt;
use std::time::Duration;

/// Address used when none is configured
pub const DEFAULT_ADDRESS: &str = "localhost:8081";
/// Bound on dialing the console
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on each individual read or write
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a telnet console connection
#[derive(Clone)]
pub struct TelnetConfig {
    /// Console address (host:port)
    pub address: String,
    /// Telnet password, sent as the first line after the banner
    pub password: String,
    /// Timeout for the initial dial
    pub connect_timeout: Duration,
    /// Timeout for each read or write, renewed per call
    pub read_timeout: Duration,
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            password: String::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl TelnetConfig {
    /// Create config with custom address and password
    pub fn with_credentials(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Load from `SERVER_ADDR`, `TELNET_PASS`, `TELNET_CONNECT_TIMEOUT_SECS`
    /// and `TELNET_READ_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TelnetConfig::from_env`] over an arbitrary key lookup.
    /// Missing or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            address: lookup("SERVER_ADDR")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.address),
            password: lookup("TELNET_PASS").unwrap_or(defaults.password),
            connect_timeout: secs("TELNET_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            read_timeout: secs("TELNET_READ_TIMEOUT_SECS", defaults.read_timeout),
        }
    }
}

impl fmt::Debug for TelnetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelnetConfig")
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
