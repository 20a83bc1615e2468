//! Gateway configuration with validation.
//!
//! Every section defaults sensibly so a config file only needs the fields it
//! changes. CLI flags and environment variables override the file.

use crate::domain::conditional::MAX_CONDITIONAL_COST;
use crate::domain::types::Address;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Default header carrying `<address>:<signature>`
pub const DEFAULT_AUTH_HEADER: &str = "X-Optimism-Signature";

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Conditional endpoint configuration
    pub conditional: ConditionalConfig,
    /// Cost limiter configuration
    pub rate_limit: RateLimitConfig,
    /// Authentication configuration
    pub auth: AuthSettings,
    /// Backend client configuration
    pub backend: BackendConfig,
}

impl GatewayConfig {
    /// Load from a TOML file; missing sections fall back to defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conditional.enabled && self.conditional.backend_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "backend_url is required when the conditional endpoint is enabled".into(),
            ));
        }

        if self.conditional.max_cost == 0 {
            return Err(ConfigError::InvalidLimit("max_cost cannot be 0".into()));
        }

        if self.rate_limit.capacity == 0 {
            return Err(ConfigError::InvalidRateLimit("capacity cannot be 0".into()));
        }

        if self.rate_limit.refill_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "refill_per_second cannot be 0".into(),
            ));
        }

        if self.conditional.admission_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "admission_timeout cannot be 0".into(),
            ));
        }

        if self.backend.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "backend request_timeout cannot be 0".into(),
            ));
        }

        if self.auth.header.trim().is_empty() {
            return Err(ConfigError::Invalid("auth header cannot be empty".into()));
        }

        if self.auth.max_body_size == 0 {
            return Err(ConfigError::InvalidLimit("max_body_size cannot be 0".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

/// Conditional endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalConfig {
    /// Administrative gate for eth_sendRawTransactionConditional
    pub enabled: bool,
    /// Backend node receiving accepted conditionals
    pub backend_url: String,
    /// Static per-conditional cost bound
    pub max_cost: u64,
    /// Longest a request may wait for limiter capacity
    #[serde(with = "humantime_serde")]
    pub admission_timeout: Duration,
    /// Additional permitted targets besides the EntryPoint deployments
    pub extra_entrypoints: Vec<Address>,
}

impl Default for ConditionalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend_url: String::new(),
            max_cost: MAX_CONDITIONAL_COST,
            admission_timeout: Duration::from_secs(5),
            extra_entrypoints: Vec::new(),
        }
    }
}

/// Cost limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum instantaneous cost burst
    pub capacity: u32,
    /// Sustained cost units restored per second
    pub refill_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 5000,
            refill_per_second: MAX_CONDITIONAL_COST as u32,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Header carrying `<address>:<signature>`
    pub header: String,
    /// Max request body size in bytes, read in full for signature checks
    pub max_body_size: usize,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            header: DEFAULT_AUTH_HEADER.to_string(),
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Backend client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Timeout for a single backend call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(String),
    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid size or cost limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
