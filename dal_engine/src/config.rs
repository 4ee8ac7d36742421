use crate::protocol::AttrCode;
use std::time::Duration;

pub const HTTP_TIMEOUT_SECS_ENV: &str = "DAL_HTTP_TIMEOUT_SECS";
pub const USER_AGENT_ENV: &str = "DAL_USER_AGENT";
pub const MAX_RESPONSE_BYTES_ENV: &str = "DAL_MAX_RESPONSE_BYTES";
pub const RAGGED_ROWS_ENV: &str = "DAL_RAGGED_ROWS";
pub const TRUNCATE_ATTRIBUTES_ENV: &str = "DAL_TRUNCATE_ATTRIBUTES";
pub const LOGGING_ENV: &str = "DAL_LOGGING";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;
const DEFAULT_ARENA_CHUNK_SIZE: usize = 64 * 1024;

/// Byte limits applied when copying element attributes. Longer values are
/// cut at a character boundary and the entry is flagged as truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLimits {
    pub short: usize,
    pub utype: usize,
    pub value: usize,
}

impl AttributeLimits {
    pub const fn standard() -> Self {
        Self {
            short: 63,
            utype: 255,
            value: 1023,
        }
    }

    pub const fn unbounded() -> Self {
        Self {
            short: usize::MAX,
            utype: usize::MAX,
            value: usize::MAX,
        }
    }

    pub fn limit_for(&self, attr: AttrCode) -> usize {
        match attr {
            AttrCode::Utype => self.utype,
            AttrCode::Value => self.value,
            _ => self.short,
        }
    }
}

impl Default for AttributeLimits {
    fn default() -> Self {
        Self::standard()
    }
}

/// What to do with a TR whose TD count differs from the FIELD count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RaggedRowPolicy {
    /// Null-pad short rows, drop cells past the last column.
    #[default]
    Pad,
    /// Fail the build with `RaggedRow`.
    Reject,
}

impl RaggedRowPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pad" => Some(Self::Pad),
            "reject" | "error" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub attribute_limits: AttributeLimits,
    pub ragged_rows: RaggedRowPolicy,
    pub arena_chunk_size: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            attribute_limits: AttributeLimits::standard(),
            ragged_rows: RaggedRowPolicy::Pad,
            arena_chunk_size: DEFAULT_ARENA_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_response_bytes: u64,
    pub build: BuildOptions,
    pub logging_enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("dal_engine/{}", env!("CARGO_PKG_VERSION")),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            build: BuildOptions::default(),
            logging_enabled: true,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by any `DAL_*` variables set in the environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; unparsable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secs) = lookup(HTTP_TIMEOUT_SECS_ENV).and_then(|v| v.trim().parse().ok()) {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(agent) = lookup(USER_AGENT_ENV).filter(|v| !v.trim().is_empty()) {
            self.user_agent = agent;
        }
        if let Some(max) = lookup(MAX_RESPONSE_BYTES_ENV).and_then(|v| v.trim().parse().ok()) {
            self.max_response_bytes = max;
        }
        if let Some(policy) = lookup(RAGGED_ROWS_ENV).and_then(|v| RaggedRowPolicy::parse(&v)) {
            self.build.ragged_rows = policy;
        }
        if let Some(truncate) = lookup(TRUNCATE_ATTRIBUTES_ENV).and_then(|v| parse_bool_flag(&v)) {
            self.build.attribute_limits = if truncate {
                AttributeLimits::standard()
            } else {
                AttributeLimits::unbounded()
            };
        }
        if let Some(enabled) = lookup(LOGGING_ENV).and_then(|v| parse_bool_flag(&v)) {
            self.logging_enabled = enabled;
        }
        self
    }
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Loads `.env` once per process (integration tests, live services).
#[cfg(feature = "test-helpers")]
pub fn load_dotenv() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = dotenvy::dotenv();
    });
}
