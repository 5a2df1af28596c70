//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::warn;

/// Production API root.
pub const DEFAULT_API_ROOT: &str = "https://api.particle.io";

/// Versioned prefix every operation path is resolved under.
pub const API_PREFIX: &str = "/v1";

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_USER_AGENT: &str = concat!("spark-core/", env!("CARGO_PKG_VERSION"));

/// Settings shared by every call made through one client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(deserialize_with = "api_root")]
    pub api_root: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

fn api_root<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let root = String::deserialize(deserializer)?;
    Ok(root.trim_end_matches('/').to_string())
}

impl ClientConfig {
    /// Defaults overridden by `SPARK_API_ROOT`, `SPARK_TIMEOUT_MS` and
    /// `SPARK_USER_AGENT` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup("SPARK_API_ROOT") {
            config = config.with_api_root(&root);
        }
        if let Some(raw) = lookup("SPARK_TIMEOUT_MS") {
            match raw.parse() {
                Ok(ms) => config.timeout_ms = ms,
                Err(e) => warn!(value = %raw, error = %e, "ignoring invalid SPARK_TIMEOUT_MS"),
            }
        }
        if let Some(agent) = lookup("SPARK_USER_AGENT") {
            config.user_agent = agent;
        }
        config
    }

    pub fn with_api_root(mut self, api_root: &str) -> Self {
        self.api_root = api_root.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
