//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::DispatchPolicy;

/// Largest cooldown chrono can represent as a duration.
pub const MAX_COOLDOWN_SECS: u64 = (i64::MAX / 1000) as u64;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Persisted state location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Matching and run behavior
    #[serde(default)]
    pub engine: EngineConfig,

    /// Duplicate suppression
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Messaging transport credentials and endpoint
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.storage.dir.as_os_str().is_empty() {
            return Err(AppError::validation("storage.dir is empty"));
        }
        if self.engine.max_concurrent == 0 {
            return Err(AppError::validation("engine.max_concurrent must be > 0"));
        }
        if self.engine.max_lines_per_movie == 0 {
            return Err(AppError::validation(
                "engine.max_lines_per_movie must be > 0",
            ));
        }
        if self.dispatch.policy == PolicyKind::Cooldown && self.dispatch.cooldown_secs == 0 {
            return Err(AppError::validation(
                "dispatch.cooldown_secs must be > 0 for the cooldown policy",
            ));
        }
        if self.dispatch.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(AppError::validation(format!(
                "dispatch.cooldown_secs must be <= {MAX_COOLDOWN_SECS}"
            )));
        }
        if self.notifier.timeout_secs == 0 {
            return Err(AppError::validation("notifier.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.notifier.api_base)?;
        Ok(())
    }
}

/// Location of the persisted catalog, criteria and ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
        }
    }
}

/// Engine run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Criteria evaluated concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Showtime lines listed per movie before summarizing the rest
    #[serde(default = "defaults::max_lines_per_movie")]
    pub max_lines_per_movie: usize,

    /// Group differently cased/spaced titles into one movie section
    #[serde(default)]
    pub merge_title_variants: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            max_lines_per_movie: defaults::max_lines_per_movie(),
            merge_title_variants: false,
        }
    }
}

/// Which idempotency policy to apply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Content,
    Cooldown,
}

/// Duplicate suppression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub policy: PolicyKind,

    /// Minimum interval between sends under the cooldown policy
    #[serde(default = "defaults::cooldown_secs")]
    pub cooldown_secs: u64,
}

impl DispatchConfig {
    pub fn policy(&self) -> DispatchPolicy {
        match self.policy {
            PolicyKind::Content => DispatchPolicy::ContentBased,
            PolicyKind::Cooldown => DispatchPolicy::Cooldown {
                secs: self.cooldown_secs,
            },
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            cooldown_secs: defaults::cooldown_secs(),
        }
    }
}

/// Messaging transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender address (e.g. "whatsapp:+14155238886")
    #[serde(default)]
    pub from: Option<String>,

    /// Used when a criterion has no destination of its own
    #[serde(default)]
    pub default_destination: Option<String>,

    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a failed send
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled on each subsequent one
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl NotifierConfig {
    /// Fill credentials from `TWILIO_*` environment variables where set.
    pub fn with_env_overrides(mut self) -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if let Some(v) = env("TWILIO_ACCOUNT_SID") {
            self.account_sid = Some(v);
        }
        if let Some(v) = env("TWILIO_AUTH_TOKEN") {
            self.auth_token = Some(v);
        }
        if let Some(v) = env("TWILIO_FROM_WHATSAPP") {
            self.from = Some(v);
        }
        if let Some(v) = env("TWILIO_TO_WHATSAPP") {
            self.default_destination = Some(v);
        }
        self
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            account_sid: None,
            auth_token: None,
            from: None,
            default_destination: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Storage defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    // Engine defaults
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_lines_per_movie() -> usize {
        5
    }

    // Dispatch defaults
    pub fn cooldown_secs() -> u64 {
        3600
    }

    // Notifier defaults
    pub fn api_base() -> String {
        "https://api.twilio.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; showtime-alerts/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_retries() -> u32 {
        1
    }
    pub fn retry_backoff() -> u64 {
        500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.engine.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cooldown() {
        let mut config = Config::default();
        config.dispatch.policy = PolicyKind::Cooldown;
        config.dispatch.cooldown_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_cooldown() {
        let mut config = Config::default();
        config.dispatch.policy = PolicyKind::Cooldown;
        config.dispatch.cooldown_secs = 10_000_000_000_000_000;
        assert!(config.validate().is_err());

        config.dispatch.cooldown_secs = MAX_COOLDOWN_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_api_base() {
        let mut config = Config::default();
        config.notifier.api_base = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [dispatch]
            policy = "cooldown"
            cooldown_secs = 600

            [notifier]
            from = "whatsapp:+14155238886"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.dispatch.policy(),
            DispatchPolicy::Cooldown { secs: 600 }
        );
        assert_eq!(config.engine.max_lines_per_movie, 5);
        assert_eq!(config.notifier.from.as_deref(), Some("whatsapp:+14155238886"));
        assert_eq!(config.storage.dir, PathBuf::from("storage"));
    }

    #[test]
    fn default_policy_is_content_based() {
        assert_eq!(
            Config::default().dispatch.policy(),
            DispatchPolicy::ContentBased
        );
    }
}
