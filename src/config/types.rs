//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/buildwright/) and project (.buildwright/) level configuration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::ai::{
    ClientOptions, CredentialVault, KeyringStore, MemoryStore, QuotaConfig, RateLimiterConfig,
    SecretStore, TimeoutConfig,
};
use crate::constants::{client, credentials, network, quota, rate_limit, recovery};
use crate::types::{BuildwrightError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generative backend settings
    pub backend: BackendConfig,

    /// Request admission window
    pub rate_limit: RateLimitSettings,

    /// Token quota ceilings
    pub quota: QuotaSettings,

    /// Build failure recovery
    pub recovery: RecoverySettings,

    /// Credential storage
    pub credentials: CredentialSettings,
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `BuildwrightError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.backend.timeout_secs == 0 {
            return Err(BuildwrightError::Config(
                "backend.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.backend.max_attempts == 0 {
            return Err(BuildwrightError::Config(
                "backend.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.backend.model.trim().is_empty() {
            return Err(BuildwrightError::Config(
                "backend.model must not be empty".to_string(),
            ));
        }

        if url::Url::parse(&self.backend.api_base).is_err() {
            return Err(BuildwrightError::Config(format!(
                "backend.api_base is not a valid URL: {}",
                self.backend.api_base
            )));
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_ms == 0 {
            return Err(BuildwrightError::Config(
                "rate_limit.max_requests and rate_limit.window_ms must be greater than 0"
                    .to_string(),
            ));
        }

        let warning = self.quota.warning_threshold;
        let critical = self.quota.critical_threshold;
        if !(0.0..=1.0).contains(&warning) || !(0.0..=1.0).contains(&critical) {
            return Err(BuildwrightError::Config(format!(
                "quota thresholds must be between 0.0 and 1.0, got {} / {}",
                warning, critical
            )));
        }
        if warning > critical {
            return Err(BuildwrightError::Config(format!(
                "quota.warning_threshold ({}) must not exceed critical_threshold ({})",
                warning, critical
            )));
        }

        if self.credentials.service.trim().is_empty() {
            return Err(BuildwrightError::Config(
                "credentials.service must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Backend Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Exchanges per credential while throttled
    pub max_attempts: u32,
    pub throttle_wait_ms: u64,
    /// Reasoning budget sent when a request asks for thinking
    pub thinking_budget: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: client::DEFAULT_API_BASE.to_string(),
            model: client::DEFAULT_MODEL.to_string(),
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: network::CONNECTION_TIMEOUT_SECS,
            max_attempts: client::MAX_ATTEMPTS,
            throttle_wait_ms: client::THROTTLE_WAIT_MS,
            thinking_budget: client::DEFAULT_THINKING_BUDGET,
        }
    }
}

impl BackendConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            max_attempts: self.max_attempts,
            throttle_wait: Duration::from_millis(self.throttle_wait_ms),
        }
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig::from_secs(self.timeout_secs, self.connect_timeout_secs)
    }
}

// =============================================================================
// Admission & Quota
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: rate_limit::MAX_REQUESTS_PER_WINDOW,
            window_ms: rate_limit::WINDOW_MS,
        }
    }
}

impl RateLimitSettings {
    pub fn to_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            limit: self.max_requests,
            period: Duration::from_millis(self.window_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    pub daily_limit: u64,
    pub minute_limit: u64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            daily_limit: quota::DAILY_LIMIT,
            minute_limit: quota::MINUTE_LIMIT,
            warning_threshold: quota::WARNING_THRESHOLD,
            critical_threshold: quota::CRITICAL_THRESHOLD,
        }
    }
}

impl QuotaSettings {
    pub fn to_quota_config(&self) -> QuotaConfig {
        QuotaConfig {
            daily_limit: self.daily_limit,
            minute_limit: self.minute_limit,
            warning_threshold: self.warning_threshold,
            critical_threshold: self.critical_threshold,
            ..QuotaConfig::default()
        }
    }
}

// =============================================================================
// Recovery & Credentials
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoverySettings {
    pub max_auto_fix_attempts: u32,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            max_auto_fix_attempts: recovery::MAX_AUTO_FIX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// OS keychain
    #[default]
    Keyring,
    /// Process memory only; nothing survives exit
    Memory,
}

impl std::fmt::Display for SecretBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyring => write!(f, "keyring"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub store: SecretBackend,
    /// Keychain service name entries are filed under
    pub service: String,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            store: SecretBackend::Keyring,
            service: credentials::KEYRING_SERVICE.to_string(),
        }
    }
}

impl CredentialSettings {
    /// Open a vault over the configured store, loading persisted state
    pub fn open_vault(&self) -> Result<CredentialVault> {
        let store: Arc<dyn SecretStore> = match self.store {
            SecretBackend::Keyring => Arc::new(KeyringStore::new(self.service.clone())),
            SecretBackend::Memory => Arc::new(MemoryStore::new()),
        };
        CredentialVault::open(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.rate_limit.max_requests, 1);
        assert_eq!(config.quota.daily_limit, 2_000_000);
        assert_eq!(config.recovery.max_auto_fix_attempts, 2);
        assert_eq!(config.credentials.store, SecretBackend::Keyring);
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.quota.warning_threshold = 0.95;
        config.quota.critical_threshold = 0.5;
        assert!(matches!(
            config.validate(),
            Err(BuildwrightError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.backend.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.backend.api_base = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversions() {
        let mut config = Config::default();
        config.rate_limit.window_ms = 5_000;
        config.backend.throttle_wait_ms = 10;

        assert_eq!(
            config.rate_limit.to_limiter_config().period,
            Duration::from_secs(5)
        );
        assert_eq!(
            config.backend.client_options().throttle_wait,
            Duration::from_millis(10)
        );
        assert_eq!(
            config.backend.timeouts().backend_request,
            Duration::from_secs(120)
        );
        assert_eq!(
            config.quota.to_quota_config().minute_window,
            QuotaConfig::default().minute_window
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[quota]\ndaily_limit = 10\n").unwrap();
        assert_eq!(config.quota.daily_limit, 10);
        assert_eq!(config.quota.minute_limit, 123_999);
        assert_eq!(config.backend.model, "gemini-2.5-pro");
    }

    #[test]
    fn test_memory_vault_opens_empty() {
        let settings = CredentialSettings {
            store: SecretBackend::Memory,
            ..Default::default()
        };
        let vault = settings.open_vault().unwrap();
        assert!(!vault.is_configured());
        assert_eq!(vault.status().store, "in-memory");
    }

    #[test]
    fn test_store_parses_lowercase() {
        let config: Config = toml::from_str("[credentials]\nstore = \"memory\"\n").unwrap();
        assert_eq!(config.credentials.store, SecretBackend::Memory);
    }
}
