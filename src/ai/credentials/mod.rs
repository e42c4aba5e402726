//! Credential Vault
//!
//! Holds a primary and an optional backup API key, tracks which one is
//! active, and counts consecutive failures per key. Every mutation is written
//! through to the backing [`SecretStore`] under a single lock, so the vault
//! survives restarts and concurrent callers see one consistent state.
//!
//! Secrets never leave the vault unmasked except through
//! [`ActiveCredential::secret`], which the request builder exposes at call
//! time.

pub mod store;

pub use store::{KeyringStore, MemoryStore, SecretStore};

use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::constants::credentials as cred_constants;
use crate::types::{BuildwrightError, Result};

/// Persisted store keys
mod keys {
    pub const PRIMARY: &str = "primary";
    pub const BACKUP: &str = "backup";
    pub const ACTIVE_ROLE: &str = "active-role";
    pub const PRIMARY_FAILURES: &str = "primary-failures";
    pub const BACKUP_FAILURES: &str = "backup-failures";
    pub const SETUP_COMPLETE: &str = "setup-complete";
    pub const SETUP_TIMESTAMP: &str = "setup-timestamp";

    pub const ALL: &[&str] = &[
        PRIMARY,
        BACKUP,
        ACTIVE_ROLE,
        PRIMARY_FAILURES,
        BACKUP_FAILURES,
        SETUP_COMPLETE,
        SETUP_TIMESTAMP,
    ];
}

// =============================================================================
// Roles
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialRole {
    Primary,
    Backup,
}

impl CredentialRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Backup => "backup",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Primary => Self::Backup,
            Self::Backup => Self::Primary,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "primary" => Some(Self::Primary),
            "backup" => Some(Self::Backup),
            _ => None,
        }
    }

    fn failures_key(&self) -> &'static str {
        match self {
            Self::Primary => keys::PRIMARY_FAILURES,
            Self::Backup => keys::BACKUP_FAILURES,
        }
    }

    fn secret_key(&self) -> &'static str {
        match self {
            Self::Primary => keys::PRIMARY,
            Self::Backup => keys::BACKUP,
        }
    }
}

impl std::fmt::Display for CredentialRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The credential the next request should use
pub struct ActiveCredential {
    pub role: CredentialRole,
    pub secret: SecretString,
}

impl std::fmt::Debug for ActiveCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveCredential")
            .field("role", &self.role)
            .field("secret", &mask_secret(Some(self.secret.expose_secret())))
            .finish()
    }
}

/// Masked display form: first 4 + `...` + last 4 characters, `***` when
/// shorter than 8 characters or absent
pub fn mask_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret else {
        return "***".to_string();
    };
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < cred_constants::MIN_MASKABLE_LEN {
        return "***".to_string();
    }
    let n = cred_constants::MASK_VISIBLE_CHARS;
    let head: String = chars[..n].iter().collect();
    let tail: String = chars[chars.len() - n..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check that `key` looks like a backend API key: the expected prefix and
/// more than [`cred_constants::MIN_KEY_LEN`] characters after trimming
pub fn validate_key_format(key: &str) -> Result<()> {
    let key = key.trim();
    if key.len() <= cred_constants::MIN_KEY_LEN || !key.starts_with(cred_constants::KEY_PREFIX) {
        return Err(BuildwrightError::InvalidInput(format!(
            "API key {} is malformed: expected '{}' prefix and more than {} characters",
            mask_secret(Some(key)),
            cred_constants::KEY_PREFIX,
            cred_constants::MIN_KEY_LEN
        )));
    }
    Ok(())
}

fn duplicate(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

// =============================================================================
// Vault
// =============================================================================

#[derive(Default)]
struct VaultState {
    primary: Option<SecretString>,
    backup: Option<SecretString>,
    active: Option<CredentialRole>,
    primary_failures: u32,
    backup_failures: u32,
    setup_complete: bool,
    setup_timestamp: Option<String>,
}

impl VaultState {
    fn secret(&self, role: CredentialRole) -> Option<&SecretString> {
        match role {
            CredentialRole::Primary => self.primary.as_ref(),
            CredentialRole::Backup => self.backup.as_ref(),
        }
    }

    fn failures_mut(&mut self, role: CredentialRole) -> &mut u32 {
        match role {
            CredentialRole::Primary => &mut self.primary_failures,
            CredentialRole::Backup => &mut self.backup_failures,
        }
    }

    fn failures(&self, role: CredentialRole) -> u32 {
        match role {
            CredentialRole::Primary => self.primary_failures,
            CredentialRole::Backup => self.backup_failures,
        }
    }

    fn active_role(&self) -> CredentialRole {
        self.active.unwrap_or(CredentialRole::Primary)
    }

    fn role_of(&self, secret: &SecretString) -> Option<CredentialRole> {
        [CredentialRole::Primary, CredentialRole::Backup]
            .into_iter()
            .find(|role| {
                self.secret(*role)
                    .is_some_and(|stored| stored.expose_secret() == secret.expose_secret())
            })
    }
}

pub struct CredentialVault {
    store: Arc<dyn SecretStore>,
    inner: Mutex<VaultState>,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("store", &self.store.label())
            .field("status", &self.status())
            .finish()
    }
}

impl CredentialVault {
    /// Load vault state from `store`
    pub fn open(store: Arc<dyn SecretStore>) -> Result<Self> {
        let read_plain = |key: &str| -> Result<Option<String>> {
            Ok(store.get(key)?.map(|v| v.expose_secret().to_owned()))
        };
        let read_count = |key: &str| -> Result<u32> {
            Ok(read_plain(key)?
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0))
        };

        let state = VaultState {
            primary: store.get(CredentialRole::Primary.secret_key())?,
            backup: store.get(CredentialRole::Backup.secret_key())?,
            active: read_plain(keys::ACTIVE_ROLE)?
                .as_deref()
                .and_then(CredentialRole::parse),
            primary_failures: read_count(keys::PRIMARY_FAILURES)?,
            backup_failures: read_count(keys::BACKUP_FAILURES)?,
            setup_complete: read_plain(keys::SETUP_COMPLETE)?.as_deref() == Some("true"),
            setup_timestamp: read_plain(keys::SETUP_TIMESTAMP)?,
        };

        tracing::debug!(
            store = store.label(),
            primary = state.primary.is_some(),
            backup = state.backup.is_some(),
            "Credential vault opened"
        );

        Ok(Self {
            store,
            inner: Mutex::new(state),
        })
    }

    /// Vault over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            inner: Mutex::new(VaultState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VaultState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_plain(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.store.set(key, &SecretString::from(value.into()))
    }

    fn write_failures(&self, state: &VaultState, role: CredentialRole) -> Result<()> {
        self.write_plain(role.failures_key(), state.failures(role).to_string())
    }

    fn write_active(&self, role: CredentialRole) -> Result<()> {
        self.write_plain(keys::ACTIVE_ROLE, role.as_str())
    }

    /// Trimmed copy of `secret`, rejecting blank input
    fn normalize(secret: SecretString) -> Result<SecretString> {
        let trimmed = secret.expose_secret().trim();
        if trimmed.is_empty() {
            return Err(BuildwrightError::InvalidInput(
                "API key must not be empty".to_string(),
            ));
        }
        Ok(SecretString::from(trimmed.to_owned()))
    }

    /// Store the primary key, reset its failure counter and make it active
    pub fn set_primary(&self, secret: SecretString) -> Result<()> {
        let secret = Self::normalize(secret)?;
        let mut state = self.lock();
        self.store.set(CredentialRole::Primary.secret_key(), &secret)?;
        state.primary = Some(secret);
        state.primary_failures = 0;
        state.active = Some(CredentialRole::Primary);
        self.write_failures(&state, CredentialRole::Primary)?;
        self.write_active(CredentialRole::Primary)?;
        tracing::info!("Primary API key stored");
        Ok(())
    }

    /// Store the backup key and reset its failure counter
    pub fn set_backup(&self, secret: SecretString) -> Result<()> {
        let secret = Self::normalize(secret)?;
        let mut state = self.lock();
        self.store.set(CredentialRole::Backup.secret_key(), &secret)?;
        state.backup = Some(secret);
        state.backup_failures = 0;
        self.write_failures(&state, CredentialRole::Backup)?;
        tracing::info!("Backup API key stored");
        Ok(())
    }

    /// The active credential, if its key is configured
    pub fn active(&self) -> Option<ActiveCredential> {
        let state = self.lock();
        let role = state.active_role();
        state.secret(role).map(|secret| ActiveCredential {
            role,
            secret: duplicate(secret),
        })
    }

    /// Credential for a specific role, if configured
    pub fn credential(&self, role: CredentialRole) -> Option<ActiveCredential> {
        let state = self.lock();
        state.secret(role).map(|secret| ActiveCredential {
            role,
            secret: duplicate(secret),
        })
    }

    /// Attribute an outcome to whichever stored key equals `secret`.
    ///
    /// Success resets that key's failure counter; failure increments it.
    /// Outcomes for a key that has since been replaced are dropped.
    pub fn record_outcome(&self, secret: &SecretString, success: bool) -> Result<()> {
        let mut state = self.lock();
        let Some(role) = state.role_of(secret) else {
            tracing::debug!(success, "Outcome for a replaced API key ignored");
            return Ok(());
        };
        let before = state.failures(role);
        let counter = state.failures_mut(role);
        if success {
            *counter = 0;
        } else {
            *counter = counter.saturating_add(1);
            tracing::warn!(role = %role, failures = *counter, "API key failure recorded");
        }
        if state.failures(role) != before {
            self.write_failures(&state, role)?;
        }
        Ok(())
    }

    /// Switch to the backup key. Returns whether the switch happened.
    pub fn failover(&self) -> Result<bool> {
        let mut state = self.lock();
        if state.backup.is_none() {
            tracing::warn!("Failover requested but no backup key is configured");
            return Ok(false);
        }
        state.active = Some(CredentialRole::Backup);
        self.write_active(CredentialRole::Backup)?;
        tracing::warn!("Switched to backup API key");
        Ok(true)
    }

    /// Make the primary key active again
    pub fn restore_primary(&self) -> Result<()> {
        let mut state = self.lock();
        state.active = Some(CredentialRole::Primary);
        self.write_active(CredentialRole::Primary)?;
        tracing::info!("Primary API key restored as active");
        Ok(())
    }

    pub fn has_backup(&self) -> bool {
        self.lock().backup.is_some()
    }

    pub fn is_configured(&self) -> bool {
        self.lock().primary.is_some()
    }

    pub fn active_role(&self) -> CredentialRole {
        self.lock().active_role()
    }

    pub fn failure_count(&self, role: CredentialRole) -> u32 {
        self.lock().failures(role)
    }

    /// Record that first-run setup finished, with an RFC 3339 timestamp
    pub fn mark_setup_complete(&self) -> Result<()> {
        let mut state = self.lock();
        let now = chrono::Utc::now().to_rfc3339();
        self.write_plain(keys::SETUP_COMPLETE, "true")?;
        self.write_plain(keys::SETUP_TIMESTAMP, now.clone())?;
        state.setup_complete = true;
        state.setup_timestamp = Some(now);
        Ok(())
    }

    /// Remove both keys and all bookkeeping
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        for key in keys::ALL {
            self.store.remove(key)?;
        }
        *state = VaultState::default();
        tracing::info!("All API keys cleared");
        Ok(())
    }

    pub fn status(&self) -> VaultStatus {
        let state = self.lock();
        let masked = |role: CredentialRole| {
            mask_secret(state.secret(role).map(|s| s.expose_secret()))
        };
        VaultStatus {
            primary: masked(CredentialRole::Primary),
            backup: masked(CredentialRole::Backup),
            has_primary: state.primary.is_some(),
            has_backup: state.backup.is_some(),
            primary_failures: state.primary_failures,
            backup_failures: state.backup_failures,
            active: state.active_role(),
            setup_complete: state.setup_complete,
            setup_timestamp: state.setup_timestamp.clone(),
            store: self.store.label().to_string(),
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Masked, serializable snapshot of the vault
#[derive(Debug, Clone, Serialize)]
pub struct VaultStatus {
    pub primary: String,
    pub backup: String,
    pub has_primary: bool,
    pub has_backup: bool,
    pub primary_failures: u32,
    pub backup_failures: u32,
    pub active: CredentialRole,
    pub setup_complete: bool,
    pub setup_timestamp: Option<String>,
    pub store: String,
}

impl VaultStatus {
    pub fn summary(&self) -> String {
        format!(
            "Primary: {} (failures: {}) | Backup: {} (failures: {}) | Active: {}",
            self.primary, self.primary_failures, self.backup, self.backup_failures, self.active
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
