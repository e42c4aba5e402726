//! Secret storage backends
//!
//! The vault persists through a small key/value capability so the OS keychain
//! can be swapped for an in-process map in tests and throwaway sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use keyring::Entry;
use secrecy::{ExposeSecret, SecretString};

use crate::constants::credentials as cred_constants;
use crate::types::{BuildwrightError, Result};

/// Confidentiality-preserving key/value store
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<SecretString>>;
    fn set(&self, key: &str, value: &SecretString) -> Result<()>;
    /// Removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Human-readable label for status output
    fn label(&self) -> &str;
}

// =============================================================================
// OS Keychain
// =============================================================================

/// One keychain entry per key, all under a single service name.
/// Values rest encrypted by the platform keystore.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(cred_constants::KEYRING_SERVICE)
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).map_err(|e| keyring_error("open", key, e))
    }
}

fn keyring_error(op: &str, key: &str, err: keyring::Error) -> BuildwrightError {
    BuildwrightError::SecretStore(format!("keychain {} '{}' failed: {}", op, key, err))
}

impl SecretStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<SecretString>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(SecretString::from(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_error("read", key, e)),
        }
    }

    fn set(&self, key: &str, value: &SecretString) -> Result<()> {
        self.entry(key)?
            .set_password(value.expose_secret())
            .map_err(|e| keyring_error("write", key, e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keyring_error("delete", key, e)),
        }
    }

    fn label(&self) -> &str {
        if cfg!(target_os = "macos") {
            "macOS Keychain"
        } else if cfg!(target_os = "windows") {
            "Windows Credential Manager"
        } else {
            "Secret Service keyring"
        }
    }
}

// =============================================================================
// In-Memory
// =============================================================================

/// Process-local store; nothing survives the process
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, SecretString>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SecretString>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<SecretString>> {
        Ok(self
            .lock()
            .get(key)
            .map(|v| SecretString::from(v.expose_secret().to_owned())))
    }

    fn set(&self, key: &str, value: &SecretString) -> Result<()> {
        self.lock().insert(
            key.to_owned(),
            SecretString::from(value.expose_secret().to_owned()),
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn label(&self) -> &str {
        "in-memory"
    }
}
