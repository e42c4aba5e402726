//! Backend Integration Layer
//!
//! Everything between a caller and the generative backend: admission control,
//! token quota, credential selection and the client that ties them together.

pub mod client;
pub mod credentials;
pub mod quota;
pub mod rate_limiter;
pub mod timeout;

pub use client::{
    BackendClient, ClientOptions, ClientStatus, GenerateRequest, GenerateResponse, HttpTransport,
    RawResponse, SendOptions, Transport,
};
pub use credentials::{
    ActiveCredential, CredentialRole, CredentialVault, KeyringStore, MemoryStore, SecretStore,
    VaultStatus, mask_secret, validate_key_format,
};
pub use quota::{QuotaConfig, QuotaDenied, QuotaReservation, QuotaStats, QuotaTracker};
pub use rate_limiter::{AdmissionSlot, RateLimiter, RateLimiterConfig};
pub use timeout::{TimeoutConfig, with_timeout};

use std::sync::Arc;

use crate::config::Config;

/// Admission, quota and credential state shared by every client instance.
///
/// Constructed once and passed explicitly; there is no process-wide global.
#[derive(Debug)]
pub struct ResilienceState {
    pub limiter: RateLimiter,
    pub quota: QuotaTracker,
    pub vault: CredentialVault,
}

pub type SharedResilience = Arc<ResilienceState>;

impl ResilienceState {
    pub fn new(limiter: RateLimiter, quota: QuotaTracker, vault: CredentialVault) -> Self {
        Self {
            limiter,
            quota,
            vault,
        }
    }

    pub fn from_config(config: &Config, vault: CredentialVault) -> Self {
        Self::new(
            RateLimiter::new(config.rate_limit.to_limiter_config()),
            QuotaTracker::new(config.quota.to_quota_config()),
            vault,
        )
    }

    pub fn shared(self) -> SharedResilience {
        Arc::new(self)
    }
}
