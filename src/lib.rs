//! Buildwright - Resilience and Decision Core for App Generation
//!
//! The layer between an app-generation pipeline and its generative backend,
//! plus the deterministic logic that reacts to failed builds.
//!
//! ## Core Features
//!
//! - **Admission control**: fixed-window request limiter and two-tier token quota
//! - **Credential failover**: primary/backup keys in the OS keychain
//! - **Resilient client**: bounded throttling retries, auth failover, cancellation
//! - **Build recovery**: log classification, fix suggestions, bounded retries
//! - **Pipeline**: phase sequencing with listener events
//!
//! ## Quick Start
//!
//! ```ignore
//! use buildwright::{BackendClient, Config, GenerateRequest, HttpTransport, ResilienceState};
//!
//! let config = Config::default();
//! let vault = config.credentials.open_vault()?;
//! let state = ResilienceState::from_config(&config, vault).shared();
//! let transport = HttpTransport::new(&config.backend.api_base, &config.backend.model, config.backend.timeouts())?;
//! let client = BackendClient::with_options(state, Arc::new(transport), config.backend.client_options());
//! let response = client.send(&GenerateRequest::from_prompt("Plan a notes app"), &Default::default()).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: rate limiting, quota, credentials, backend client
//! - [`recovery`]: build log classification and fix advice
//! - [`pipeline`]: phase orchestration
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod recovery;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use tokio_util::sync::CancellationToken;
pub use types::{BuildwrightError, ClientError, ErrorCategory, Result, ResultExt, RunId};

// =============================================================================
// Backend Re-exports
// =============================================================================

pub use ai::{
    BackendClient, CredentialRole, CredentialVault, GenerateRequest, GenerateResponse,
    HttpTransport, QuotaTracker, RateLimiter, ResilienceState, SendOptions, SharedResilience,
    TimeoutConfig, Transport, with_timeout,
};

// =============================================================================
// Recovery & Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    BuildOutcome, PipelineEvent, PipelineOrchestrator, PipelineOutcome, PipelinePhase,
    PipelineStages,
};
pub use recovery::{BuildError, BuildErrorKind, ErrorClassifier, FixAction, FixAdvisor, FixSuggestion};
