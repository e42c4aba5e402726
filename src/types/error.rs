//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! Two taxonomies live here:
//!
//! - [`ClientError`]: what a single backend exchange can fail with. Returned
//!   as a value from `BackendClient::send`, never panicked across the boundary.
//! - [`BuildwrightError`]: application errors (config, IO, secret store,
//!   pipeline stage failures).
//!
//! Build failures are not Rust errors at all; they are `BuildError` verdicts
//! produced by the recovery classifier from log text.
//!
//! ## Error Categories
//!
//! - **RateLimit**: admission denied or backend throttling (wait and retry)
//! - **Quota**: token ceiling reached (wait for the window or the next day)
//! - **Auth**: credential rejected (fail over, then fail fast)
//! - **Network**: transport or backend failure (surface to caller)
//! - **Parse**: response body not understood
//! - **Cancelled**: caller gave up

use std::time::Duration;
use thiserror::Error;

use crate::pipeline::PipelinePhase;

// =============================================================================
// Error Categories
// =============================================================================

/// Coarse categories used for logging and caller retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimit,
    Quota,
    Auth,
    Network,
    Parse,
    Cancelled,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Quota => write!(f, "QUOTA"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Parse => write!(f, "PARSE_ERROR"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl ErrorCategory {
    /// Whether a later identical request can reasonably succeed without
    /// operator intervention
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Quota | Self::Network)
    }
}

// =============================================================================
// Client Error
// =============================================================================

/// Failure of a single `BackendClient::send` call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Admission denied locally; no network attempt was made
    #[error("Rate limit reached, retry in {}s", retry_after.as_secs())]
    RateLimit { retry_after: Duration },

    /// Token quota would be exceeded; no network attempt was made
    #[error(
        "Insufficient token quota: requested {requested}, remaining daily {remaining_daily}, remaining this minute {remaining_minute}"
    )]
    QuotaExceeded {
        requested: u64,
        remaining_daily: u64,
        remaining_minute: u64,
    },

    /// Transport failure or a backend error that is neither throttling nor auth
    #[error("[{code}] {message}")]
    Network { code: String, message: String },

    /// Credential rejected by the backend
    #[error("Authentication failed [{code}]: {message}")]
    Auth { code: String, message: String },

    /// Response body could not be understood
    #[error("Failed to parse backend response: {0}")]
    Parse(String),

    /// Backend kept throttling until the attempt bound ran out
    #[error("Backend still throttling after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    /// Caller requested cancellation
    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimit { .. } | Self::MaxRetriesExceeded { .. } => ErrorCategory::RateLimit,
            Self::QuotaExceeded { .. } => ErrorCategory::Quota,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Auth { .. } => ErrorCategory::Auth,
            Self::Parse(_) => ErrorCategory::Parse,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Suggested wait before the caller tries again, when one is known
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum BuildwrightError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("Backend error: {0}")]
    Client(#[from] ClientError),

    #[error("HTTP client error: {0}")]
    Http(String),

    // -------------------------------------------------------------------------
    // Credential Errors
    // -------------------------------------------------------------------------
    #[error("Secret store error: {0}")]
    SecretStore(String),

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// A collaborator stage failed in a way that cannot be retried
    #[error("Stage {phase} failed: {message}")]
    Stage {
        phase: PipelinePhase,
        message: String,
    },

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition {
        from: PipelinePhase,
        to: PipelinePhase,
    },

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, BuildwrightError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl BuildwrightError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a stage failure
    pub fn stage(phase: PipelinePhase, message: impl Into<String>) -> Self {
        Self::Stage {
            phase,
            message: message.into(),
        }
    }

    /// Check if this error is transient (a later retry may succeed)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Client(e) => e.category().is_transient(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| BuildwrightError::InvalidInput(format!("{}: {}", context.into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
