//! Backend Client
//!
//! Sends one generation request with the full resilience sequence:
//!
//! ```text
//! admission slot ──denied──▶ RateLimit
//!      │
//! quota reservation ──denied──▶ QuotaExceeded
//!      │
//! exchange (active key, ≤ max_attempts on 429) ──ok──▶ commit both, record success
//!      │ auth failure
//! exchange (other key, same bound) ──ok──▶ promote key, commit both
//!      │ failure
//! record failure for both, surface original error
//! ```
//!
//! Reservations are held across the network exchange and released on any
//! failure, so only successful exchanges are charged.

pub mod transport;
pub mod wire;

pub use transport::{HttpTransport, RawResponse, Transport};
pub use wire::{ApiError, GenerateRequest, GenerateResponse, parse_error_body};

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::credentials::{ActiveCredential, CredentialRole, VaultStatus};
use super::quota::{QuotaStats, QuotaTracker};
use super::SharedResilience;
use crate::constants::client as client_constants;
use crate::types::{ClientError, Result};

// =============================================================================
// Options
// =============================================================================

/// Retry behavior for throttled exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Exchanges per credential before giving up on throttling
    pub max_attempts: u32,
    /// Fixed wait between throttled exchanges
    pub throttle_wait: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_attempts: client_constants::MAX_ATTEMPTS,
            throttle_wait: Duration::from_millis(client_constants::THROTTLE_WAIT_MS),
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub thinking_budget: Option<u32>,
    pub cancel: CancellationToken,
}

impl SendOptions {
    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// How one HTTP response is treated
enum Exchange {
    Success(GenerateResponse),
    Throttled,
    Failed(ClientError),
}

fn is_auth_failure(http_status: u16, err: &ApiError) -> bool {
    matches!(http_status, 401 | 403)
        || client_constants::AUTH_ERROR_CODES.contains(&err.code.as_str())
        || err
            .status
            .as_deref()
            .is_some_and(|s| client_constants::AUTH_ERROR_CODES.contains(&s))
}

fn interpret(raw: RawResponse) -> Exchange {
    if raw.is_success() {
        return match GenerateResponse::parse(&raw.body) {
            Ok(response) => Exchange::Success(response),
            Err(e) => Exchange::Failed(ClientError::Parse(e.to_string())),
        };
    }
    if raw.status == 429 {
        return Exchange::Throttled;
    }
    let err = parse_error_body(raw.status, &raw.body);
    if is_auth_failure(raw.status, &err) {
        Exchange::Failed(ClientError::auth(err.code, err.message))
    } else {
        Exchange::Failed(ClientError::network(err.code, err.message))
    }
}

// =============================================================================
// Client
// =============================================================================

pub struct BackendClient {
    state: SharedResilience,
    transport: Arc<dyn Transport>,
    options: ClientOptions,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("endpoint", &self.transport.endpoint())
            .field("options", &self.options)
            .finish()
    }
}

impl BackendClient {
    pub fn new(state: SharedResilience, transport: Arc<dyn Transport>) -> Self {
        Self::with_options(state, transport, ClientOptions::default())
    }

    pub fn with_options(
        state: SharedResilience,
        transport: Arc<dyn Transport>,
        options: ClientOptions,
    ) -> Self {
        Self {
            state,
            transport,
            options,
        }
    }

    pub fn state(&self) -> &SharedResilience {
        &self.state
    }

    /// Send one request. Failures are returned as values, never panics.
    #[instrument(skip(self, request, options), fields(endpoint = self.transport.endpoint()))]
    pub async fn send(
        &self,
        request: &GenerateRequest,
        options: &SendOptions,
    ) -> std::result::Result<GenerateResponse, ClientError> {
        if options.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let active = self.state.vault.active().ok_or_else(|| {
            ClientError::auth("NO_API_KEY", "No API key configured")
        })?;

        let slot = self
            .state
            .limiter
            .try_reserve()
            .map_err(|retry_after| ClientError::RateLimit { retry_after })?;

        let body = request.to_wire(options.thinking_budget);
        let units = QuotaTracker::estimate_units(&body.to_string());
        let reservation = self.state.quota.try_reserve(units).map_err(|denied| {
            warn!(
                requested = denied.requested,
                remaining_daily = denied.remaining_daily,
                remaining_minute = denied.remaining_minute,
                "Quota pre-check denied request"
            );
            ClientError::from(denied)
        })?;

        debug!(role = %active.role, units, "Request admitted");

        let outcome = match self.exchange_with_retry(&active, &body, &options.cancel).await {
            Ok(response) => {
                self.note(self.state.vault.record_outcome(&active.secret, true));
                Ok(response)
            }
            Err(err) if err.is_auth() => self.fail_over(&active, err, &body, &options.cancel).await,
            Err(err) => {
                if !matches!(err, ClientError::Cancelled) {
                    self.note(self.state.vault.record_outcome(&active.secret, false));
                }
                Err(err)
            }
        };

        if outcome.is_ok() {
            slot.commit();
            reservation.commit();
        }
        outcome
    }

    /// One exchange with the other credential after an auth failure
    async fn fail_over(
        &self,
        failed: &ActiveCredential,
        original: ClientError,
        body: &Value,
        cancel: &CancellationToken,
    ) -> std::result::Result<GenerateResponse, ClientError> {
        self.note(self.state.vault.record_outcome(&failed.secret, false));

        let Some(alternate) = self.state.vault.credential(failed.role.other()) else {
            warn!(role = %failed.role, error = %original, "Credential rejected, no alternate configured");
            return Err(original);
        };

        warn!(
            from = %failed.role,
            to = %alternate.role,
            error = %original,
            "Credential rejected, failing over"
        );

        match self.exchange_with_retry(&alternate, body, cancel).await {
            Ok(response) => {
                let promoted = match alternate.role {
                    CredentialRole::Backup => self.state.vault.failover().map(|_| ()),
                    CredentialRole::Primary => self.state.vault.restore_primary(),
                };
                self.note(promoted);
                self.note(self.state.vault.record_outcome(&alternate.secret, true));
                info!(role = %alternate.role, "Failover succeeded");
                Ok(response)
            }
            Err(alt_err) => {
                self.note(self.state.vault.record_outcome(&alternate.secret, false));
                warn!(error = %alt_err, "Alternate credential also failed");
                Err(original)
            }
        }
    }

    /// Exchange with a fixed wait between throttled responses
    async fn exchange_with_retry(
        &self,
        credential: &ActiveCredential,
        body: &Value,
        cancel: &CancellationToken,
    ) -> std::result::Result<GenerateResponse, ClientError> {
        let max_attempts = self.options.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let raw = self.transport.exchange(&credential.secret, body).await?;
            match interpret(raw) {
                Exchange::Success(response) => {
                    debug!(role = %credential.role, attempt, "Exchange succeeded");
                    return Ok(response);
                }
                Exchange::Failed(err) => return Err(err),
                Exchange::Throttled => {
                    warn!(
                        role = %credential.role,
                        attempt,
                        max_attempts,
                        "Backend throttled request"
                    );
                    if attempt < max_attempts {
                        tokio::select! {
                            _ = sleep(self.options.throttle_wait) => {}
                            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                        }
                    }
                }
            }
        }

        Err(ClientError::MaxRetriesExceeded {
            attempts: max_attempts,
        })
    }

    fn note(&self, result: Result<()>) {
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist credential state");
        }
    }

    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            quota: self.state.quota.stats(),
            rate_remaining: self.state.limiter.remaining(),
            rate_window_reset_in: self.state.limiter.window_reset_in(),
            vault: self.state.vault.status(),
        }
    }
}

/// Snapshot of admission, quota and credential state
#[derive(Debug, Clone)]
pub struct ClientStatus {
    pub quota: QuotaStats,
    pub rate_remaining: u32,
    pub rate_window_reset_in: Duration,
    pub vault: VaultStatus,
}

impl ClientStatus {
    pub fn summary(&self) -> String {
        format!(
            "{} | Requests left: {} (window resets in {}s) | {}",
            self.quota.summary(),
            self.rate_remaining,
            self.rate_window_reset_in.as_secs(),
            self.vault.summary()
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
