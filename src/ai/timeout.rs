//! Unified Timeout Configuration
//!
//! Deadlines for backend exchanges plus a helper for wrapping any async
//! operation in one.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, with_timeout};
//!
//! let config = TimeoutConfig::default();
//! let result = with_timeout(
//!     config.backend_request,
//!     async { /* backend call */ },
//!     "backend request"
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::constants::network as net_constants;
use crate::types::{BuildwrightError, Result};

/// Timeouts applied to backend traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Whole-request timeout, enforced by the HTTP client (default: 120 seconds)
    pub backend_request: Duration,
    /// TCP/TLS connect timeout (default: 30 seconds)
    pub connection: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            backend_request: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
            connection: Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS),
        }
    }
}

impl TimeoutConfig {
    pub fn from_secs(request_secs: u64, connect_secs: u64) -> Self {
        Self {
            backend_request: Duration::from_secs(request_secs),
            connection: Duration::from_secs(connect_secs),
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(BuildwrightError::timeout(operation_name, timeout)),
    }
}
