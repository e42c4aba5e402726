//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Request admission constants
pub mod rate_limit {
    /// Requests admitted per window (conservative for the backend's ~1.8 RPM tier)
    pub const MAX_REQUESTS_PER_WINDOW: u32 = 1;

    /// Window length (milliseconds)
    pub const WINDOW_MS: u64 = 60_000;
}

/// Token quota constants
pub mod quota {
    /// Daily token ceiling
    pub const DAILY_LIMIT: u64 = 2_000_000;

    /// Rolling one-minute token ceiling
    pub const MINUTE_LIMIT: u64 = 123_999;

    /// Rolling window length (milliseconds)
    pub const MINUTE_WINDOW_MS: u64 = 60_000;

    /// Characters per estimated token (code-heavy payloads)
    pub const CHARS_PER_UNIT: u64 = 3;

    /// Warning threshold (fraction of the daily ceiling)
    pub const WARNING_THRESHOLD: f64 = 0.75;

    /// Critical threshold (fraction of the daily ceiling)
    pub const CRITICAL_THRESHOLD: f64 = 0.90;
}

/// Backend client constants
pub mod client {
    /// Base URL of the generative backend
    pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

    /// Default model
    pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

    /// Maximum exchange attempts per credential when throttled
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Fixed wait between throttled attempts (milliseconds)
    pub const THROTTLE_WAIT_MS: u64 = 9_000;

    /// Thinking budget used when thinking is requested without an explicit budget
    pub const DEFAULT_THINKING_BUDGET: u32 = 10_000;

    /// Backend error codes treated as credential failures
    pub const AUTH_ERROR_CODES: &[&str] = &[
        "INVALID_API_KEY",
        "PERMISSION_DENIED",
        "UNAUTHENTICATED",
        "API_KEY_INVALID",
    ];
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Build recovery constants
pub mod recovery {
    /// Auto-fix attempts before a human has to look at the failure
    pub const MAX_AUTO_FIX_ATTEMPTS: u32 = 2;

    /// Characters of raw log kept as the message of an unclassified failure
    pub const UNKNOWN_MESSAGE_CHARS: usize = 200;
}

/// Credential storage constants
pub mod credentials {
    /// Keychain service name
    pub const KEYRING_SERVICE: &str = "buildwright";

    /// Secrets shorter than this are fully masked
    pub const MIN_MASKABLE_LEN: usize = 8;

    /// Characters revealed at each end of a masked secret
    pub const MASK_VISIBLE_CHARS: usize = 4;

    /// Prefix every well-formed backend key carries
    pub const KEY_PREFIX: &str = "AIza";

    /// Well-formed keys are strictly longer than this
    pub const MIN_KEY_LEN: usize = 20;
}

/// Pipeline progress percentages reported to listeners
pub mod progress {
    pub const PLANNED: u8 = 20;
    pub const GENERATED: u8 = 40;
    pub const ADAPTED: u8 = 50;
    pub const BUILD_STARTED: u8 = 60;
    pub const ERROR_ANALYZED: u8 = 70;
    pub const FIX_SUGGESTED: u8 = 75;
    pub const RETRYING: u8 = 80;
    pub const DONE: u8 = 100;
}
