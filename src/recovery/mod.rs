//! Build Failure Recovery
//!
//! Deterministic decision engine consulted after a failed build:
//! [`ErrorClassifier`] reads the log, [`FixAdvisor`] picks a remediation and
//! bounds the number of automated retries.

pub mod advisor;
pub mod classifier;

pub use advisor::{FixAction, FixAdvisor, FixSuggestion, RetryRecommendation};
pub use classifier::{BuildError, BuildErrorKind, ErrorClassifier, Severity};
