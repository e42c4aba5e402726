//! Fix Advisory
//!
//! Maps a classified build failure to a remediation and decides whether
//! another automated attempt is worthwhile.

use serde::Serialize;

use super::classifier::{BuildError, BuildErrorKind};
use crate::constants::recovery as recovery_constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixAction {
    RegenerateUnit,
    AddMissingReference,
    UpdateDependencies,
    RemoveDuplicate,
    UpdateManifest,
    CreateResource,
    ManualReview,
}

impl FixAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegenerateUnit => "regenerate-unit",
            Self::AddMissingReference => "add-missing-reference",
            Self::UpdateDependencies => "update-dependencies",
            Self::RemoveDuplicate => "remove-duplicate",
            Self::UpdateManifest => "update-manifest",
            Self::CreateResource => "create-resource",
            Self::ManualReview => "manual-review",
        }
    }
}

impl std::fmt::Display for FixAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation for one verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixSuggestion {
    error: BuildError,
    fix_text: String,
    action: FixAction,
    /// 0-100
    confidence: u8,
}

impl FixSuggestion {
    pub fn error(&self) -> &BuildError {
        &self.error
    }

    pub fn fix_text(&self) -> &str {
        &self.fix_text
    }

    pub fn action(&self) -> FixAction {
        self.action
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }
}

/// Whether to attempt another automated fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryRecommendation {
    pub can_retry: bool,
    pub reason: String,
    /// Always prior attempts + 1
    pub attempt_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixAdvisor {
    max_auto_fix_attempts: u32,
}

impl Default for FixAdvisor {
    fn default() -> Self {
        Self::new(recovery_constants::MAX_AUTO_FIX_ATTEMPTS)
    }
}

impl FixAdvisor {
    pub fn new(max_auto_fix_attempts: u32) -> Self {
        Self {
            max_auto_fix_attempts,
        }
    }

    pub fn max_auto_fix_attempts(&self) -> u32 {
        self.max_auto_fix_attempts
    }

    pub fn suggest(&self, error: &BuildError) -> FixSuggestion {
        let (action, confidence, fix_text) = match error.kind() {
            BuildErrorKind::SyntaxError => (
                FixAction::RegenerateUnit,
                60,
                "Check for missing semicolons, braces, or invalid syntax",
            ),
            BuildErrorKind::SymbolNotFound => (
                FixAction::AddMissingReference,
                70,
                "Add missing import statement or check symbol name",
            ),
            BuildErrorKind::UnresolvedReference => (
                FixAction::UpdateDependencies,
                75,
                "Add missing dependency to build.gradle or import file",
            ),
            BuildErrorKind::DuplicateDefinition => (
                FixAction::RemoveDuplicate,
                65,
                "Remove duplicate class or resource definition",
            ),
            BuildErrorKind::ManifestError => (
                FixAction::UpdateManifest,
                80,
                "Add missing permissions or fix manifest configuration",
            ),
            BuildErrorKind::ResourceError => (
                FixAction::CreateResource,
                85,
                "Create missing layout, drawable, or resource file",
            ),
            BuildErrorKind::DependencyError => (
                FixAction::UpdateDependencies,
                70,
                "Resolve version conflict in build.gradle",
            ),
            BuildErrorKind::Unknown => (
                FixAction::ManualReview,
                30,
                "Unknown error - manual review needed",
            ),
        };

        FixSuggestion {
            error: error.clone(),
            fix_text: fix_text.to_string(),
            action,
            confidence,
        }
    }

    /// `attempt_count` is the number of automated fixes already tried
    pub fn recommend_retry(&self, attempt_count: u32, error: &BuildError) -> RetryRecommendation {
        let attempt_number = attempt_count.saturating_add(1);

        if attempt_count >= self.max_auto_fix_attempts {
            return RetryRecommendation {
                can_retry: false,
                reason: "Maximum auto-fix attempts reached. Please review the error and provide feedback."
                    .to_string(),
                attempt_number,
            };
        }
        if !error.is_recoverable() {
            return RetryRecommendation {
                can_retry: false,
                reason: "Error type is not automatically recoverable.".to_string(),
                attempt_number,
            };
        }
        RetryRecommendation {
            can_retry: true,
            reason: "Attempting auto-fix...".to_string(),
            attempt_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::ErrorClassifier;

    fn recoverable() -> BuildError {
        ErrorClassifier::classify("error: cannot find symbol\nsymbol: foo")
    }

    fn unrecoverable() -> BuildError {
        ErrorClassifier::classify("something odd happened")
    }

    #[test]
    fn test_suggest_manifest() {
        let error = ErrorClassifier::classify("Manifest merger failed");
        let suggestion = FixAdvisor::default().suggest(&error);
        assert_eq!(suggestion.action(), FixAction::UpdateManifest);
        assert_eq!(suggestion.confidence(), 80);
        assert_eq!(suggestion.error(), &error);
    }

    #[test]
    fn test_suggestion_table() {
        let advisor = FixAdvisor::default();
        let cases = [
            ("Main.java:3: error: syntax error", FixAction::RegenerateUnit, 60),
            ("cannot find symbol", FixAction::AddMissingReference, 70),
            ("unresolved reference: Foo", FixAction::UpdateDependencies, 75),
            ("duplicate class Foo", FixAction::RemoveDuplicate, 65),
            ("resource layout/main missing", FixAction::CreateResource, 85),
            ("dependency failure", FixAction::UpdateDependencies, 70),
            ("???", FixAction::ManualReview, 30),
        ];
        for (log, action, confidence) in cases {
            let suggestion = advisor.suggest(&ErrorClassifier::classify(log));
            assert_eq!(suggestion.action(), action, "log: {}", log);
            assert_eq!(suggestion.confidence(), confidence, "log: {}", log);
            assert!(!suggestion.fix_text().is_empty());
        }
    }

    #[test]
    fn test_retry_denied_at_max() {
        let rec = FixAdvisor::default().recommend_retry(2, &recoverable());
        assert!(!rec.can_retry);
        assert!(rec.reason.starts_with("Maximum auto-fix attempts reached"));
        assert_eq!(rec.attempt_number, 3);
    }

    #[test]
    fn test_retry_allowed_first_attempt() {
        let rec = FixAdvisor::default().recommend_retry(0, &recoverable());
        assert!(rec.can_retry);
        assert_eq!(rec.attempt_number, 1);
    }

    #[test]
    fn test_retry_denied_unrecoverable() {
        let rec = FixAdvisor::default().recommend_retry(0, &unrecoverable());
        assert!(!rec.can_retry);
        assert_eq!(rec.reason, "Error type is not automatically recoverable.");
        assert_eq!(rec.attempt_number, 1);
    }

    #[test]
    fn test_max_checked_before_recoverability() {
        let rec = FixAdvisor::default().recommend_retry(5, &unrecoverable());
        assert!(rec.reason.starts_with("Maximum"));
    }

    #[test]
    fn test_configurable_max() {
        let advisor = FixAdvisor::new(4);
        assert!(advisor.recommend_retry(3, &recoverable()).can_retry);
        assert!(!advisor.recommend_retry(4, &recoverable()).can_retry);
    }
}
