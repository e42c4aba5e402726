//! Build Log Classification
//!
//! Turns raw build-toolchain output into a typed [`BuildError`] verdict.
//! Rules are checked in a fixed priority order against the lowercased log;
//! the first rule with a matching keyword wins. Each category then pulls a
//! focused message out of the original text when its pattern matches.
//!
//! The resource rule fires on a bare `@`, so any earlier-unmatched log that
//! mentions an annotation, an email address or an `@string/...` reference is
//! classified as a resource error. [`BuildError::trigger`] records which
//! keyword fired so such verdicts can be spotted.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::constants::recovery as recovery_constants;

// =============================================================================
// Verdict Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildErrorKind {
    SymbolNotFound,
    UnresolvedReference,
    DuplicateDefinition,
    SyntaxError,
    ManifestError,
    ResourceError,
    DependencyError,
    Unknown,
}

impl BuildErrorKind {
    pub const ALL: [BuildErrorKind; 8] = [
        Self::SymbolNotFound,
        Self::UnresolvedReference,
        Self::DuplicateDefinition,
        Self::SyntaxError,
        Self::ManifestError,
        Self::ResourceError,
        Self::DependencyError,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SymbolNotFound => "symbol-not-found",
            Self::UnresolvedReference => "unresolved-reference",
            Self::DuplicateDefinition => "duplicate-definition",
            Self::SyntaxError => "syntax-error",
            Self::ManifestError => "manifest-error",
            Self::ResourceError => "resource-error",
            Self::DependencyError => "dependency-error",
            Self::Unknown => "unknown",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::SyntaxError | Self::DuplicateDefinition => Severity::Critical,
            Self::SymbolNotFound | Self::UnresolvedReference | Self::DependencyError => {
                Severity::High
            }
            Self::ManifestError | Self::ResourceError | Self::Unknown => Severity::Medium,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for BuildErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Classification verdict. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildError {
    kind: BuildErrorKind,
    message: String,
    details: String,
    severity: Severity,
    recoverable: bool,
    trigger: Option<&'static str>,
}

impl BuildError {
    fn new(
        kind: BuildErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
        trigger: Option<&'static str>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            details: details.into(),
            severity: kind.severity(),
            recoverable: kind.is_recoverable(),
            trigger,
        }
    }

    pub fn kind(&self) -> BuildErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Keyword that selected the category (`None` for unknown)
    pub fn trigger(&self) -> Option<&'static str> {
        self.trigger
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind, self.message)
    }
}

// =============================================================================
// Rules
// =============================================================================

/// Priority-ordered keyword rules (lowercase)
const RULES: &[(BuildErrorKind, &[&str])] = &[
    (
        BuildErrorKind::SymbolNotFound,
        &["not found", "cannot find symbol"],
    ),
    (
        BuildErrorKind::UnresolvedReference,
        &["cannot resolve", "unresolved reference"],
    ),
    (
        BuildErrorKind::DuplicateDefinition,
        &["duplicate", "already defined"],
    ),
    (
        BuildErrorKind::SyntaxError,
        &["syntax error", "unexpected token"],
    ),
    (BuildErrorKind::ManifestError, &["permission", "manifest"]),
    // Bare "@" is very broad; kept for ordering compatibility
    (BuildErrorKind::ResourceError, &["resource", "@"]),
    (
        BuildErrorKind::DependencyError,
        &["dependency", "version conflict"],
    ),
];

// Literal patterns, checked by `test_patterns_compile`
static SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)cannot find symbol.*?symbol:\s*(\w+)").expect("symbol pattern")
});
static UNRESOLVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)unresolved reference.*?['"]?([\w.]+)['"]?"#).expect("unresolved pattern")
});
static DUPLICATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)duplicate.*?entry\s*['"]?([\w.]+)['"]?"#).expect("duplicate pattern")
});
static SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i):(\d+):\s*error:\s*(.+)").expect("syntax pattern"));
static RESOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)resource.*?['"]?([\w/.]+)['"]?.*?not"#).expect("resource pattern")
});

fn group<'t>(caps: &Captures<'t>, i: usize) -> Option<&'t str> {
    caps.get(i).map(|m| m.as_str())
}

fn capture_first<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|c| group(&c, 1))
}

// =============================================================================
// Classifier
// =============================================================================

/// Stateless build-log classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify raw build output. Pure: identical input gives identical output.
    pub fn classify(log: &str) -> BuildError {
        if log.is_empty() {
            return BuildError::new(BuildErrorKind::Unknown, "Build output is empty", "", None);
        }

        let lower = log.to_lowercase();
        let matched = RULES.iter().find_map(|(kind, keywords)| {
            keywords
                .iter()
                .find(|kw| lower.contains(*kw))
                .map(|kw| (*kind, *kw))
        });

        let Some((kind, trigger)) = matched else {
            let message: String = log
                .chars()
                .take(recovery_constants::UNKNOWN_MESSAGE_CHARS)
                .collect();
            return BuildError::new(
                BuildErrorKind::Unknown,
                message,
                "No known error pattern matched",
                None,
            );
        };

        if trigger == "@" {
            tracing::debug!("Resource error selected by bare '@' rule");
        }

        let (message, details) = Self::describe(kind, log, &lower);
        BuildError::new(kind, message, details, Some(trigger))
    }

    /// Focused message and details for a matched category
    fn describe(kind: BuildErrorKind, log: &str, lower: &str) -> (String, String) {
        match kind {
            BuildErrorKind::SymbolNotFound => match capture_first(&SYMBOL, log) {
                Some(symbol) => (
                    format!("Symbol '{}' not found", symbol),
                    format!("Missing import or undefined symbol: {}", symbol),
                ),
                None => (
                    "Symbol not found".to_string(),
                    "Missing import or undefined symbol".to_string(),
                ),
            },
            BuildErrorKind::UnresolvedReference => {
                let reference = capture_first(&UNRESOLVED, log);
                (
                    match reference {
                        Some(r) => format!("Unresolved reference: {}", r),
                        None => "Unresolved reference".to_string(),
                    },
                    "Likely missing dependency or import".to_string(),
                )
            }
            BuildErrorKind::DuplicateDefinition => {
                let entry = capture_first(&DUPLICATE, log);
                (
                    match entry {
                        Some(e) => format!("Duplicate definition: {}", e),
                        None => "Duplicate definition".to_string(),
                    },
                    "Class or resource already defined elsewhere".to_string(),
                )
            }
            BuildErrorKind::SyntaxError => match SYNTAX.captures(log) {
                Some(c) => (
                    format!("Syntax error at line {}", group(&c, 1).unwrap_or("?")),
                    group(&c, 2).unwrap_or_default().trim().to_string(),
                ),
                None => (
                    "Syntax error".to_string(),
                    "Check for missing braces, semicolons, or invalid syntax".to_string(),
                ),
            },
            BuildErrorKind::ManifestError => {
                if lower.contains("permission") {
                    (
                        "Manifest permission error".to_string(),
                        "Missing permission declaration in AndroidManifest.xml".to_string(),
                    )
                } else {
                    (
                        "AndroidManifest.xml error".to_string(),
                        "Invalid manifest configuration".to_string(),
                    )
                }
            }
            BuildErrorKind::ResourceError => {
                let resource = capture_first(&RESOURCE, log);
                (
                    match resource {
                        Some(r) => format!("Resource not found: {}", r),
                        None => "Resource error".to_string(),
                    },
                    "Missing layout, drawable, or resource file".to_string(),
                )
            }
            BuildErrorKind::DependencyError => (
                "Dependency resolution error".to_string(),
                "Version conflict or missing dependency in build.gradle".to_string(),
            ),
            BuildErrorKind::Unknown => (String::new(), String::new()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_symbol_not_found() {
        let err = ErrorClassifier::classify("error: cannot find symbol\nsymbol: foo");
        assert_eq!(err.kind(), BuildErrorKind::SymbolNotFound);
        assert_eq!(err.severity(), Severity::High);
        assert!(err.is_recoverable());
        assert_eq!(err.message(), "Symbol 'foo' not found");
        assert_eq!(err.details(), "Missing import or undefined symbol: foo");
    }

    #[test]
    fn test_empty_input() {
        let err = ErrorClassifier::classify("");
        assert_eq!(err.kind(), BuildErrorKind::Unknown);
        assert_eq!(err.message(), "Build output is empty");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_unknown_truncates_to_200_chars() {
        let log = "z".repeat(500);
        let err = ErrorClassifier::classify(&log);
        assert_eq!(err.kind(), BuildErrorKind::Unknown);
        assert_eq!(err.message().chars().count(), 200);
        assert_eq!(err.severity(), Severity::Medium);
        assert!(err.trigger().is_none());
    }

    #[test]
    fn test_unknown_truncation_is_char_safe() {
        let log = "é".repeat(300);
        assert_eq!(ErrorClassifier::classify(&log).message().chars().count(), 200);
    }

    #[test]
    fn test_unresolved_reference() {
        let err = ErrorClassifier::classify("e: MainActivity.kt: Unresolved reference: viewBinding");
        assert_eq!(err.kind(), BuildErrorKind::UnresolvedReference);
        assert_eq!(err.message(), "Unresolved reference: viewBinding");
        assert_eq!(err.severity(), Severity::High);
    }

    #[test]
    fn test_duplicate_definition() {
        let err = ErrorClassifier::classify("java.util.zip.ZipException: duplicate entry: com/app/R.class");
        assert_eq!(err.kind(), BuildErrorKind::DuplicateDefinition);
        assert_eq!(err.severity(), Severity::Critical);
        assert!(err.message().starts_with("Duplicate definition"));
    }

    #[test]
    fn test_syntax_error_with_line() {
        let err = ErrorClassifier::classify(
            "Main.java:42: error: ';' expected\nsyntax error, unexpected token",
        );
        assert_eq!(err.kind(), BuildErrorKind::SyntaxError);
        assert_eq!(err.message(), "Syntax error at line 42");
        assert_eq!(err.details(), "';' expected");
        assert_eq!(err.severity(), Severity::Critical);
    }

    #[test]
    fn test_syntax_error_generic() {
        let err = ErrorClassifier::classify("Unexpected token '}'");
        assert_eq!(err.message(), "Syntax error");
        assert_eq!(
            err.details(),
            "Check for missing braces, semicolons, or invalid syntax"
        );
    }

    #[test]
    fn test_manifest_permission_vs_generic() {
        let perm = ErrorClassifier::classify("Permission denial: missing INTERNET");
        assert_eq!(perm.kind(), BuildErrorKind::ManifestError);
        assert_eq!(perm.message(), "Manifest permission error");

        let generic = ErrorClassifier::classify("Manifest merger failed");
        assert_eq!(generic.message(), "AndroidManifest.xml error");
        assert_eq!(generic.severity(), Severity::Medium);
        assert!(generic.is_recoverable());
    }

    #[test]
    fn test_resource_error_extracts_path() {
        let err = ErrorClassifier::classify("error: resource 'layout/activity_main' is not defined");
        assert_eq!(err.kind(), BuildErrorKind::ResourceError);
        assert_eq!(err.message(), "Resource not found: layout/activity_main");
        assert_eq!(err.trigger(), Some("resource"));
    }

    #[test]
    fn test_bare_at_sign_is_resource_error() {
        let err = ErrorClassifier::classify("build failed for user@example.com");
        assert_eq!(err.kind(), BuildErrorKind::ResourceError);
        assert_eq!(err.trigger(), Some("@"));
        assert_eq!(err.message(), "Resource error");
    }

    #[test]
    fn test_dependency_error() {
        let err = ErrorClassifier::classify("Could not resolve all dependencies: version conflict");
        assert_eq!(err.kind(), BuildErrorKind::DependencyError);
        assert_eq!(err.severity(), Severity::High);
        assert_eq!(err.message(), "Dependency resolution error");
    }

    #[test]
    fn test_priority_symbol_beats_resource() {
        let err = ErrorClassifier::classify("resource drawable/icon not found");
        assert_eq!(err.kind(), BuildErrorKind::SymbolNotFound);
    }

    #[test]
    fn test_adjacent_rule_priorities() {
        let cases = [
            (
                "cannot find symbol; unresolved reference Foo",
                BuildErrorKind::SymbolNotFound,
                "cannot find symbol",
            ),
            (
                "unresolved reference: Foo; duplicate class Foo",
                BuildErrorKind::UnresolvedReference,
                "unresolved reference",
            ),
            (
                "duplicate class Main; syntax error near '}'",
                BuildErrorKind::DuplicateDefinition,
                "duplicate",
            ),
            (
                "syntax error in AndroidManifest.xml",
                BuildErrorKind::SyntaxError,
                "syntax error",
            ),
            (
                "manifest merger failed: @string/app_name",
                BuildErrorKind::ManifestError,
                "manifest",
            ),
            (
                "resource merge failed after dependency update",
                BuildErrorKind::ResourceError,
                "resource",
            ),
        ];
        for (log, kind, trigger) in cases {
            let err = ErrorClassifier::classify(log);
            assert_eq!(err.kind(), kind, "{log}");
            assert_eq!(err.trigger(), Some(trigger), "{log}");
        }
    }

    #[test]
    fn test_at_sign_outranks_dependency() {
        let err = ErrorClassifier::classify("dependency com.example:lib@1.2 failed to download");
        assert_eq!(err.kind(), BuildErrorKind::ResourceError);
        assert_eq!(err.trigger(), Some("@"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_patterns_compile() {
        for re in [&SYMBOL, &UNRESOLVED, &DUPLICATE, &SYNTAX, &RESOURCE] {
            assert!(!re.as_str().is_empty());
        }
    }

    #[test]
    fn test_case_insensitive_keywords() {
        let err = ErrorClassifier::classify("DUPLICATE CLASS com.app.Main");
        assert_eq!(err.kind(), BuildErrorKind::DuplicateDefinition);
    }

    #[test]
    fn test_kind_tables() {
        for kind in BuildErrorKind::ALL {
            assert_eq!(kind.is_recoverable(), kind != BuildErrorKind::Unknown);
        }
        assert_eq!(BuildErrorKind::ManifestError.to_string(), "manifest-error");
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
    }

    proptest! {
        #[test]
        fn prop_classify_is_deterministic(log in ".{0,400}") {
            prop_assert_eq!(ErrorClassifier::classify(&log), ErrorClassifier::classify(&log));
        }

        #[test]
        fn prop_symbol_keyword_always_wins(prefix in "[a-z ]{0,40}", suffix in "[a-z@ ]{0,40}") {
            let log = format!("{}cannot find symbol{}", prefix, suffix);
            prop_assert_eq!(ErrorClassifier::classify(&log).kind(), BuildErrorKind::SymbolNotFound);
        }

        #[test]
        fn prop_unknown_only_without_keywords(log in "[b-z0-9 ]{1,300}") {
            let verdict = ErrorClassifier::classify(&log);
            let lower = log.to_lowercase();
            let any_keyword = RULES
                .iter()
                .any(|(_, kws)| kws.iter().any(|kw| lower.contains(kw)));
            prop_assert_eq!(verdict.kind() == BuildErrorKind::Unknown, !any_keyword);
        }

        #[test]
        fn prop_severity_matches_kind(log in ".{0,200}") {
            let verdict = ErrorClassifier::classify(&log);
            prop_assert_eq!(verdict.severity(), verdict.kind().severity());
            prop_assert_eq!(verdict.is_recoverable(), verdict.kind().is_recoverable());
        }
    }
}
