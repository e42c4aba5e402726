//! Classify Command
//!
//! Classify a build log and print the suggested fix.
//!
//! Usage:
//!   buildwright classify [--file build.log] [--attempt N] [--format text|json]

use std::path::Path;

use serde::Serialize;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, read_input};
use crate::recovery::{BuildError, ErrorClassifier, FixAdvisor, FixSuggestion, RetryRecommendation};
use crate::types::Result;

#[derive(Debug, Serialize)]
pub struct ClassifyReport {
    pub error: BuildError,
    pub suggestion: FixSuggestion,
    pub retry: RetryRecommendation,
}

/// `attempt` counts builds already run for this project
pub fn analyze(log: &str, attempt: u32, advisor: &FixAdvisor) -> ClassifyReport {
    let error = ErrorClassifier::classify(log);
    let suggestion = advisor.suggest(&error);
    let retry = advisor.recommend_retry(attempt, &error);
    ClassifyReport {
        error,
        suggestion,
        retry,
    }
}

pub fn run(ctx: &CommandContext, file: Option<&Path>, attempt: u32, format: &str) -> Result<()> {
    let log = read_input(file)?;
    let advisor = FixAdvisor::new(ctx.config.recovery.max_auto_fix_attempts);
    let report = analyze(&log, attempt, &advisor);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let out = Output::new();
    let error = &report.error;
    out.header("Build Error");
    out.field("Kind", error.kind());
    out.field("Severity", error.severity());
    out.field("Message", error.message());
    if !error.details().is_empty() {
        out.field("Details", error.details());
    }
    if error.trigger() == Some("@") {
        out.warning("Matched on a bare '@'; verify this really is a resource problem");
    }

    out.section("Suggested Fix");
    println!(
        "  {} ({}, {}% confidence)",
        report.suggestion.fix_text(),
        report.suggestion.action(),
        report.suggestion.confidence()
    );

    println!();
    if report.retry.can_retry {
        out.success(&format!(
            "Retry as build {}: {}",
            report.retry.attempt_number, report.retry.reason
        ));
    } else {
        out.warning(&report.retry.reason);
    }

    Ok(())
}
