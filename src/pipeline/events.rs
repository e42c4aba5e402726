//! Pipeline listener events
//!
//! Delivered over an unbounded channel so the orchestrator never waits on a
//! slow or absent listener.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

use super::phase::PipelinePhase;
use crate::recovery::{FixAction, FixSuggestion, RetryRecommendation};

/// Fix details attached to a build failure event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixSummary {
    pub fix_text: String,
    pub action: FixAction,
    pub confidence: u8,
    /// Why no further automated attempt is made
    pub reason: String,
}

impl FixSummary {
    pub fn new(suggestion: &FixSuggestion, recommendation: &RetryRecommendation) -> Self {
        Self {
            fix_text: suggestion.fix_text().to_string(),
            action: suggestion.action(),
            confidence: suggestion.confidence(),
            reason: recommendation.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    PhaseStarted {
        phase: PipelinePhase,
        detail: String,
    },
    PhaseProgress {
        message: String,
        percent: u8,
    },
    PhaseCompleted {
        phase: PipelinePhase,
        result: String,
    },
    Error {
        phase: PipelinePhase,
        message: String,
        fix: Option<FixSummary>,
    },
    BuildSucceeded {
        artifact: PathBuf,
    },
    Cancelled {
        phase: PipelinePhase,
    },
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::BuildSucceeded { .. } | Self::Cancelled { .. } | Self::Error { .. }
        )
    }
}

pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

/// Sending half; sends never block and a dropped receiver is ignored
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl EventSender {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Pipeline event dropped, listener gone");
        }
    }
}
