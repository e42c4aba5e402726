//! App Generation Pipeline
//!
//! Drives one run through planning, code generation, project adaptation and
//! build. A failed build goes through error recovery: the log is classified,
//! a fix is suggested, and the build is retried with that fix until the
//! advisor says stop.
//!
//! The stages themselves are supplied by the caller through
//! [`PipelineStages`]; the orchestrator owns sequencing, the recovery loop,
//! cancellation and listener events.

pub mod events;
pub mod phase;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub use events::{EventReceiver, EventSender, FixSummary, PipelineEvent};
pub use phase::PipelinePhase;

use crate::constants::progress;
use crate::recovery::{BuildError, ErrorClassifier, FixAdvisor, FixSuggestion};
use crate::types::{BuildwrightError, Result, RunId};

// =============================================================================
// Stage Contract
// =============================================================================

/// Result of one build invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded { artifact: PathBuf },
    /// Raw toolchain output, fed to the classifier
    Failed { log: String },
}

/// Work performed by each phase.
///
/// A stage error fails the run immediately; only build failures reported as
/// [`BuildOutcome::Failed`] enter error recovery.
#[async_trait]
pub trait PipelineStages: Send + Sync {
    type Plan: Send + Sync;
    type Code: Send + Sync;
    type Project: Send + Sync;

    async fn plan(&self, description: &str) -> Result<Self::Plan>;

    async fn generate(&self, plan: &Self::Plan) -> Result<Self::Code>;

    async fn adapt(&self, name: &str, plan: &Self::Plan, code: &Self::Code)
    -> Result<Self::Project>;

    /// `fix` is the suggestion from the previous failed attempt, if any
    async fn build(
        &self,
        project: &Self::Project,
        fix: Option<&FixSuggestion>,
    ) -> Result<BuildOutcome>;
}

// =============================================================================
// Outcome & Status
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Succeeded {
        artifact: PathBuf,
        build_attempts: u32,
    },
    Failed {
        phase: PipelinePhase,
        message: String,
        /// Present when the run stopped in error recovery
        error: Option<BuildError>,
        suggestion: Option<FixSuggestion>,
    },
    Cancelled {
        phase: PipelinePhase,
    },
    /// `run` was called on an orchestrator that already started its run
    Rejected {
        phase: PipelinePhase,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn final_phase(&self) -> PipelinePhase {
        match self {
            Self::Succeeded { .. } => PipelinePhase::Succeeded,
            Self::Failed { .. } => PipelinePhase::Failed,
            Self::Cancelled { .. } => PipelinePhase::Cancelled,
            Self::Rejected { phase } => *phase,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub run_id: String,
    pub phase: PipelinePhase,
    pub build_attempts: u32,
    pub max_auto_fix_attempts: u32,
    pub cancel_requested: bool,
}

impl PipelineStatus {
    pub fn summary(&self) -> String {
        format!(
            "Run {} | Phase: {} | Builds: {} (max auto-fixes: {}){}",
            self.run_id,
            self.phase,
            self.build_attempts,
            self.max_auto_fix_attempts,
            if self.cancel_requested {
                " | cancel requested"
            } else {
                ""
            }
        )
    }
}

#[derive(Debug)]
struct RunState {
    phase: PipelinePhase,
    build_attempts: u32,
    started: bool,
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct PipelineOrchestrator<S: PipelineStages> {
    stages: S,
    advisor: FixAdvisor,
    events: EventSender,
    cancel: CancellationToken,
    run_id: RunId,
    state: Mutex<RunState>,
}

impl<S: PipelineStages> PipelineOrchestrator<S> {
    pub fn new(stages: S) -> (Self, EventReceiver) {
        let (events, rx) = EventSender::channel();
        let orchestrator = Self {
            stages,
            advisor: FixAdvisor::default(),
            events,
            cancel: CancellationToken::new(),
            run_id: RunId::generate(),
            state: Mutex::new(RunState {
                phase: PipelinePhase::Planning,
                build_attempts: 0,
                started: false,
            }),
        };
        (orchestrator, rx)
    }

    pub fn with_advisor(mut self, advisor: FixAdvisor) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Clone of the flag observed by this run
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn status(&self) -> PipelineStatus {
        let state = self.lock();
        PipelineStatus {
            run_id: self.run_id.to_string(),
            phase: state.phase,
            build_attempts: state.build_attempts,
            max_auto_fix_attempts: self.advisor.max_auto_fix_attempts(),
            cancel_requested: self.cancel.is_cancelled(),
        }
    }

    /// Run the pipeline to a terminal phase
    #[instrument(skip(self, description), fields(run_id = %self.run_id))]
    pub async fn run(&self, name: &str, description: &str) -> PipelineOutcome {
        if let Err(phase) = self.claim() {
            warn!(%phase, "Pipeline run already started, ignoring");
            return PipelineOutcome::Rejected { phase };
        }
        match self.run_internal(name, description).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail(e),
        }
    }

    async fn run_internal(&self, name: &str, description: &str) -> Result<PipelineOutcome> {
        info!("Pipeline: Starting");

        // ===== PHASE 1: Planning =====
        if let Some(outcome) = self.check_cancelled() {
            return Ok(outcome);
        }
        self.started(PipelinePhase::Planning, "Analyzing app description");
        let Some(plan) = self.guarded(self.stages.plan(description)).await? else {
            return Ok(self.cancelled());
        };
        self.progress("App structure planned", progress::PLANNED);
        self.completed(PipelinePhase::Planning, "Plan ready");

        // ===== PHASE 2: Code Generation =====
        if let Some(outcome) = self.check_cancelled() {
            return Ok(outcome);
        }
        self.advance(PipelinePhase::CodeGeneration)?;
        self.started(PipelinePhase::CodeGeneration, "Generating source code");
        let Some(code) = self.guarded(self.stages.generate(&plan)).await? else {
            return Ok(self.cancelled());
        };
        self.progress("Source code generated", progress::GENERATED);
        self.completed(PipelinePhase::CodeGeneration, "Code ready");

        // ===== PHASE 3: Project Adaptation =====
        if let Some(outcome) = self.check_cancelled() {
            return Ok(outcome);
        }
        self.advance(PipelinePhase::ProjectAdaptation)?;
        self.started(
            PipelinePhase::ProjectAdaptation,
            format!("Adapting project '{}'", name),
        );
        let Some(project) = self
            .guarded(self.stages.adapt(name, &plan, &code))
            .await?
        else {
            return Ok(self.cancelled());
        };
        self.progress("Project adapted", progress::ADAPTED);
        self.completed(PipelinePhase::ProjectAdaptation, "Project ready");

        // ===== PHASE 4: Build & Recovery =====
        self.build_loop(&project).await
    }

    async fn build_loop(&self, project: &S::Project) -> Result<PipelineOutcome> {
        let mut fix: Option<FixSuggestion> = None;

        loop {
            if let Some(outcome) = self.check_cancelled() {
                return Ok(outcome);
            }
            self.advance(PipelinePhase::Build)?;
            let attempt = self.lock().build_attempts;

            self.started(PipelinePhase::Build, format!("Build attempt {}", attempt));
            self.progress("Building project", progress::BUILD_STARTED);
            let Some(outcome) = self
                .guarded(self.stages.build(project, fix.as_ref()))
                .await?
            else {
                return Ok(self.cancelled());
            };

            let log = match outcome {
                BuildOutcome::Succeeded { artifact } => {
                    self.completed(PipelinePhase::Build, artifact.display().to_string());
                    self.advance(PipelinePhase::Succeeded)?;
                    self.progress("Build complete", progress::DONE);
                    self.events.emit(PipelineEvent::BuildSucceeded {
                        artifact: artifact.clone(),
                    });
                    info!(attempts = attempt, "Pipeline: Build succeeded");
                    return Ok(PipelineOutcome::Succeeded {
                        artifact,
                        build_attempts: attempt,
                    });
                }
                BuildOutcome::Failed { log } => log,
            };

            warn!(attempt, "Build failed, entering error recovery");
            self.advance(PipelinePhase::ErrorRecovery)?;
            self.started(PipelinePhase::ErrorRecovery, "Analyzing build output");

            let error = ErrorClassifier::classify(&log);
            self.progress(
                format!("Error analyzed: {}", error.kind()),
                progress::ERROR_ANALYZED,
            );

            let suggestion = self.advisor.suggest(&error);
            self.progress(
                format!(
                    "Fix suggested: {} ({}% confidence)",
                    suggestion.action(),
                    suggestion.confidence()
                ),
                progress::FIX_SUGGESTED,
            );

            let recommendation = self.advisor.recommend_retry(attempt, &error);
            if !recommendation.can_retry {
                warn!(kind = %error.kind(), "Recovery stopped: {}", recommendation.reason);
                self.events.emit(PipelineEvent::Error {
                    phase: PipelinePhase::ErrorRecovery,
                    message: error.to_string(),
                    fix: Some(FixSummary::new(&suggestion, &recommendation)),
                });
                self.advance(PipelinePhase::Failed)?;
                return Ok(PipelineOutcome::Failed {
                    phase: PipelinePhase::ErrorRecovery,
                    message: recommendation.reason,
                    error: Some(error),
                    suggestion: Some(suggestion),
                });
            }

            self.progress(
                format!("Retrying build (attempt {})", recommendation.attempt_number),
                progress::RETRYING,
            );
            self.completed(PipelinePhase::ErrorRecovery, recommendation.reason);
            fix = Some(suggestion);
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn lock(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Each orchestrator serves one run; later callers get the current phase
    fn claim(&self) -> std::result::Result<(), PipelinePhase> {
        let mut state = self.lock();
        if state.started {
            return Err(state.phase);
        }
        state.started = true;
        Ok(())
    }

    fn phase(&self) -> PipelinePhase {
        self.lock().phase
    }

    fn advance(&self, to: PipelinePhase) -> Result<()> {
        let mut state = self.lock();
        let from = state.phase;
        if !from.can_transition_to(to) {
            return Err(BuildwrightError::InvalidTransition { from, to });
        }
        debug!(%from, %to, "Phase transition");
        state.phase = to;
        if to == PipelinePhase::Build {
            state.build_attempts += 1;
        }
        Ok(())
    }

    /// Awaits a stage unless cancellation arrives first (`Ok(None)`)
    async fn guarded<T>(&self, stage: impl Future<Output = Result<T>>) -> Result<Option<T>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            result = stage => result.map(Some),
        }
    }

    fn check_cancelled(&self) -> Option<PipelineOutcome> {
        self.cancel.is_cancelled().then(|| self.cancelled())
    }

    fn cancelled(&self) -> PipelineOutcome {
        let phase = self.phase();
        info!(%phase, "Pipeline: Cancelled");
        if let Err(e) = self.advance(PipelinePhase::Cancelled) {
            debug!("Cancel after terminal phase ignored: {}", e);
        }
        self.events.emit(PipelineEvent::Cancelled { phase });
        PipelineOutcome::Cancelled { phase }
    }

    fn fail(&self, e: BuildwrightError) -> PipelineOutcome {
        let phase = self.phase();
        let message = e.to_string();
        error!(%phase, "Pipeline failed: {}", message);
        self.events.emit(PipelineEvent::Error {
            phase,
            message: message.clone(),
            fix: None,
        });
        if let Err(e) = self.advance(PipelinePhase::Failed) {
            debug!("Failure after terminal phase ignored: {}", e);
        }
        PipelineOutcome::Failed {
            phase,
            message,
            error: None,
            suggestion: None,
        }
    }

    fn started(&self, phase: PipelinePhase, detail: impl Into<String>) {
        let detail = detail.into();
        info!("{}: {}", phase, detail);
        self.events
            .emit(PipelineEvent::PhaseStarted { phase, detail });
    }

    fn progress(&self, message: impl Into<String>, percent: u8) {
        self.events.emit(PipelineEvent::PhaseProgress {
            message: message.into(),
            percent,
        });
    }

    fn completed(&self, phase: PipelinePhase, result: impl Into<String>) {
        self.events.emit(PipelineEvent::PhaseCompleted {
            phase,
            result: result.into(),
        });
    }
}

impl<S: PipelineStages> std::fmt::Debug for PipelineOrchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("run_id", &self.run_id)
            .field("advisor", &self.advisor)
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
