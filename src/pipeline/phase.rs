//! Pipeline phases and the transitions allowed between them
//!
//! ```text
//! Planning ─▶ CodeGeneration ─▶ ProjectAdaptation ─▶ Build ─▶ Succeeded
//!                                                    │  ▲
//!                                                    ▼  │ retry
//!                                               ErrorRecovery
//!
//! any non-terminal ─▶ Failed | Cancelled
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Planning,
    CodeGeneration,
    ProjectAdaptation,
    Build,
    ErrorRecovery,
    Succeeded,
    Failed,
    Cancelled,
}

impl PipelinePhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Planning => "Planning",
            Self::CodeGeneration => "Code Generation",
            Self::ProjectAdaptation => "Project Adaptation",
            Self::Build => "Build",
            Self::ErrorRecovery => "Error Recovery",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: PipelinePhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Failed | Self::Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Self::Planning, Self::CodeGeneration)
                | (Self::CodeGeneration, Self::ProjectAdaptation)
                | (Self::ProjectAdaptation, Self::Build)
                | (Self::Build, Self::Succeeded)
                | (Self::Build, Self::ErrorRecovery)
                | (Self::ErrorRecovery, Self::Build)
        )
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PipelinePhase; 8] = [
        PipelinePhase::Planning,
        PipelinePhase::CodeGeneration,
        PipelinePhase::ProjectAdaptation,
        PipelinePhase::Build,
        PipelinePhase::ErrorRecovery,
        PipelinePhase::Succeeded,
        PipelinePhase::Failed,
        PipelinePhase::Cancelled,
    ];

    #[test]
    fn test_happy_path_transitions() {
        use PipelinePhase::*;
        let path = [Planning, CodeGeneration, ProjectAdaptation, Build, Succeeded];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn test_recovery_loop() {
        assert!(PipelinePhase::Build.can_transition_to(PipelinePhase::ErrorRecovery));
        assert!(PipelinePhase::ErrorRecovery.can_transition_to(PipelinePhase::Build));
        assert!(!PipelinePhase::ErrorRecovery.can_transition_to(PipelinePhase::Succeeded));
    }

    #[test]
    fn test_no_skipping_phases() {
        assert!(!PipelinePhase::Planning.can_transition_to(PipelinePhase::Build));
        assert!(!PipelinePhase::CodeGeneration.can_transition_to(PipelinePhase::Planning));
    }

    #[test]
    fn test_failed_and_cancelled_from_any_non_terminal() {
        for phase in ALL.iter().filter(|p| !p.is_terminal()) {
            assert!(phase.can_transition_to(PipelinePhase::Failed));
            assert!(phase.can_transition_to(PipelinePhase::Cancelled));
        }
    }

    #[test]
    fn test_terminal_phases_are_final() {
        for from in ALL.iter().filter(|p| p.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }
}
