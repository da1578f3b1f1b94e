//! Stage definitions and the per-run stage table.

use std::time::Duration;

use serde::Serialize;

use super::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Validate,
    Preprocess,
    Analyze,
    Generate,
    Complete,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Preprocess => "preprocess",
            Self::Analyze => "analyze",
            Self::Generate => "generate",
            Self::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Placeholder work: the sequencer just waits this long.
    Timed(Duration),
    /// Waits on the remote assessment.
    NetworkBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub id: StageId,
    pub label: &'static str,
    pub kind: StageKind,
}

/// The analysis pipeline, in execution order.
pub const ANALYSIS_STAGES: [Stage; 5] = [
    Stage {
        id: StageId::Validate,
        label: "Validating data",
        kind: StageKind::Timed(Duration::from_millis(500)),
    },
    Stage {
        id: StageId::Preprocess,
        label: "Preprocessing",
        kind: StageKind::Timed(Duration::from_millis(800)),
    },
    Stage {
        id: StageId::Analyze,
        label: "AI analysis",
        kind: StageKind::NetworkBound,
    },
    Stage {
        id: StageId::Generate,
        label: "Generating results",
        kind: StageKind::Timed(Duration::from_millis(500)),
    },
    Stage {
        id: StageId::Complete,
        label: "Complete",
        kind: StageKind::Timed(Duration::from_millis(300)),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageState {
    pub stage: Stage,
    pub status: StageStatus,
}

/// Status of every stage in one run, indexed by position.
///
/// Enforces the ordering rules: one running stage at a time, and a stage
/// only starts once its predecessor is done.
#[derive(Debug, Clone)]
pub struct StageTable {
    states: Vec<StageState>,
}

impl StageTable {
    pub fn new(stages: &[Stage]) -> Self {
        Self {
            states: stages
                .iter()
                .map(|&stage| StageState {
                    stage,
                    status: StageStatus::Pending,
                })
                .collect(),
        }
    }

    pub fn start(&mut self, index: usize) -> Result<(), PipelineError> {
        if index > 0 {
            let previous = self.get(index - 1)?;
            if previous.status != StageStatus::Done {
                return Err(PipelineError::OutOfOrder {
                    stage: self.get(index)?.stage.id.as_str(),
                    previous: previous.stage.id.as_str(),
                });
            }
        }
        self.transition(index, StageStatus::Pending, StageStatus::Running)
    }

    pub fn finish(&mut self, index: usize) -> Result<(), PipelineError> {
        self.transition(index, StageStatus::Running, StageStatus::Done)
    }

    pub fn fail(&mut self, index: usize) -> Result<(), PipelineError> {
        self.transition(index, StageStatus::Running, StageStatus::Error)
    }

    pub fn states(&self) -> &[StageState] {
        &self.states
    }

    pub fn status(&self, index: usize) -> Option<StageStatus> {
        self.states.get(index).map(|s| s.status)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn get(&self, index: usize) -> Result<&StageState, PipelineError> {
        self.states
            .get(index)
            .ok_or(PipelineError::UnknownStage(index))
    }

    fn transition(
        &mut self,
        index: usize,
        from: StageStatus,
        to: StageStatus,
    ) -> Result<(), PipelineError> {
        let state = self
            .states
            .get_mut(index)
            .ok_or(PipelineError::UnknownStage(index))?;
        if state.status != from {
            return Err(PipelineError::InvalidTransition {
                stage: state.stage.id.as_str(),
                target: to.as_str(),
                current: state.status.as_str(),
            });
        }
        state.status = to;
        Ok(())
    }
}
