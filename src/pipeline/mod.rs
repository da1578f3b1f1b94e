//! Case analysis pipeline: a fixed sequence of stages run against one
//! case, with the `analyze` stage delegating to the remote assessor.

pub mod assessment;
pub mod runs;
pub mod sequencer;
pub mod sink;
pub mod stages;

pub use runs::AnalysisRuns;
pub use sequencer::{AnalysisSequencer, ProgressSink, RunControl, RunOutcome, RunSnapshot, RunStatus};
pub use sink::{ResultSink, StoreResultSink};
pub use stages::{Stage, StageId, StageKind, StageStatus, StageTable, ANALYSIS_STAGES};

use thiserror::Error;

use crate::db::DatabaseError;
use assessment::AssessmentError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage {stage} cannot move to {target}: currently {current}")]
    InvalidTransition {
        stage: &'static str,
        target: &'static str,
        current: &'static str,
    },

    #[error("Stage {stage} cannot start before {previous} is done")]
    OutOfOrder {
        stage: &'static str,
        previous: &'static str,
    },

    #[error("Stage index {0} out of range")]
    UnknownStage(usize),

    #[error("Analysis already running for {0}")]
    AlreadyRunning(String),

    #[error("{0}")]
    Assessment(#[from] AssessmentError),

    #[error("Failed to store result: {0}")]
    Sink(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
