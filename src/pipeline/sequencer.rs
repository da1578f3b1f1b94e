//! Drives one analysis run through the stage list.
//!
//! validate → preprocess → analyze (remote) → generate → complete,
//! then the result is stored and the run hands off to the result view.
//!
//! Engines are injected as traits (`Assessor`, `ResultSink`) so the
//! sequencer runs unchanged against mocks in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use super::assessment::Assessor;
use super::sink::ResultSink;
use super::stages::{Stage, StageId, StageKind, StageStatus, StageTable, ANALYSIS_STAGES};
use crate::models::{AssessmentResult, Case};

/// Message on the failed stage when the failure carries none.
pub const FALLBACK_FAILURE_MESSAGE: &str = "AI analysis failed";

pub const CASE_NOT_FOUND_MESSAGE: &str = "Case data not found";

/// Pause between the last stage and the hand-off to the result view.
pub const HANDOFF_DELAY: Duration = Duration::from_millis(800);

/// Sleep granularity for teardown responsiveness during timed stages.
const TEARDOWN_POLL: Duration = Duration::from_millis(50);

pub fn result_path(case_id: &str) -> String {
    format!("/cases/{case_id}/result")
}

// ═══════════════════════════════════════════════════════════
// Progress
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed { result_path: String },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageView {
    pub id: StageId,
    pub label: &'static str,
    pub status: StageStatus,
}

/// Observable state of a run, published after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub case_id: String,
    /// Index of the stage most recently reached.
    pub current_stage: usize,
    pub stages: Vec<StageView>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSnapshot {
    fn capture(case_id: &str, current_stage: usize, table: &StageTable, status: RunStatus) -> Self {
        Self {
            case_id: case_id.to_string(),
            current_stage,
            stages: table
                .states()
                .iter()
                .map(|s| StageView {
                    id: s.stage.id,
                    label: s.stage.label,
                    status: s.status,
                })
                .collect(),
            status,
            error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }
}

/// Receives run snapshots.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, snapshot: RunSnapshot);
}

impl ProgressSink for watch::Sender<RunSnapshot> {
    fn publish(&self, snapshot: RunSnapshot) {
        // Keeps the latest value even with no receiver attached.
        self.send_replace(snapshot);
    }
}

// ═══════════════════════════════════════════════════════════
// Control
// ═══════════════════════════════════════════════════════════

/// Teardown flag shared between a run and whoever started it.
///
/// Once set, the run stops advancing and publishes nothing further. An
/// assessment already in flight is left to finish and its result dropped.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    torn_down: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::Relaxed);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// `result` is `None` only for stage lists without a network stage.
    Completed { result: Option<AssessmentResult> },
    /// `stage` is `None` when the run failed before any stage started.
    Failed { stage: Option<StageId>, message: String },
    Abandoned,
}

// ═══════════════════════════════════════════════════════════
// Sequencer
// ═══════════════════════════════════════════════════════════

pub struct AnalysisSequencer {
    stages: Vec<Stage>,
    assessor: Arc<dyn Assessor>,
    sink: Arc<dyn ResultSink>,
    handoff_delay: Duration,
}

impl AnalysisSequencer {
    pub fn new(assessor: Arc<dyn Assessor>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            stages: ANALYSIS_STAGES.to_vec(),
            assessor,
            sink,
            handoff_delay: HANDOFF_DELAY,
        }
    }

    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_handoff_delay(mut self, delay: Duration) -> Self {
        self.handoff_delay = delay;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn assessor(&self) -> &Arc<dyn Assessor> {
        &self.assessor
    }

    /// Snapshot of a run that has not reached its first stage yet.
    pub fn initial_snapshot(&self, case_id: &str) -> RunSnapshot {
        RunSnapshot::capture(case_id, 0, &StageTable::new(&self.stages), RunStatus::Running)
    }

    /// Run every stage in order against `case`.
    ///
    /// `case` is `None` when no readable intake data exists for `case_id`;
    /// the run then fails before any stage starts.
    pub async fn run(
        &self,
        case_id: &str,
        case: Option<Case>,
        control: &RunControl,
        progress: &dyn ProgressSink,
    ) -> RunOutcome {
        let mut table = StageTable::new(&self.stages);

        let Some(case) = case else {
            tracing::warn!(case_id, "No case data, analysis not started");
            return self.fail(case_id, 0, None, &table, CASE_NOT_FOUND_MESSAGE.to_string(), control, progress);
        };

        tracing::info!(case_id, stages = self.stages.len(), "Analysis run started");
        let mut result: Option<AssessmentResult> = None;
        let last = self.stages.len().saturating_sub(1);

        for (index, stage) in self.stages.iter().enumerate() {
            if control.is_torn_down() {
                return abandoned(case_id, stage.id);
            }
            if let Err(e) = table.start(index) {
                return self.fail(case_id, index, Some(stage.id), &table, e.to_string(), control, progress);
            }
            progress.publish(RunSnapshot::capture(case_id, index, &table, RunStatus::Running));
            tracing::debug!(case_id, stage = stage.id.as_str(), "Stage running");

            let step = match stage.kind {
                StageKind::Timed(duration) => {
                    sleep_unless_torn_down(duration, control).await;
                    Ok(())
                }
                StageKind::NetworkBound => match self.assessor.assess(&case).await {
                    Ok(r) => {
                        result = Some(r);
                        Ok(())
                    }
                    Err(e) => Err(e.to_string()),
                },
            };

            if control.is_torn_down() {
                return abandoned(case_id, stage.id);
            }

            // The result is stored as part of the final stage's work. A write
            // that has begun is allowed to finish even if teardown arrives
            // meanwhile; the run then ends abandoned with nothing published.
            let step = match (step, index == last, &result) {
                (Ok(()), true, Some(r)) => {
                    let stored = self.sink.persist(case_id, r).await.map_err(|e| e.to_string());
                    if control.is_torn_down() {
                        tracing::info!(case_id, stored = stored.is_ok(), "Run torn down while storing result");
                        return RunOutcome::Abandoned;
                    }
                    stored
                }
                (step, _, _) => step,
            };

            if let Err(message) = step {
                if let Err(e) = table.fail(index) {
                    tracing::warn!(case_id, stage = stage.id.as_str(), error = %e, "Stage could not be marked failed");
                }
                return self.fail(case_id, index, Some(stage.id), &table, message, control, progress);
            }
            if let Err(e) = table.finish(index) {
                return self.fail(case_id, index, Some(stage.id), &table, e.to_string(), control, progress);
            }
            progress.publish(RunSnapshot::capture(case_id, index, &table, RunStatus::Running));
        }

        sleep_unless_torn_down(self.handoff_delay, control).await;
        if control.is_torn_down() {
            tracing::info!(case_id, "Run torn down before hand-off");
            return RunOutcome::Abandoned;
        }

        progress.publish(RunSnapshot::capture(
            case_id,
            last,
            &table,
            RunStatus::Completed {
                result_path: result_path(case_id),
            },
        ));
        tracing::info!(case_id, "Analysis run completed");
        RunOutcome::Completed { result }
    }

    #[allow(clippy::too_many_arguments)]
    fn fail(
        &self,
        case_id: &str,
        index: usize,
        stage: Option<StageId>,
        table: &StageTable,
        message: String,
        control: &RunControl,
        progress: &dyn ProgressSink,
    ) -> RunOutcome {
        let message = if message.trim().is_empty() {
            FALLBACK_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        tracing::warn!(
            case_id,
            stage = stage.map(|s| s.as_str()),
            error = %message,
            "Analysis run failed"
        );
        if !control.is_torn_down() {
            let mut snapshot = RunSnapshot::capture(case_id, index, table, RunStatus::Failed);
            snapshot.error = Some(message.clone());
            progress.publish(snapshot);
        }
        RunOutcome::Failed { stage, message }
    }
}

fn abandoned(case_id: &str, stage: StageId) -> RunOutcome {
    tracing::info!(case_id, stage = stage.as_str(), "Run torn down, result discarded");
    RunOutcome::Abandoned
}

/// Sleep in small increments so a teardown is noticed promptly.
async fn sleep_unless_torn_down(duration: Duration, control: &RunControl) {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if control.is_torn_down() {
            return;
        }
        let slice = remaining.min(TEARDOWN_POLL);
        tokio::time::sleep(slice).await;
        remaining -= slice;
    }
}
