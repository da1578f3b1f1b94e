//! Registry of live analysis runs, at most one per case.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::sequencer::{AnalysisSequencer, RunControl, RunOutcome, RunSnapshot};
use super::PipelineError;
use crate::models::Case;

struct RunHandle {
    control: RunControl,
    progress: watch::Receiver<RunSnapshot>,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    fn is_live(&self) -> bool {
        !self.task.is_finished() && self.progress.borrow().is_running()
    }
}

#[derive(Default)]
pub struct AnalysisRuns {
    runs: Mutex<HashMap<String, RunHandle>>,
}

impl AnalysisRuns {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RunHandle>> {
        // Handles stay consistent even if a holder panicked.
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn a run for `case_id` on the current runtime.
    ///
    /// A live run for the same case is rejected unless `restart` is set, in
    /// which case the old run is torn down first. Finished runs are simply
    /// replaced.
    pub fn start(
        &self,
        sequencer: Arc<AnalysisSequencer>,
        case_id: &str,
        case: Option<Case>,
        restart: bool,
    ) -> Result<watch::Receiver<RunSnapshot>, PipelineError> {
        let mut runs = self.lock();
        if let Some(existing) = runs.get(case_id) {
            if existing.is_live() {
                if !restart {
                    return Err(PipelineError::AlreadyRunning(case_id.to_string()));
                }
                tracing::info!(case_id, "Restarting analysis run");
                existing.control.teardown();
            }
        }

        let (tx, rx) = watch::channel(sequencer.initial_snapshot(case_id));
        let control = RunControl::new();
        let task = {
            let control = control.clone();
            let case_id = case_id.to_string();
            tokio::spawn(async move { sequencer.run(&case_id, case, &control, &tx).await })
        };

        runs.insert(
            case_id.to_string(),
            RunHandle {
                control,
                progress: rx.clone(),
                task,
            },
        );
        Ok(rx)
    }

    /// Latest published state of the run for `case_id`.
    pub fn snapshot(&self, case_id: &str) -> Option<RunSnapshot> {
        self.lock()
            .get(case_id)
            .map(|h| h.progress.borrow().clone())
    }

    pub fn subscribe(&self, case_id: &str) -> Option<watch::Receiver<RunSnapshot>> {
        self.lock().get(case_id).map(|h| h.progress.clone())
    }

    /// Tear down and forget the run for `case_id`. Returns false if none.
    pub fn abandon(&self, case_id: &str) -> bool {
        match self.lock().remove(case_id) {
            Some(handle) => {
                handle.control.teardown();
                tracing::info!(case_id, "Analysis run abandoned");
                true
            }
            None => false,
        }
    }

    pub fn abandon_all(&self) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, handle) in &drained {
            handle.control.teardown();
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Abandoned all analysis runs");
        }
        drained.len()
    }
}
