//! Application state shared by every HTTP handler and analysis run.
//!
//! Uses `RwLock` for the session so permission checks (most requests)
//! read concurrently while only sign-in, sign-out and consent write.

use std::sync::{Arc, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rusqlite::Connection;

use crate::config::{self, AssessmentConfig, DrugApiConfig};
use crate::db::{self, DatabaseError, SharedConnection};
use crate::medications::{Debouncer, DrugLookupError, DrugRegistryClient};
use crate::models::{generate_case_id, Case, CaseDraft};
use crate::pipeline::assessment::{AssessmentError, Assessor, OpenAiAssessor};
use crate::pipeline::{AnalysisRuns, AnalysisSequencer, PipelineError, RunSnapshot, StoreResultSink};
use crate::session::{SessionContext, SessionError};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

/// Wrapped in `Arc` at startup and handed to the router.
pub struct CoreState {
    db: SharedConnection,
    session: RwLock<SessionContext>,
    assessor: Arc<dyn Assessor>,
    drugs: DrugRegistryClient,
    /// Shared across search requests: a newer query supersedes older ones.
    drug_search: Debouncer,
    sequencer: Arc<AnalysisSequencer>,
    runs: AnalysisRuns,
}

impl CoreState {
    /// Build state over an open store, restoring any persisted session.
    pub fn new(
        conn: Connection,
        assessor: Arc<dyn Assessor>,
        drugs: DrugRegistryClient,
    ) -> Result<Self, CoreError> {
        let session = SessionContext::restore(&conn)?;
        let db = db::share(conn);
        let sink = Arc::new(StoreResultSink::new(db.clone()));
        let sequencer = Arc::new(AnalysisSequencer::new(assessor.clone(), sink));
        Ok(Self {
            db,
            session: RwLock::new(session),
            assessor,
            drugs,
            drug_search: Debouncer::default(),
            sequencer,
            runs: AnalysisRuns::new(),
        })
    }

    /// Production wiring: on-disk store plus clients configured from the
    /// environment.
    pub fn from_env() -> Result<Self, CoreError> {
        let conn = db::open_database(&config::store_path())?;
        let assessment = AssessmentConfig::from_env();
        if assessment.credential().is_none() {
            tracing::warn!("MEDAI_OPENAI_API_KEY not set, analyses will fail at the analyze stage");
        }
        let assessor = Arc::new(OpenAiAssessor::new(assessment)?);
        let drugs = DrugRegistryClient::new(DrugApiConfig::from_env())?;
        if !drugs.is_configured() {
            tracing::warn!("MEDAI_DRUG_API_KEY not set, medication search returns no results");
        }
        Self::new(conn, assessor, drugs)
    }

    /// Replace the analysis sequencer, e.g. to shorten stage timings.
    pub fn with_sequencer(
        mut self,
        configure: impl FnOnce(AnalysisSequencer) -> AnalysisSequencer,
    ) -> Self {
        let sink = Arc::new(StoreResultSink::new(self.db.clone()));
        self.sequencer = Arc::new(configure(AnalysisSequencer::new(self.assessor.clone(), sink)));
        self
    }

    // ── Store ───────────────────────────────────────────────

    /// Lock the store connection. Hold the guard only for synchronous work.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    // ── Session ─────────────────────────────────────────────

    pub fn read_session(&self) -> Result<RwLockReadGuard<'_, SessionContext>, CoreError> {
        self.session.read().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn write_session(&self) -> Result<RwLockWriteGuard<'_, SessionContext>, CoreError> {
        self.session.write().map_err(|_| CoreError::LockPoisoned)
    }

    // ── Clients ─────────────────────────────────────────────

    pub fn assessor(&self) -> &Arc<dyn Assessor> {
        &self.assessor
    }

    pub fn drugs(&self) -> &DrugRegistryClient {
        &self.drugs
    }

    pub fn drug_search(&self) -> &Debouncer {
        &self.drug_search
    }

    // ── Cases ───────────────────────────────────────────────

    /// Validate and store an intake submission. Returns the stored case.
    pub fn create_case(&self, draft: CaseDraft) -> Result<Case, CoreError> {
        let conn = self.conn()?;
        let mut millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        // Two submissions in the same millisecond must not share a key.
        let id = loop {
            let candidate = generate_case_id(millis);
            if db::kv_get(&conn, &db::case_data_key(&candidate))?.is_none() {
                break candidate;
            }
            millis += 1;
        };
        let case = draft.validate(id).map_err(|e| CoreError::Intake(e.to_string()))?;
        db::save_case(&conn, &case)?;
        tracing::info!(case_id = %case.id, attachments = case.files.len(), "Case created");
        Ok(case)
    }

    pub fn load_case(&self, case_id: &str) -> Result<Option<Case>, CoreError> {
        Ok(db::load_case(&*self.conn()?, case_id)?)
    }

    // ── Analysis runs ───────────────────────────────────────

    /// Start (or with `restart`, replace) the analysis run for a case.
    ///
    /// A missing or unreadable case still starts a run; it fails before
    /// the first stage and reports "Case data not found".
    pub fn start_analysis(&self, case_id: &str, restart: bool) -> Result<RunSnapshot, CoreError> {
        let case = self.load_case(case_id)?;
        let rx = self
            .runs
            .start(self.sequencer.clone(), case_id, case, restart)?;
        let snapshot = rx.borrow().clone();
        Ok(snapshot)
    }

    pub fn runs(&self) -> &AnalysisRuns {
        &self.runs
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Tear down live runs, drop pending drug searches and the in-memory session.
    pub fn shutdown(&self) {
        let abandoned = self.runs.abandon_all();
        self.drug_search.cancel();
        if let Ok(mut session) = self.session.write() {
            session.dispose();
        }
        tracing::info!(abandoned, "Core state shut down");
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("Invalid intake: {0}")]
    Intake(String),
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
    #[error("{0}")]
    Assessment(#[from] AssessmentError),
    #[error("{0}")]
    DrugLookup(#[from] DrugLookupError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssessmentResult, Questionnaire};
    use crate::pipeline::assessment::MockAssessor;
    use crate::pipeline::{RunStatus, Stage, StageKind, ANALYSIS_STAGES};
    use std::time::Duration;

    fn drugs() -> DrugRegistryClient {
        DrugRegistryClient::new(DrugApiConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".into(),
        })
        .unwrap()
    }

    fn result() -> AssessmentResult {
        serde_json::from_value(serde_json::json!({"riskLevel": "medium", "riskScore": 45})).unwrap()
    }

    fn state(mock: Arc<MockAssessor>) -> CoreState {
        let conn = db::open_memory_database().unwrap();
        CoreState::new(conn, mock, drugs()).unwrap().with_sequencer(|s| {
            let stages: Vec<Stage> = ANALYSIS_STAGES
                .iter()
                .map(|st| Stage {
                    kind: match st.kind {
                        StageKind::Timed(_) => StageKind::Timed(Duration::ZERO),
                        other => other,
                    },
                    ..*st
                })
                .collect();
            s.with_stages(stages).with_handoff_delay(Duration::ZERO)
        })
    }

    fn draft() -> CaseDraft {
        CaseDraft {
            gender: "female".into(),
            age_group: "60-69".into(),
            chief_complaint: "Shortness of breath".into(),
            questionnaire: Questionnaire {
                symptom_duration: "3 days".into(),
                ..Questionnaire::default()
            },
            files: vec![],
        }
    }

    #[test]
    fn new_state_is_signed_out() {
        let state = state(Arc::new(MockAssessor::returning(result())));
        assert!(!state.read_session().unwrap().is_authenticated());
    }

    #[test]
    fn session_restored_from_store() {
        let conn = db::open_memory_database().unwrap();
        {
            let mut session = SessionContext::new();
            session.login(&conn, "admin@example.com", "pw").unwrap();
            session.accept_consent(&conn).unwrap();
        }
        let state = CoreState::new(conn, Arc::new(MockAssessor::returning(result())), drugs()).unwrap();
        let session = state.read_session().unwrap();
        assert!(session.is_authenticated());
        assert!(session.has_consented());
    }

    #[test]
    fn create_case_assigns_distinct_ids() {
        let state = state(Arc::new(MockAssessor::returning(result())));
        let a = state.create_case(draft()).unwrap();
        let b = state.create_case(draft()).unwrap();
        assert!(a.id.starts_with("CASE-"));
        assert_ne!(a.id, b.id);
        assert_eq!(state.load_case(&a.id).unwrap().unwrap().chief_complaint, "Shortness of breath");
    }

    #[test]
    fn invalid_draft_rejected() {
        let state = state(Arc::new(MockAssessor::returning(result())));
        let err = state
            .create_case(CaseDraft {
                chief_complaint: String::new(),
                ..draft()
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Intake(m) if m.contains("chiefComplaint")));
    }

    #[tokio::test]
    async fn start_analysis_runs_to_completion() {
        let state = state(Arc::new(MockAssessor::returning(result())));
        let case = state.create_case(draft()).unwrap();
        let first = state.start_analysis(&case.id, false).unwrap();
        assert!(first.is_running());

        let mut rx = state.runs().subscribe(&case.id).unwrap();
        let done = rx.wait_for(|s| !s.is_running()).await.unwrap().clone();
        assert!(matches!(done.status, RunStatus::Completed { .. }));
        let stored = db::load_result(&state.conn().unwrap(), &case.id).unwrap();
        assert_eq!(stored.unwrap().risk_score, 45);
    }

    #[tokio::test]
    async fn shutdown_abandons_runs_and_disposes_session() {
        let mock = Arc::new(MockAssessor::returning(result()).gated());
        let state = state(mock.clone());
        {
            let conn = state.conn().unwrap();
            state.write_session().unwrap().login(&conn, "dr@example.com", "pw").unwrap();
        }
        let case = state.create_case(draft()).unwrap();
        state.start_analysis(&case.id, false).unwrap();

        state.shutdown();
        assert!(state.runs().snapshot(&case.id).is_none());
        assert!(!state.read_session().unwrap().is_authenticated());
        mock.release();
    }

    #[tokio::test]
    async fn shutdown_drops_pending_drug_search() {
        let state = Arc::new(state(Arc::new(MockAssessor::returning(result()))));
        let pending = {
            let state = state.clone();
            tokio::spawn(async move { state.drug_search().submit(|| async { 1 }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        state.shutdown();
        assert_eq!(pending.await.unwrap(), None);
    }
}
