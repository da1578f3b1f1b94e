use async_trait::async_trait;

use super::PipelineError;
use crate::db::repository::save_result;
use crate::db::{DatabaseError, SharedConnection};
use crate::models::AssessmentResult;

/// Destination for finished assessments.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, case_id: &str, result: &AssessmentResult) -> Result<(), PipelineError>;
}

/// Writes results to the key-value store under `case_{id}_result`.
pub struct StoreResultSink {
    conn: SharedConnection,
}

impl StoreResultSink {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ResultSink for StoreResultSink {
    async fn persist(&self, case_id: &str, result: &AssessmentResult) -> Result<(), PipelineError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        save_result(&conn, case_id, result)?;
        tracing::info!(case_id, risk_level = %result.risk_level, "Assessment result stored");
        Ok(())
    }
}
