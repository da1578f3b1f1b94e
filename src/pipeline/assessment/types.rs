use async_trait::async_trait;
use serde::Serialize;

use super::AssessmentError;
use crate::models::{AssessmentResult, Case};

/// Produces a risk assessment for a case.
///
/// The sequencer holds this as `Arc<dyn Assessor>` so tests can swap in
/// `MockAssessor` without touching the network.
#[async_trait]
pub trait Assessor: Send + Sync {
    async fn assess(&self, case: &Case) -> Result<AssessmentResult, AssessmentError>;

    /// Free-text answer to a question about an existing assessment.
    async fn ask_follow_up(
        &self,
        result: &AssessmentResult,
        question: &str,
    ) -> Result<String, AssessmentError>;

    /// Cheap round trip to check credential and endpoint. Never errors.
    async fn test_connection(&self) -> ConnectionCheck;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionCheck {
    pub success: bool,
    pub message: String,
}

impl ConnectionCheck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
