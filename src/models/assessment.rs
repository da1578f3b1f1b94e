use serde::{Deserialize, Serialize};

use super::enums::{RecommendationPriority, RiskLevel};

/// Structured risk assessment produced by the remote model.
///
/// Created once per successful `analyze` stage and stored under the case
/// id. Metadata fields are filled in by the client, not the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub risk_level: RiskLevel,
    /// 0–100.
    pub risk_score: u8,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_factors: Vec<KeyFactor>,
    #[serde(default)]
    pub differential_diagnosis: Vec<Diagnosis>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub model_version: String,
    #[serde(default)]
    pub analyzed_at: String,
    #[serde(default)]
    pub disclaimer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFactor {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 0–100.
    #[serde(default)]
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub name: String,
    /// 0–100.
    #[serde(default)]
    pub probability: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: RecommendationPriority,
    pub text: String,
}

impl AssessmentResult {
    /// Recommendations at the given tier, in model order.
    pub fn recommendations_at(
        &self,
        priority: RecommendationPriority,
    ) -> impl Iterator<Item = &Recommendation> {
        self.recommendations.iter().filter(move |r| r.priority == priority)
    }
}
