use serde::Deserialize;

use super::AssessmentError;
use crate::models::{AssessmentResult, Diagnosis, KeyFactor, Recommendation, RecommendationPriority, RiskLevel};

/// Parse the model's reply into an assessment.
///
/// `riskLevel` and `riskScore` are required; list fields are parsed
/// leniently and items that do not fit are dropped. Metadata fields are
/// left empty for the caller to fill.
pub fn parse_assessment(content: &str) -> Result<AssessmentResult, AssessmentError> {
    let json_str = strip_code_fence(content);
    let value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| AssessmentError::MalformedResponse(format!("content is not JSON: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| AssessmentError::MalformedResponse("content is not a JSON object".into()))?;

    let risk_level = match obj.get("riskLevel") {
        None | Some(serde_json::Value::Null) => {
            return Err(AssessmentError::Validation("riskLevel is missing".into()))
        }
        Some(v) => parse_risk_level(v)?,
    };
    let risk_score = match obj.get("riskScore") {
        None | Some(serde_json::Value::Null) => {
            return Err(AssessmentError::Validation("riskScore is missing".into()))
        }
        Some(v) => parse_risk_score(v)?,
    };

    let summary = obj
        .get("summary")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(AssessmentResult {
        risk_level,
        risk_score,
        summary,
        key_factors: parse_array_lenient(obj.get("keyFactors"))
            .into_iter()
            .map(|f: RawKeyFactor| f.into())
            .collect(),
        differential_diagnosis: parse_array_lenient(obj.get("differentialDiagnosis"))
            .into_iter()
            .map(|d: RawDiagnosis| d.into())
            .collect(),
        recommendations: parse_array_lenient(obj.get("recommendations"))
            .into_iter()
            .filter_map(|r: RawRecommendation| r.into_recommendation())
            .collect(),
        model_name: String::new(),
        model_version: String::new(),
        analyzed_at: String::new(),
        disclaimer: String::new(),
    })
}

/// Drop a surrounding ```json fence if the model added one despite JSON mode.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_risk_level(value: &serde_json::Value) -> Result<RiskLevel, AssessmentError> {
    let raw = value
        .as_str()
        .ok_or_else(|| AssessmentError::Validation("riskLevel is not a string".into()))?;
    raw.trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| AssessmentError::Validation(format!("unknown riskLevel '{raw}'")))
}

fn parse_risk_score(value: &serde_json::Value) -> Result<u8, AssessmentError> {
    let score = value
        .as_f64()
        .ok_or_else(|| AssessmentError::Validation("riskScore is not a number".into()))?;
    if !(0.0..=100.0).contains(&score) {
        return Err(AssessmentError::Validation(format!(
            "riskScore {score} outside 0-100"
        )));
    }
    Ok(score.round() as u8)
}

#[derive(Deserialize)]
struct RawKeyFactor {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    confidence: f64,
}

impl From<RawKeyFactor> for KeyFactor {
    fn from(raw: RawKeyFactor) -> Self {
        Self {
            title: raw.title,
            description: raw.description,
            confidence: clamp_percent(raw.confidence),
        }
    }
}

#[derive(Deserialize)]
struct RawDiagnosis {
    name: String,
    #[serde(default)]
    probability: f64,
}

impl From<RawDiagnosis> for Diagnosis {
    fn from(raw: RawDiagnosis) -> Self {
        Self {
            name: raw.name,
            probability: clamp_percent(raw.probability),
        }
    }
}

#[derive(Deserialize)]
struct RawRecommendation {
    priority: String,
    text: String,
}

impl RawRecommendation {
    fn into_recommendation(self) -> Option<Recommendation> {
        let priority: RecommendationPriority =
            self.priority.trim().to_ascii_lowercase().parse().ok()?;
        Some(Recommendation {
            priority,
            text: self.text,
        })
    }
}

fn clamp_percent(value: f64) -> u8 {
    value.clamp(0.0, 100.0).round() as u8
}

/// Parse an array leniently: skip items that fail to deserialize.
fn parse_array_lenient<T: for<'de> Deserialize<'de>>(value: Option<&serde_json::Value>) -> Vec<T> {
    match value.and_then(|v| v.as_array()) {
        None => vec![],
        Some(arr) => arr
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
    }
}
