//! Patient intake case and its attachments.
//!
//! Field names on the wire are camelCase so stored intake payloads
//! (`case_{id}_data`) stay readable by the intake form that wrote them.

use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::enums::Gender;

/// Prefix of generated case identifiers.
pub const CASE_ID_PREFIX: &str = "CASE-";

/// Highest value on the pain scale.
pub const MAX_PAIN_LEVEL: u8 = 10;

/// One patient intake record. Read by the analysis pipeline, never mutated by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    /// The storage key is authoritative; payloads written without an id load fine.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub gender: Gender,
    pub age_group: String,
    pub chief_complaint: String,
    #[serde(default)]
    pub questionnaire: Questionnaire,
    #[serde(default)]
    pub files: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Case {
    /// Attachments whose image data is inlined and can go to a vision model.
    pub fn inline_images(&self) -> impl Iterator<Item = &Attachment> {
        self.files.iter().filter(|f| f.is_inline_image())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    #[serde(default)]
    pub symptom_duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pain_level: Option<u8>,
    #[serde(default)]
    pub medical_history: String,
    #[serde(default)]
    pub current_medications: String,
    #[serde(default)]
    pub allergies: String,
}

/// File attached at intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    /// `data:<mime>;base64,...` payload.
    #[serde(rename = "base64", default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

impl Attachment {
    /// Build an attachment with its payload inlined as a data URL.
    ///
    /// The MIME type is guessed from the file name when not supplied.
    pub fn from_bytes(name: &str, mime_type: Option<&str>, bytes: &[u8]) -> Self {
        let mime_type = match mime_type.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => mime_guess::from_path(name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self {
            name: name.to_string(),
            data_url: Some(format!("data:{mime_type};base64,{encoded}")),
            mime_type,
            size: bytes.len() as u64,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_inline_image(&self) -> bool {
        self.is_image() && self.data_url.as_deref().is_some_and(|d| !d.is_empty())
    }
}

// ═══════════════════════════════════════════════════════════
// Intake
// ═══════════════════════════════════════════════════════════

/// Errors from intake validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Unknown gender: {0}")]
    InvalidGender(String),
    #[error("Pain level {0} is outside 0-{MAX_PAIN_LEVEL}")]
    PainLevelOutOfRange(u8),
}

/// Intake form submission before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDraft {
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub age_group: String,
    #[serde(default)]
    pub chief_complaint: String,
    #[serde(default)]
    pub questionnaire: Questionnaire,
    #[serde(default)]
    pub files: Vec<Attachment>,
}

impl CaseDraft {
    /// Check required fields and produce a case with the given id.
    pub fn validate(self, id: String) -> Result<Case, IntakeError> {
        let gender = self.gender.trim();
        if gender.is_empty() {
            return Err(IntakeError::MissingField("gender"));
        }
        let gender =
            Gender::from_str(gender).map_err(|_| IntakeError::InvalidGender(gender.to_string()))?;
        if self.age_group.trim().is_empty() {
            return Err(IntakeError::MissingField("ageGroup"));
        }
        if self.chief_complaint.trim().is_empty() {
            return Err(IntakeError::MissingField("chiefComplaint"));
        }
        if self.questionnaire.symptom_duration.trim().is_empty() {
            return Err(IntakeError::MissingField("symptomDuration"));
        }
        if let Some(level) = self.questionnaire.pain_level {
            if level > MAX_PAIN_LEVEL {
                return Err(IntakeError::PainLevelOutOfRange(level));
            }
        }

        Ok(Case {
            id,
            gender,
            age_group: self.age_group.trim().to_string(),
            chief_complaint: self.chief_complaint.trim().to_string(),
            questionnaire: self.questionnaire,
            files: self.files,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        })
    }
}

/// `CASE-` followed by the millisecond timestamp in upper-case base36.
pub fn generate_case_id(now_millis: u64) -> String {
    format!("{CASE_ID_PREFIX}{}", to_base36_upper(now_millis))
}

fn to_base36_upper(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
