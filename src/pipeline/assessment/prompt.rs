//! Chat messages for the assessment endpoint.

use serde::Serialize;

use crate::models::{Case, Gender};

pub const ASSESSMENT_SYSTEM_PROMPT: &str = r#"You are a medical assistant that helps healthcare professionals analyze patient symptoms and provides clinical decision support.

IMPORTANT:
- Your analysis is for reference only and does not replace professional medical judgment.
- Final diagnoses and treatment decisions are made by qualified healthcare professionals.
- Always recommend emergency care for potentially life-threatening conditions.

For each patient:
1. Assess the risk level (low/medium/high) with a score from 0 to 100.
2. Identify the key factors behind the assessment.
3. List differential diagnoses with estimated probabilities.
4. Give prioritized recommendations (urgent/high/medium/low).

Output a single JSON object with this structure:
{
  "riskLevel": "low|medium|high",
  "riskScore": 0-100,
  "summary": "one line summary",
  "keyFactors": [
    { "title": "...", "description": "...", "confidence": 0-100 }
  ],
  "differentialDiagnosis": [
    { "name": "...", "probability": 0-100 }
  ],
  "recommendations": [
    { "priority": "urgent|high|medium|low", "text": "..." }
  ]
}"#;

pub const CONNECTION_CHECK_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const CONNECTION_CHECK_PROMPT: &str =
    "Reply with the words \"Connection OK\" in plain text.";

/// Image detail level requested for attached images.
const IMAGE_DETAIL: &str = "high";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(content: MessageContent) -> Self {
        Self {
            role: "user",
            content,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Either a bare string or a list of typed parts (text + images).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: &'static str,
}

/// Render demographics, questionnaire answers and an attachment summary.
pub fn build_analysis_prompt(case: &Case) -> String {
    let gender = match case.gender {
        Gender::Male => "Male",
        Gender::Female => "Female",
        other => other.as_str(),
    };

    let mut prompt = String::from("Please analyze the following patient information:\n\n");
    prompt.push_str("## Basic Information\n");
    prompt.push_str(&format!("- Gender: {gender}\n"));
    prompt.push_str(&format!("- Age Group: {}\n", case.age_group));
    prompt.push_str(&format!("- Chief Complaint: {}\n\n", case.chief_complaint));

    let q = &case.questionnaire;
    prompt.push_str("## Clinical Information\n");
    if !q.symptom_duration.is_empty() {
        prompt.push_str(&format!("- Symptom Duration: {}\n", q.symptom_duration));
    }
    if let Some(pain) = q.pain_level {
        prompt.push_str(&format!("- Pain Level: {pain}/10\n"));
    }
    if !q.medical_history.is_empty() {
        prompt.push_str(&format!("- Medical History: {}\n", q.medical_history));
    }
    if !q.current_medications.is_empty() {
        prompt.push_str(&format!("- Current Medications: {}\n", q.current_medications));
    }
    if !q.allergies.is_empty() {
        prompt.push_str(&format!("- Allergies: {}\n", q.allergies));
    }
    prompt.push('\n');

    if !case.files.is_empty() {
        let types: Vec<&str> = case.files.iter().map(|f| f.mime_type.as_str()).collect();
        prompt.push_str("## Attached Files\n");
        prompt.push_str(&format!(
            "- {} file(s) attached (types: {})\n\n",
            case.files.len(),
            types.join(", ")
        ));
    }

    prompt.push_str(
        "Please provide a comprehensive risk assessment and clinical recommendations based on this information.",
    );
    prompt
}

/// User content for a case: plain text, or text followed by one image part
/// per inlined image attachment, in attachment order.
pub fn build_user_content(case: &Case) -> MessageContent {
    let text = build_analysis_prompt(case);
    let images: Vec<ContentPart> = case
        .inline_images()
        .filter_map(|f| f.data_url.clone())
        .map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url,
                detail: IMAGE_DETAIL,
            },
        })
        .collect();

    if images.is_empty() {
        return MessageContent::Text(text);
    }

    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(ContentPart::Text { text });
    parts.extend(images);
    MessageContent::Parts(parts)
}

pub fn analysis_messages(case: &Case) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ASSESSMENT_SYSTEM_PROMPT),
        ChatMessage::user(build_user_content(case)),
    ]
}

/// Conversation replaying the prior assessment before the question.
pub fn follow_up_messages(previous_json: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ASSESSMENT_SYSTEM_PROMPT),
        ChatMessage::user(MessageContent::Text(format!(
            "Previous analysis result:\n{previous_json}"
        ))),
        ChatMessage::assistant(previous_json),
        ChatMessage::user(MessageContent::Text(question.to_string())),
    ]
}

pub fn connection_check_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(CONNECTION_CHECK_SYSTEM_PROMPT),
        ChatMessage::user(MessageContent::Text(CONNECTION_CHECK_PROMPT.to_string())),
    ]
}
