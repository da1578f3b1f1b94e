use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::parser::parse_assessment;
use super::prompt::{analysis_messages, connection_check_messages, follow_up_messages, ChatMessage};
use super::types::{Assessor, ConnectionCheck};
use super::AssessmentError;
use crate::config::AssessmentConfig;
use crate::models::{AssessmentResult, Case};

/// Models that accept `response_format: json_object`.
const JSON_MODE_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4-turbo-preview",
    "gpt-3.5-turbo-0125",
    "gpt-3.5-turbo-1106",
];

const MODEL_DISPLAY_NAME: &str = "ChatGPT";

pub const ASSESSMENT_DISCLAIMER: &str = "This AI analysis is reference information to support the clinical judgement of medical staff. Final diagnosis and treatment decisions must be made by medical professionals after a comprehensive evaluation.";

const FOLLOW_UP_TEMPERATURE: f32 = 0.5;
const CONNECTION_CHECK_MAX_TOKENS: u32 = 50;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Substring match, so dated snapshots such as `gpt-4o-2024-08-06` qualify.
pub fn supports_json_mode(model: &str) -> bool {
    JSON_MODE_MODELS.iter().any(|m| model.contains(m))
}

/// Chat-completion client for risk assessments.
pub struct OpenAiAssessor {
    config: AssessmentConfig,
    client: reqwest::Client,
}

impl OpenAiAssessor {
    pub fn new(config: AssessmentConfig) -> Result<Self, AssessmentError> {
        // Only a connect timeout: analysis calls can legitimately take minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AssessmentError::HttpClient(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CallOptions,
    ) -> Result<String, AssessmentError> {
        let api_key = self
            .config
            .credential()
            .ok_or(AssessmentError::MissingCredential)?;

        let model = self.config.model.as_str();
        let response_format = (options.json_mode && supports_json_mode(model))
            .then_some(ResponseFormat { kind: "json_object" });
        let body = ChatRequest {
            model,
            messages,
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: options.temperature.unwrap_or(self.config.temperature),
            response_format,
        };

        tracing::debug!(
            model,
            messages = messages.len(),
            json_mode = body.response_format.is_some(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssessmentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&raw)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Assessment API error: {}", status.as_u16()));
            tracing::warn!(status = status.as_u16(), %message, "Assessment endpoint rejected request");
            return Err(AssessmentError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AssessmentError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AssessmentError::MalformedResponse("no choices in response".into()))
    }
}

#[async_trait]
impl Assessor for OpenAiAssessor {
    async fn assess(&self, case: &Case) -> Result<AssessmentResult, AssessmentError> {
        let messages = analysis_messages(case);
        let content = self
            .complete(
                &messages,
                CallOptions {
                    json_mode: true,
                    ..CallOptions::default()
                },
            )
            .await?;

        let mut result = parse_assessment(&content)?;
        result.model_name = MODEL_DISPLAY_NAME.to_string();
        result.model_version = self.config.model.clone();
        result.analyzed_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        result.disclaimer = ASSESSMENT_DISCLAIMER.to_string();

        tracing::info!(
            case_id = %case.id,
            risk_level = %result.risk_level,
            risk_score = result.risk_score,
            "Assessment received"
        );
        Ok(result)
    }

    async fn ask_follow_up(
        &self,
        result: &AssessmentResult,
        question: &str,
    ) -> Result<String, AssessmentError> {
        let previous = serde_json::to_string_pretty(result)
            .map_err(|e| AssessmentError::MalformedResponse(e.to_string()))?;
        let messages = follow_up_messages(&previous, question);
        self.complete(
            &messages,
            CallOptions {
                temperature: Some(FOLLOW_UP_TEMPERATURE),
                ..CallOptions::default()
            },
        )
        .await
    }

    async fn test_connection(&self) -> ConnectionCheck {
        let messages = connection_check_messages();
        let options = CallOptions {
            max_tokens: Some(CONNECTION_CHECK_MAX_TOKENS),
            ..CallOptions::default()
        };
        match self.complete(&messages, options).await {
            Ok(reply) => ConnectionCheck::ok(reply),
            Err(e) => ConnectionCheck::failed(e.to_string()),
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CallOptions {
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    json_mode: bool,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Mock
// ═══════════════════════════════════════════════════════════

/// Mock assessor for testing: returns a configurable outcome.
///
/// With a gate set, `assess` waits for `release()` before answering, which
/// lets tests observe the `analyze` stage while it is running.
pub struct MockAssessor {
    outcome: Mutex<Result<AssessmentResult, AssessmentError>>,
    follow_up: String,
    calls: AtomicUsize,
    gate: Option<Arc<tokio::sync::Notify>>,
}

impl MockAssessor {
    pub fn returning(result: AssessmentResult) -> Self {
        Self::with_outcome(Ok(result))
    }

    pub fn failing(error: AssessmentError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<AssessmentResult, AssessmentError>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            follow_up: "No further comment.".to_string(),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn with_follow_up(mut self, reply: &str) -> Self {
        self.follow_up = reply.to_string();
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(tokio::sync::Notify::new()));
        self
    }

    /// Let a gated `assess` call finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn set_outcome(&self, outcome: Result<AssessmentResult, AssessmentError>) {
        if let Ok(mut guard) = self.outcome.lock() {
            *guard = outcome;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Assessor for MockAssessor {
    async fn assess(&self, _case: &Case) -> Result<AssessmentResult, AssessmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome
            .lock()
            .map_err(|_| AssessmentError::HttpClient("mock lock poisoned".into()))?
            .clone()
    }

    async fn ask_follow_up(
        &self,
        _result: &AssessmentResult,
        _question: &str,
    ) -> Result<String, AssessmentError> {
        Ok(self.follow_up.clone())
    }

    async fn test_connection(&self) -> ConnectionCheck {
        ConnectionCheck::ok("Connection OK")
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
