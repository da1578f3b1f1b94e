//! Remote risk assessment over an OpenAI-style chat completion endpoint.

pub mod client;
pub mod parser;
pub mod prompt;
pub mod types;

pub use client::{MockAssessor, OpenAiAssessor};
pub use types::{Assessor, ConnectionCheck};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssessmentError {
    #[error("Assessment API key is not configured")]
    MissingCredential,

    /// Message is shown verbatim on the failed stage.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("Could not reach assessment endpoint: {0}")]
    Transport(String),

    #[error("Malformed assessment response: {0}")]
    MalformedResponse(String),

    #[error("Invalid assessment: {0}")]
    Validation(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
