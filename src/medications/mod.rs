//! Drug product lookup against the public drug-approval registry, used
//! to autocomplete the current-medications answer at intake.

pub mod client;
pub mod debounce;
pub mod types;

pub use client::DrugRegistryClient;
pub use debounce::Debouncer;
pub use types::{DrugDetail, DrugProduct};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrugLookupError {
    #[error("Drug registry API key is not configured")]
    MissingCredential,

    #[error("Drug registry request failed: {0}")]
    Transport(String),

    #[error("Drug registry returned status {0}")]
    Status(u16),

    #[error("Unreadable drug registry response: {0}")]
    Parse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
