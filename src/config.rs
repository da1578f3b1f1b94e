use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "MedAI";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Chat-completion endpoint used for risk assessment.
pub const DEFAULT_ASSESSMENT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_ASSESSMENT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
/// Low temperature for clinical output.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Public drug product registry (MFDS permit information service).
pub const DEFAULT_DRUG_API_BASE: &str =
    "https://apis.data.go.kr/1471000/DrugPrdtPrmsnInfoService07";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

/// Placeholder value shipped in sample env files; treated as "no key".
const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY";

/// Get the application data directory
/// ~/MedAI/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the local key-value store.
pub fn store_path() -> PathBuf {
    app_data_dir().join("medai.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medai_lib=info,tower_http=info,warn"
}

/// Remote assessment settings, read from the environment.
///
/// `api_key` stays `None` when unset or still the placeholder; the
/// assessment client refuses to make a request in that case.
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub endpoint: String,
}

impl AssessmentConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_opt("MEDAI_OPENAI_API_KEY"),
            model: env_opt("MEDAI_OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_ASSESSMENT_MODEL.to_string()),
            max_tokens: env_opt("MEDAI_OPENAI_MAX_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: DEFAULT_TEMPERATURE,
            endpoint: env_opt("MEDAI_OPENAI_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ASSESSMENT_ENDPOINT.to_string()),
        }
    }

    /// The credential if one is usable.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.contains(API_KEY_PLACEHOLDER))
    }
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_ASSESSMENT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            endpoint: DEFAULT_ASSESSMENT_ENDPOINT.to_string(),
        }
    }
}

/// Drug registry lookup settings.
#[derive(Debug, Clone)]
pub struct DrugApiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl DrugApiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_opt("MEDAI_DRUG_API_KEY"),
            base_url: env_opt("MEDAI_DRUG_API_BASE")
                .unwrap_or_else(|| DEFAULT_DRUG_API_BASE.to_string()),
        }
    }

    /// Base URL without a trailing slash, so operations join with one `/`.
    pub fn with_trimmed_base(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = env_opt("MEDAI_BIND_ADDR")
            .and_then(|v| match v.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(value = %v, error = %e, "Invalid MEDAI_BIND_ADDR, using default");
                    None
                }
            })
            .unwrap_or_else(default_bind_addr);
        Self { bind_addr }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
