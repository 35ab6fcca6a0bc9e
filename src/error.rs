use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImpactError {
    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("invalid repository name (expected owner/name): {0}")]
    InvalidRepo(String),

    #[error("event source failure: {0}")]
    Source(#[from] SourceError),

    #[error("judge setup failed: {0}")]
    Judge(#[from] JudgeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ImpactError>;

/// Failures raised while reading repository events.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("pull request #{0} not available")]
    Missing(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { retryable, .. } => *retryable,
            Self::RateLimited { .. } => true,
            Self::Decode(_) | Self::Missing(_) | Self::Io(_) => false,
        }
    }
}

/// Failures raised by the judgment service. Always absorbed per sample.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("invalid verdict: {0}")]
    InvalidVerdict(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl JudgeError {
    /// Short code for log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_error",
            Self::Provider { .. } => "provider_error",
            Self::Timeout(_) => "timeout",
            Self::InvalidVerdict(_) => "invalid_verdict",
            Self::Config(_) => "config_error",
        }
    }
}
