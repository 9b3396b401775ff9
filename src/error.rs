//! Custom error types for the page controller
//!
//! Provides structured, typed errors instead of generic Box<dyn Error>

use thiserror::Error;

/// Top-level application errors (startup and wiring)
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Static stock list loading errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to load stock list: HTTP {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to read stock list file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed stock list: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Quote endpoint errors
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Quote request for {code} failed: HTTP {status}")]
    Http { code: String, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed quote body: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Every way a live diagnosis can fail. None of these reach the user; the
/// orchestrator turns each into the fallback narrative.
#[derive(Error, Debug)]
pub enum DiagnosisError {
    #[error("Diagnosis request failed: HTTP {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Diagnosis request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Diagnosis stream reported an error: {message}")]
    Remote { message: String },

    #[error("Diagnosis produced no text")]
    EmptyAnalysis,

    #[error("Diagnosis stream read failed: {0}")]
    Stream(String),

    #[error("Malformed diagnosis body: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Conversion (redirect link) errors
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Redirect link request failed: HTTP {status}")]
    Http { status: u16 },

    #[error("No active redirect link available")]
    NoActiveLink,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed redirect body: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl ConversionError {
    /// Message shown to the user in place of the raw error
    pub fn user_message(&self) -> &'static str {
        match self {
            ConversionError::Http { .. } => {
                "LINEリンクの取得に失敗しました。しばらくしてからもう一度お試しください。"
            }
            ConversionError::NoActiveLink => "現在利用可能なLINEリンクがありません。",
            ConversionError::Network(_) | ConversionError::Deserialization(_) => {
                "操作に失敗しました。しばらくしてからもう一度お試しください。"
            }
        }
    }
}

/// Tracking delivery errors (always logged, never surfaced)
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Tracking endpoint returned HTTP {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
