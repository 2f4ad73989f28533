use std::time::Duration;
use thiserror::Error;

/// Failure talking to the hosted model during an invocation.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("GOOGLE_API_KEY is not set")]
    MissingApiKey,

    #[error("request to model failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("agent did not respond within {0:?}")]
    Timeout(Duration),
}

/// Failure inside a tool. Rendered to text before it reaches the model.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidInput(#[from] serde_json::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("search API returned {0}")]
    Status(u16),

    #[error("invalid search URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("{provider} text-to-speech requires {var} to be set")]
    MissingCredential {
        provider: &'static str,
        var: &'static str,
    },

    #[error("{provider} text-to-speech request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} text-to-speech error: {status} - {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} returned undecodable audio: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: base64::DecodeError,
    },
}
