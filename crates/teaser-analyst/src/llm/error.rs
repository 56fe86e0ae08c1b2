use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("No API key configured; analysis requests are disabled")]
    MissingCredentials,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to parse LLM response: {0}")]
    Parse(String),

    #[error("LLM response contained no text")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, LlmError>;
