//! Client for the chat-completions service that produces the analysis text.

pub mod client;
pub mod error;
pub mod prompt;
pub mod rate_limit;

pub use client::{AnalysisClient, OpenAiClient, Reply};
pub use error::LlmError;
pub use rate_limit::parse_retry_after;
