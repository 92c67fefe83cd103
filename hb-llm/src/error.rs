use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The generation endpoint could not be reached (connection refused, timeout).
    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            return Self::Unavailable(e.to_string());
        }
        if e.is_decode() {
            return Self::ResponseFormat(e.to_string());
        }
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
