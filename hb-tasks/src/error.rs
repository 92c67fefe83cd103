use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaskError>;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No usable credential; the user must go through `/authorize` again.
    #[error("authorization required: {0}")]
    AuthRequired(String),

    #[error("task list not found: {0}")]
    ListNotFound(String),

    #[error("task provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("task provider unreachable: {0}")]
    Network(String),

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl TaskError {
    /// Status code attached to the failure, when the provider returned one.
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::ResponseFormat(e.to_string());
        }
        Self::Network(e.to_string())
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}

/// Failures of the OAuth2 token endpoint.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authorization server answered with a non-2xx status (e.g. `invalid_grant`).
    #[error("token endpoint rejected the request (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("invalid oauth configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::InvalidResponse(e.to_string());
        }
        Self::Network(e.to_string())
    }
}

impl From<AuthError> for TaskError {
    fn from(e: AuthError) -> Self {
        Self::AuthRequired(e.to_string())
    }
}
