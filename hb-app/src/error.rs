use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hb_tasks::TaskError;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the gateway's HTTP handlers.
///
/// Rendered as `{ "error": <kind>, "message": <text>, "authorize_url"?: <url> }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{message}")]
    AuthRequired {
        message: String,
        authorize_url: Option<String>,
    },

    #[error("task list not found: {0}")]
    ListNotFound(String),

    #[error("task provider error (status {status}): {message}")]
    TaskProvider { status: u16, message: String },

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Convert a task failure, attaching where the user can re-authorize.
    pub fn from_task(err: TaskError, authorize_url: &str) -> Self {
        match err {
            TaskError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            TaskError::AuthRequired(msg) => Self::AuthRequired {
                message: format!("{msg}; authorize access at {authorize_url}"),
                authorize_url: Some(authorize_url.to_string()),
            },
            TaskError::ListNotFound(id) => Self::ListNotFound(id),
            TaskError::Provider { status, message } => Self::TaskProvider { status, message },
            TaskError::Network(msg) => Self::UpstreamUnavailable(format!(
                "task provider unreachable: {msg}; check the service is running"
            )),
            TaskError::ResponseFormat(msg) => Self::TaskProvider {
                status: StatusCode::BAD_GATEWAY.as_u16(),
                message: format!("unexpected provider response: {msg}"),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::AuthRequired { .. } => "auth_required",
            Self::ListNotFound(_) => "list_not_found",
            Self::TaskProvider { .. } => "task_provider_error",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::AuthRequired { .. } => StatusCode::UNAUTHORIZED,
            Self::ListNotFound(_) => StatusCode::NOT_FOUND,
            // Provider 5xx pass through; anything else is our bad gateway.
            Self::TaskProvider { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_server_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(error_kind = self.kind(), %status, error = %message, "request failed");
        } else {
            tracing::warn!(error_kind = self.kind(), %status, error = %message, "request rejected");
        }

        let mut body = serde_json::Map::new();
        body.insert("error".to_string(), json!(self.kind()));
        body.insert("message".to_string(), json!(message));
        if let Self::AuthRequired {
            authorize_url: Some(url),
            ..
        } = &self
        {
            body.insert("authorize_url".to_string(), json!(url));
        }
        (status, Json(serde_json::Value::Object(body))).into_response()
    }
}
