//! HTTP clients the bot uses to reach the relay and the task gateway.
//!
//! No timeouts here: generation can legitimately take long and the relay
//! enforces its own deadline.

use hb_tasks::{ListResolution, NewTask, TaskItem, TaskList};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const RELAY_SERVICE: &str = "instructions agent";
const GATEWAY_SERVICE: &str = "tasks agent";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{service} unreachable: {detail}")]
    Unreachable {
        service: &'static str,
        detail: String,
    },

    #[error("authorization required; open {authorize_url}")]
    AuthRequired { authorize_url: String },

    #[error("invalid request: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{service} failed (status {status}): {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {service}: {detail}")]
    ResponseFormat {
        service: &'static str,
        detail: String,
    },

    #[error("invalid agent url: {0}")]
    Config(String),
}

impl AgentError {
    fn transport(service: &'static str, e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::ResponseFormat {
                service,
                detail: e.to_string(),
            };
        }
        Self::Unreachable {
            service,
            detail: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Serialize)]
struct InstructionBody<'a> {
    text: &'a str,
}

/// Client for the relay's `POST /ia`.
#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    url: Url,
}

impl RelayClient {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url.trim()).map_err(|e| AgentError::Config(format!("{url}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            url,
        })
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn ask(&self, text: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&InstructionBody { text })
            .send()
            .await
            .map_err(|e| AgentError::transport(RELAY_SERVICE, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::transport(RELAY_SERVICE, e))?;
        match status {
            s if s.is_success() => Ok(body),
            StatusCode::BAD_REQUEST => Err(AgentError::InvalidArgument(body)),
            s => Err(AgentError::Upstream {
                service: RELAY_SERVICE,
                status: s.as_u16(),
                message: body,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateTaskBody<'a> {
    list_id: &'a str,
    #[serde(flatten)]
    task: &'a NewTask,
}

#[derive(Debug, Serialize)]
struct FindOrCreateBody<'a> {
    name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    authorize_url: Option<String>,
}

/// Client for the task gateway's JSON API.
#[derive(Clone)]
pub struct TaskGatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl TaskGatewayClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim().trim_end_matches('/'))
            .map_err(|e| AgentError::Config(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AgentError::Config(format!(
                "{base_url} cannot be used as a base url"
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    /// Fallback hint when the gateway does not send its own.
    pub fn authorize_url(&self) -> String {
        self.endpoint(&["authorize"])
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}/authorize", self.base_url))
    }

    #[tracing::instrument(level = "info", skip_all, fields(name = %name))]
    pub async fn find_or_create_list(&self, name: &str) -> Result<ListResolution> {
        let url = self.endpoint(&["lists", "find_or_create"])?;
        let request = self.http.post(url).json(&FindOrCreateBody { name });
        self.send(request).await
    }

    #[tracing::instrument(level = "info", skip_all, fields(list_id = %list_id))]
    pub async fn insert_task(&self, list_id: &str, task: &NewTask) -> Result<TaskItem> {
        let url = self.endpoint(&["tasks"])?;
        let request = self.http.post(url).json(&CreateTaskBody { list_id, task });
        self.send(request).await
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn list_task_lists(&self) -> Result<Vec<TaskList>> {
        let url = self.endpoint(&["lists"])?;
        self.send(self.http.get(url)).await
    }

    #[tracing::instrument(level = "info", skip_all, fields(list_id = %list_id))]
    pub async fn list_tasks(&self, list_id: &str) -> Result<Vec<TaskItem>> {
        let url = self.endpoint(&["lists", list_id, "tasks"])?;
        self.send(self.http.get(url)).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AgentError::Config("tasks agent url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| AgentError::transport(GATEWAY_SERVICE, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::transport(GATEWAY_SERVICE, e))?;
        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| AgentError::ResponseFormat {
                service: GATEWAY_SERVICE,
                detail: e.to_string(),
            });
        }

        let error: ErrorBody = serde_json::from_str(&body).unwrap_or_else(|_| ErrorBody {
            message: body.clone(),
            ..ErrorBody::default()
        });
        Err(match status {
            StatusCode::UNAUTHORIZED => AgentError::AuthRequired {
                authorize_url: error.authorize_url.unwrap_or_else(|| self.authorize_url()),
            },
            StatusCode::BAD_REQUEST => AgentError::InvalidArgument(error.message),
            StatusCode::NOT_FOUND => AgentError::NotFound(error.message),
            s => AgentError::Upstream {
                service: GATEWAY_SERVICE,
                status: s.as_u16(),
                message: error.message,
            },
        })
    }
}
