//! Google Tasks access for the task gateway.
//!
//! OAuth2 code/refresh grants, the in-memory credential lifecycle, and the
//! task-list operations built on top of them.

mod client;
mod credential;
mod error;
mod oauth;
mod service;
mod types;

pub use client::{GOOGLE_TASKS_API_URL, TasksClient};
pub use credential::{Credential, CredentialState, CredentialStore, InMemoryCredentialStore};
pub use error::{AuthError, Result, TaskError};
pub use oauth::{
    GOOGLE_AUTHORIZE_URL, GOOGLE_TASKS_SCOPE, GOOGLE_TOKEN_URL, OAuthClient, OAuthConfig,
    TokenGrant, TokenRefresher,
};
pub use service::TaskService;
pub use types::{ListResolution, NewTask, TaskItem, TaskList};
