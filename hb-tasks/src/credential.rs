//! OAuth2 credential lifecycle.
//!
//! One credential pair per process, held in memory only. Every task-API call
//! goes through [`CredentialStore::refresh_if_needed`], which lazily detects
//! expiry and refreshes at most once for any number of concurrent callers.

use crate::error::{AuthError, Result, TaskError};
use crate::oauth::{TokenGrant, TokenRefresher};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Tokens expiring within this window are treated as already expired.
const REFRESH_GRACE_PERIOD_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Unauthenticated,
    Authenticated,
    Expired,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub obtained_at: DateTime<Utc>,
}

impl Credential {
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token.filter(|t| !t.is_empty()),
            expires_at: grant.expires_in.map(|secs| now + Duration::seconds(secs)),
            scope: grant.scope,
            obtained_at: now,
        }
    }

    /// Apply a refresh grant. Providers usually omit the refresh token on
    /// refresh, so the current one is kept unless a new one is issued.
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let mut next = Self::from_grant(grant, now);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        if next.scope.is_none() {
            next.scope = self.scope.clone();
        }
        next
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> CredentialState {
        if self.valid_access_token(now).is_some() {
            return CredentialState::Authenticated;
        }
        if self.has_access_token() || self.refresh_token.is_some() {
            return CredentialState::Expired;
        }
        CredentialState::Unauthenticated
    }

    fn has_access_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn valid_access_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        match self.expires_at {
            // No expiry reported: assume valid until the provider says otherwise.
            None => Some(token),
            Some(expires_at) => {
                let grace = Duration::minutes(REFRESH_GRACE_PERIOD_MINUTES);
                (now < expires_at - grace).then_some(token)
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Option<Credential>;

    async fn set(&self, credential: Credential);

    async fn clear(&self);

    async fn state(&self) -> CredentialState {
        match self.get().await {
            Some(credential) => credential.state_at(Utc::now()),
            None => CredentialState::Unauthenticated,
        }
    }

    /// Return a usable access token, refreshing first if it has expired.
    ///
    /// Fails with [`TaskError::AuthRequired`] when no credential is held or
    /// the refresh does not succeed.
    async fn refresh_if_needed(&self) -> Result<String>;
}

pub struct InMemoryCredentialStore {
    current: RwLock<Option<Credential>>,
    refresh_lock: Mutex<()>,
    refresher: Arc<dyn TokenRefresher>,
}

impl InMemoryCredentialStore {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresher,
        }
    }

    pub fn with_credential(self, credential: Credential) -> Self {
        Self {
            current: RwLock::new(Some(credential)),
            ..self
        }
    }

    async fn current_valid_token(&self) -> Result<Option<String>> {
        let guard = self.current.read().await;
        let Some(credential) = guard.as_ref() else {
            return Err(TaskError::AuthRequired(
                "no credential held; authorize the application first".to_string(),
            ));
        };
        Ok(credential.valid_access_token(Utc::now()).map(str::to_string))
    }

    /// Drop the stored credential unless it was replaced meanwhile (e.g. by a
    /// fresh authorization callback).
    async fn clear_if_unchanged(&self, seen: &Credential) {
        let mut guard = self.current.write().await;
        if guard.as_ref() == Some(seen) {
            *guard = None;
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    async fn set(&self, credential: Credential) {
        *self.current.write().await = Some(credential);
    }

    async fn clear(&self) {
        *self.current.write().await = None;
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn refresh_if_needed(&self) -> Result<String> {
        if let Some(token) = self.current_valid_token().await? {
            return Ok(token);
        }

        let _refresh_guard = self.refresh_lock.lock().await;

        // Re-check under the guard: a concurrent caller may have refreshed already.
        let Some(seen) = self.get().await else {
            return Err(TaskError::AuthRequired(
                "no credential held; authorize the application first".to_string(),
            ));
        };
        if let Some(token) = seen.valid_access_token(Utc::now()) {
            return Ok(token.to_string());
        }

        let Some(refresh_token) = seen.refresh_token.clone() else {
            tracing::warn!("access token expired and no refresh token is held");
            self.clear_if_unchanged(&seen).await;
            return Err(TaskError::AuthRequired(
                "access token expired and no refresh token is held".to_string(),
            ));
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(grant) => {
                let next = seen.refreshed(grant, Utc::now());
                let token = next.access_token.clone().unwrap_or_default();
                {
                    let mut guard = self.current.write().await;
                    if guard.as_ref() == Some(&seen) {
                        *guard = Some(next.clone());
                    }
                }
                tracing::info!(expires_at = ?next.expires_at, "access token refreshed");
                Ok(token)
            }
            Err(AuthError::Rejected { status, body }) if (400..500).contains(&status) => {
                tracing::warn!(status, %body, "refresh token rejected; credential cleared");
                self.clear_if_unchanged(&seen).await;
                Err(TaskError::AuthRequired(format!(
                    "refresh token rejected (status {status})"
                )))
            }
            Err(e) => {
                tracing::warn!(error = %e, "access token refresh failed");
                Err(e.into())
            }
        }
    }
}
