use crate::error::AuthError;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub scope: String,
}

impl OAuthConfig {
    pub fn google(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            authorize_url: GOOGLE_AUTHORIZE_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scope: GOOGLE_TASKS_SCOPE.to_string(),
        }
    }
}

/// Token endpoint payload for both the code exchange and the refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Usually absent on refresh responses.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Exchanges a refresh token for a new grant.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
}

#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, AuthError> {
        if config.client_id.trim().is_empty() {
            return Err(AuthError::Config("client id is required".to_string()));
        }
        if config.client_secret.trim().is_empty() {
            return Err(AuthError::Config("client secret is required".to_string()));
        }
        Url::parse(&config.redirect_uri)
            .map_err(|e| AuthError::Config(format!("redirect uri: {e}")))?;
        Url::parse(&config.token_url).map_err(|e| AuthError::Config(format!("token url: {e}")))?;
        Url::parse(&config.authorize_url)
            .map_err(|e| AuthError::Config(format!("authorize url: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Consent-page URL. `offline` access so the grant carries a refresh token.
    pub fn authorize_url(&self, state: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.config.scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::Config(format!("authorize url: {e}")))
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, AuthError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let grant: TokenGrant = serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        if grant.access_token.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "token response carried an empty access_token".to_string(),
            ));
        }
        Ok(grant)
    }
}

#[async_trait]
impl TokenRefresher for OAuthClient {
    #[tracing::instrument(level = "info", skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }
}
