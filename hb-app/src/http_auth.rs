use crate::error::AppError;
use crate::server::GatewayState;
use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hb_tasks::CredentialState;
use std::sync::Arc;

/// Reject task routes while no credential pair is held.
///
/// Expired credentials pass: the task service refreshes them after it has
/// validated the request arguments.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn require_credentials(req: Request<Body>, next: Next) -> Response {
    let Some(state) = req.extensions().get::<Arc<GatewayState>>().cloned() else {
        return AppError::Internal("gateway state is not configured".to_string()).into_response();
    };

    let credential_state = state.tasks.credentials().state().await;
    if credential_state == CredentialState::Unauthenticated {
        let authorize_url = state.authorize_hint();
        tracing::warn!(
            path = %req.uri().path(),
            %authorize_url,
            "task request without credential rejected"
        );
        return AppError::AuthRequired {
            message: format!(
                "no Google Tasks credential held; authorize access at {authorize_url}"
            ),
            authorize_url: Some(authorize_url),
        }
        .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::require_credentials;
    use crate::server::GatewayState;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router, middleware};
    use chrono::Utc;
    use hb_tasks::{
        Credential, InMemoryCredentialStore, OAuthClient, OAuthConfig, TaskService, TasksClient,
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn router(held: Option<Credential>) -> Router {
        let oauth = OAuthClient::new(OAuthConfig::google(
            "client",
            "secret",
            "http://localhost:3002/oauth2callback",
        ))
        .expect("oauth");
        let mut store = InMemoryCredentialStore::new(Arc::new(oauth.clone()));
        if let Some(credential) = held {
            store = store.with_credential(credential);
        }
        let tasks = TaskService::new(
            TasksClient::new(hb_tasks::GOOGLE_TASKS_API_URL).expect("client"),
            Arc::new(store),
        );
        let state = Arc::new(GatewayState::new(
            tasks,
            oauth,
            "https://tasks.example.org".to_string(),
        ));
        Router::new()
            .route("/lists", get(|| async { "ok" }))
            .layer(middleware::from_fn(require_credentials))
            .layer(Extension(state))
    }

    fn request() -> Request<Body> {
        Request::builder()
            .uri("/lists")
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn missing_credential_is_unauthorized_with_hint() {
        let response = router(None).oneshot(request()).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["authorize_url"], "https://tasks.example.org/authorize");
    }

    #[tokio::test]
    async fn expired_credential_passes_through_to_handler() {
        let expired = Credential {
            access_token: Some("old".to_string()),
            refresh_token: Some("rt".to_string()),
            expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
            scope: None,
            obtained_at: Utc::now() - chrono::Duration::hours(2),
        };
        let response = router(Some(expired)).oneshot(request()).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_state_extension_is_internal_error() {
        let response = Router::new()
            .route("/lists", get(|| async { "ok" }))
            .layer(middleware::from_fn(require_credentials))
            .oneshot(request())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
