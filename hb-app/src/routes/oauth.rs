use crate::error::AppError;
use crate::server::GatewayState;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Extension, Json};
use chrono::Utc;
use hb_tasks::Credential;
use serde::Deserialize;
use std::sync::Arc;

const CALLBACK_SUCCESS: &str =
    "Authentication with Google Tasks succeeded! You can close this page and use the bot.";

#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/authorize", get(get_authorize))
        .route("/oauth2callback", get(get_callback))
        .route("/auth/status", get(get_status))
}

#[tracing::instrument(level = "info", skip_all)]
async fn get_authorize(
    Extension(state): Extension<Arc<GatewayState>>,
) -> Result<Redirect, AppError> {
    let csrf = uuid::Uuid::new_v4().simple().to_string();
    let url = state
        .oauth
        .authorize_url(&csrf)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    state.remember_state(csrf).await;
    tracing::info!("redirecting to the consent page");
    Ok(Redirect::to(url.as_str()))
}

#[tracing::instrument(level = "info", skip_all)]
async fn get_callback(
    Extension(state): Extension<Arc<GatewayState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error.filter(|e| !e.trim().is_empty()) {
        tracing::warn!(%error, "authorization denied by the provider");
        return bad_request(format!("Authorization failed: {error}"));
    }
    let Some(code) = params.code.filter(|c| !c.trim().is_empty()) else {
        return bad_request("Authorization code missing.".to_string());
    };
    let csrf_ok = match params.state.as_deref() {
        Some(csrf) => state.take_state(csrf).await,
        None => false,
    };
    if !csrf_ok {
        tracing::warn!("callback state missing or not issued by /authorize");
        return bad_request(
            "Unknown or expired authorization state; start again from /authorize.".to_string(),
        );
    }

    let grant = match state.oauth.exchange_code(&code).await {
        Ok(grant) => grant,
        Err(e) => {
            tracing::error!(error = %e, "authorization code exchange failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error exchanging the authorization code for tokens.".to_string(),
            )
                .into_response();
        }
    };
    if grant.refresh_token.is_none() {
        tracing::warn!("grant carried no refresh token; access ends when the token expires");
    }
    let credential = Credential::from_grant(grant, Utc::now());
    tracing::info!(expires_at = ?credential.expires_at, "credential stored");
    state.tasks.credentials().set(credential).await;

    (StatusCode::OK, CALLBACK_SUCCESS).into_response()
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_status(Extension(state): Extension<Arc<GatewayState>>) -> Json<serde_json::Value> {
    let credential_state = state.tasks.credentials().state().await;
    Json(serde_json::json!({ "state": credential_state }))
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

#[cfg(test)]
mod tests {
    use crate::routes::gateway_router;
    use crate::server::GatewayState;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use hb_tasks::{InMemoryCredentialStore, OAuthClient, OAuthConfig, TaskService, TasksClient};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::util::ServiceExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(token_server: &MockServer) -> (axum::Router, Arc<GatewayState>) {
        let oauth = OAuthClient::new(OAuthConfig {
            token_url: format!("{}/token", token_server.uri()),
            ..OAuthConfig::google("client-1", "secret", "http://localhost:3002/oauth2callback")
        })
        .expect("oauth");
        let credentials = Arc::new(InMemoryCredentialStore::new(Arc::new(oauth.clone())));
        let tasks = TaskService::new(
            TasksClient::new(&token_server.uri()).expect("tasks client"),
            credentials,
        );
        let state = Arc::new(GatewayState::new(
            tasks,
            oauth,
            "http://localhost:3002".to_string(),
        ));
        (gateway_router(state.clone()), state)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    async fn authorize_state(router: &axum::Router) -> String {
        let response = router.clone().oneshot(get("/authorize")).await.expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location header");
        let url = reqwest::Url::parse(location).expect("url");
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("access_type").map(String::as_str), Some("offline"));
        assert_eq!(pairs.get("prompt").map(String::as_str), Some("consent"));
        assert_eq!(
            pairs.get("scope").map(String::as_str),
            Some(hb_tasks::GOOGLE_TASKS_SCOPE)
        );
        pairs.get("state").cloned().expect("state param")
    }

    #[tokio::test]
    async fn full_authorization_round_trip_stores_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "refresh_token": "rt-1",
                "expires_in": 3599,
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (router, _state) = gateway(&server);

        let status = router.clone().oneshot(get("/auth/status")).await.expect("response");
        assert!(body_text(status).await.contains("unauthenticated"));

        let csrf = authorize_state(&router).await;
        let response = router
            .clone()
            .oneshot(get(&format!("/oauth2callback?code=auth-code&state={csrf}")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("succeeded"));

        let status = router.oneshot(get("/auth/status")).await.expect("response");
        let body: serde_json::Value =
            serde_json::from_str(&body_text(status).await).expect("json");
        assert_eq!(body["state"], "authenticated");
    }

    #[tokio::test]
    async fn callback_rejects_missing_code_error_param_and_unknown_state() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let (router, _state) = gateway(&server);

        for uri in [
            "/oauth2callback?state=x",
            "/oauth2callback?error=access_denied",
            "/oauth2callback?code=c&state=forged",
            "/oauth2callback?code=c",
        ] {
            let response = router.clone().oneshot(get(uri)).await.expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn failed_exchange_is_internal_error_and_state_is_consumed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;
        let (router, state) = gateway(&server);

        let csrf = authorize_state(&router).await;
        let response = router
            .clone()
            .oneshot(get(&format!("/oauth2callback?code=bad&state={csrf}")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.tasks.credentials().get().await.is_none());

        let replay = router
            .oneshot(get(&format!("/oauth2callback?code=bad&state={csrf}")))
            .await
            .expect("response");
        assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    }
}
