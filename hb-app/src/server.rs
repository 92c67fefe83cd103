//! HTTP servers for the instruction relay and the task gateway.

use crate::config::HortabotConfig;
use crate::error::AppError;
use crate::routes;
use anyhow::Result;
use axum::Router;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use hb_llm::GenerationClient;
use hb_tasks::{
    InMemoryCredentialStore, OAuthClient, OAuthConfig, TaskError, TaskService, TasksClient,
};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Outstanding `/authorize` round-trips kept for CSRF validation.
const MAX_PENDING_OAUTH_STATES: usize = 32;

pub struct RelayState {
    pub generation: GenerationClient,
    pub prompt_prefix: String,
}

pub struct GatewayState {
    pub tasks: TaskService,
    pub oauth: OAuthClient,
    pub public_url: String,
    pending_states: Mutex<VecDeque<String>>,
}

impl GatewayState {
    pub fn new(tasks: TaskService, oauth: OAuthClient, public_url: String) -> Self {
        Self {
            tasks,
            oauth,
            public_url: public_url.trim_end_matches('/').to_string(),
            pending_states: Mutex::new(VecDeque::new()),
        }
    }

    pub fn authorize_hint(&self) -> String {
        format!("{}/authorize", self.public_url)
    }

    pub fn task_error(&self, err: TaskError) -> AppError {
        AppError::from_task(err, &self.authorize_hint())
    }

    pub async fn remember_state(&self, state: String) {
        let mut pending = self.pending_states.lock().await;
        pending.push_back(state);
        while pending.len() > MAX_PENDING_OAUTH_STATES {
            pending.pop_front();
        }
    }

    /// Consume `state`; true only for a value issued by `/authorize` and not yet used.
    pub async fn take_state(&self, state: &str) -> bool {
        let mut pending = self.pending_states.lock().await;
        match pending.iter().position(|s| s == state) {
            Some(idx) => {
                pending.remove(idx);
                true
            }
            None => false,
        }
    }
}

pub fn build_relay_state(cfg: &HortabotConfig) -> Result<Arc<RelayState>> {
    let generation = GenerationClient::new(
        &cfg.relay.generation_url,
        &cfg.relay.model,
        Duration::from_secs(cfg.relay.generation_timeout_seconds),
    )?;
    Ok(Arc::new(RelayState {
        generation,
        prompt_prefix: cfg.relay.prompt_prefix.clone(),
    }))
}

pub fn build_gateway_state(cfg: &HortabotConfig) -> Result<Arc<GatewayState>> {
    cfg.require_gateway_credentials()?;
    let oauth = OAuthClient::new(OAuthConfig {
        authorize_url: cfg.gateway.authorize_url.clone(),
        token_url: cfg.gateway.token_url.clone(),
        ..OAuthConfig::google(
            &cfg.gateway.client_id,
            &cfg.gateway.client_secret,
            &cfg.gateway.redirect_uri(),
        )
    })?;
    let credentials = Arc::new(InMemoryCredentialStore::new(Arc::new(oauth.clone())));
    let tasks = TaskService::new(TasksClient::new(&cfg.gateway.tasks_api_url)?, credentials);
    Ok(Arc::new(GatewayState::new(
        tasks,
        oauth,
        cfg.gateway.public_url(),
    )))
}

pub async fn serve_relay(cfg: &HortabotConfig) -> Result<()> {
    let addr = cfg.relay_addr()?;
    tracing::info!(
        bind_addr = %addr,
        generation_url = %cfg.relay.generation_url,
        model = %cfg.relay.model,
        generation_timeout_seconds = cfg.relay.generation_timeout_seconds,
        "relay configuration loaded"
    );
    let state = build_relay_state(cfg)?;
    serve("relay", addr, routes::relay_router(state)).await
}

pub async fn serve_gateway(cfg: &HortabotConfig) -> Result<()> {
    let addr = cfg.gateway_addr()?;
    tracing::info!(
        bind_addr = %addr,
        redirect_uri = %cfg.gateway.redirect_uri(),
        public_url = %cfg.gateway.public_url(),
        tasks_api_url = %cfg.gateway.tasks_api_url,
        "gateway configuration loaded"
    );
    let state = build_gateway_state(cfg)?;
    tracing::info!(
        authorize_url = %cfg.gateway.authorize_hint(),
        "open the authorize url in a browser to connect Google Tasks"
    );
    serve("gateway", addr, routes::gateway_router(state)).await
}

/// Validate config and report what each process would need to start.
pub async fn doctor(cfg: &HortabotConfig) -> Result<()> {
    tracing::info!(
        relay_addr = %cfg.relay_addr()?,
        gateway_addr = %cfg.gateway_addr()?,
        model = %cfg.relay.model,
        generation_url = %cfg.relay.generation_url,
        "config ok"
    );
    match cfg.require_gateway_credentials() {
        Ok(()) => tracing::info!("gateway: oauth client credentials configured"),
        Err(e) => tracing::warn!(error = %e, "gateway: not startable"),
    }
    match cfg.require_bot_token() {
        Ok(()) => tracing::info!("bot: telegram token configured"),
        Err(e) => tracing::warn!(error = %e, "bot: not startable"),
    }
    Ok(())
}

async fn serve(name: &'static str, addr: SocketAddr, router: Router) -> Result<()> {
    let listener = preflight_bind_listener(addr).await?;
    let app = with_http_layers(router);
    let shutdown = CancellationToken::new();

    tracing::info!(server = name, %addr, "hortabot serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;
    tracing::info!(server = name, "http server shutdown completed");
    Ok(())
}

pub fn with_http_layers(router: Router) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri().path(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    router
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

pub async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
            _ = shutdown.cancelled() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => tracing::warn!("received ctrl-c; beginning graceful shutdown"),
                Err(e) => tracing::error!(error = %e, "failed to await ctrl-c signal"),
            },
            _ = shutdown.cancelled() => {}
        }
    }
    shutdown.cancel();
}
