pub mod health;
pub mod oauth;
pub mod relay;
pub mod tasks;

use crate::http_auth;
use crate::server::{GatewayState, RelayState};
use axum::{Extension, Router};
use std::sync::Arc;

pub fn relay_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(relay::router())
        .layer(Extension(state))
}

/// Task routes sit behind the credential check; OAuth and health stay open.
pub fn gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .merge(tasks::router().layer(axum::middleware::from_fn(http_auth::require_credentials)))
        .merge(oauth::router())
        .merge(health::router())
        .layer(Extension(state))
}
