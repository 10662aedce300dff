use axum::{
    body::Body,
    extract::Extension,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use super::auth::state::AuthState;

#[derive(Serialize, Debug)]
pub struct Health {
    name: String,
    version: String,
    store: String,
    status: String,
}

/// Liveness endpoint. Reports the store backend and pings it; HEAD gets the
/// status code without a body.
pub async fn health(method: Method, Extension(state): Extension<Arc<AuthState>>) -> Response {
    let ping = state.store().ping().await;
    if let Err(err) = &ping {
        error!("health check failed: {err}");
    }

    let health = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store().backend().to_string(),
        status: if ping.is_ok() { "ok" } else { "error" }.to_string(),
    };

    let status = if ping.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    (status, body).into_response()
}
