//! Email verification link handler.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use super::engine::{self, VerifyOutcome};
use super::state::AuthState;
use super::types::TokenQuery;
use crate::api::handlers::pages;

pub async fn verify(
    Extension(state): Extension<Arc<AuthState>>,
    Query(query): Query<TokenQuery>,
) -> Response {
    match engine::verify_email(&state, &query.token).await {
        VerifyOutcome::Verified => Html(pages::email_verified()).into_response(),
        VerifyOutcome::UnknownToken => {
            (StatusCode::BAD_REQUEST, Html(pages::invalid_token())).into_response()
        }
        VerifyOutcome::Unavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(pages::internal_error()),
        )
            .into_response(),
    }
}
