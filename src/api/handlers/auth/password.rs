//! Forgot-password and reset-password handlers.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use std::sync::Arc;

use super::engine::{self, ForgotPasswordOutcome, ResetPasswordOutcome};
use super::state::AuthState;
use super::types::{ForgotPasswordForm, ResetPasswordForm, TokenQuery};
use crate::api::handlers::pages;

pub async fn forgot_page() -> Html<String> {
    Html(pages::forgot_password(None, ""))
}

pub async fn forgot_submit(
    Extension(state): Extension<Arc<AuthState>>,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    match engine::forgot_password(&state, &form.email).await {
        ForgotPasswordOutcome::Accepted => Html(pages::forgot_password_sent()).into_response(),
        ForgotPasswordOutcome::Rejected(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(pages::forgot_password(Some(&message), &form.email)),
        )
            .into_response(),
        ForgotPasswordOutcome::Unavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(pages::internal_error()),
        )
            .into_response(),
    }
}

pub async fn reset_page(Query(query): Query<TokenQuery>) -> Response {
    if query.token.is_empty() {
        return (StatusCode::BAD_REQUEST, Html(pages::invalid_token())).into_response();
    }
    // Token validity is checked on submit, where it is consumed.
    Html(pages::reset_password(&query.token, None)).into_response()
}

pub async fn reset_submit(
    Extension(state): Extension<Arc<AuthState>>,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let token = form.token.clone();

    match engine::reset_password(&state, form).await {
        ResetPasswordOutcome::Completed => Redirect::to("/login?reset=success").into_response(),
        ResetPasswordOutcome::Rejected(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(pages::reset_password(&token, Some(&message))),
        )
            .into_response(),
        ResetPasswordOutcome::UnknownToken => {
            (StatusCode::BAD_REQUEST, Html(pages::invalid_token())).into_response()
        }
        ResetPasswordOutcome::Unavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(pages::internal_error()),
        )
            .into_response(),
    }
}
