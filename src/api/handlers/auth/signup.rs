//! Signup page and form handler.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use std::sync::Arc;

use super::engine::{self, SignupOutcome};
use super::state::AuthState;
use super::types::SignupForm;
use crate::api::handlers::pages;

pub async fn page() -> Html<String> {
    Html(pages::signup(None, &SignupForm::default()))
}

pub async fn submit(
    Extension(state): Extension<Arc<AuthState>>,
    Form(form): Form<SignupForm>,
) -> Response {
    // Re-renders keep name, email, and role but never the passwords.
    let old = SignupForm {
        password: String::new(),
        confirm_password: String::new(),
        ..form.clone()
    };

    match engine::signup(&state, form).await {
        SignupOutcome::Completed => Redirect::to("/login?signup=success").into_response(),
        SignupOutcome::Rejected(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(pages::signup(Some(&message), &old)),
        )
            .into_response(),
        SignupOutcome::DuplicateEmail => (
            StatusCode::CONFLICT,
            Html(pages::signup(Some("Email already registered"), &old)),
        )
            .into_response(),
        SignupOutcome::Unavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(pages::internal_error()),
        )
            .into_response(),
    }
}
