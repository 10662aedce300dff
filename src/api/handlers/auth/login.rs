//! Login page, form handler, and logout.

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use super::engine::{self, LoginOutcome};
use super::session::{clear_session_cookie, session_cookie};
use super::state::AuthState;
use super::types::LoginForm;
use crate::api::handlers::pages;

#[derive(Deserialize)]
pub struct LoginQuery {
    signup: Option<String>,
    reset: Option<String>,
}

pub async fn page(Query(query): Query<LoginQuery>) -> Html<String> {
    let notice = if query.signup.as_deref() == Some("success") {
        Some("Account created. Check your inbox to verify your email.")
    } else if query.reset.as_deref() == Some("success") {
        Some("Password updated. You can log in now.")
    } else {
        None
    };
    Html(pages::login(None, notice, ""))
}

pub async fn submit(
    Extension(state): Extension<Arc<AuthState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let old_email = form.email.clone();

    match engine::login(&state, form).await {
        LoginOutcome::Authenticated { token, role } => {
            let cookie = match session_cookie(
                &token,
                state.signer().ttl_seconds(),
                state.config().session_cookie_secure(),
            ) {
                Ok(cookie) => cookie,
                Err(err) => {
                    error!("login failed: {err:#}");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Html(pages::internal_error()),
                    )
                        .into_response();
                }
            };
            let mut response = Redirect::to(role.dashboard_path()).into_response();
            response.headers_mut().insert(header::SET_COOKIE, cookie);
            response
        }
        LoginOutcome::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            Html(pages::login(
                Some("Invalid email or password"),
                None,
                &old_email,
            )),
        )
            .into_response(),
        LoginOutcome::Unavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(pages::internal_error()),
        )
            .into_response(),
    }
}

pub async fn logout(Extension(state): Extension<Arc<AuthState>>) -> Response {
    let mut response = Redirect::to("/login").into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        clear_session_cookie(state.config().session_cookie_secure()),
    );
    response
}
