//! Route guards for the protected dashboard areas.
//!
//! Guards verify the session cookie, attach the caller's identity to the
//! request, and otherwise redirect to the login page. A present-but-invalid
//! cookie is cleared on the way out so the browser stops sending it.

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use std::sync::Arc;
use tracing::debug;

use super::session::{clear_session_cookie, extract_session_token};
use super::state::AuthState;
use super::store::Role;

/// Verified caller, attached to the request for downstream handlers.
#[derive(Clone, Debug)]
pub struct Identity {
    pub sub: String,
    pub email: String,
    pub role: Role,
}

fn authenticate(state: &AuthState, request: &Request) -> Result<Identity, Response> {
    let Some(token) = extract_session_token(request.headers()) else {
        return Err(Redirect::to("/login").into_response());
    };

    match state.signer().verify(token) {
        Ok(claims) => Ok(Identity {
            sub: claims.sub,
            email: claims.email,
            role: claims.role,
        }),
        Err(err) => {
            debug!("session rejected: {err}");
            let mut response = Redirect::to("/login").into_response();
            response.headers_mut().insert(
                header::SET_COOKIE,
                clear_session_cookie(state.config().session_cookie_secure()),
            );
            Err(response)
        }
    }
}

/// Requires any authenticated session.
pub async fn require_user(
    Extension(state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &request) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(response) => response,
    }
}

/// Requires an admin session. Authenticated non-admins land on their own
/// dashboard instead of an error page.
pub async fn require_admin(
    Extension(state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &request) {
        Ok(identity) if identity.role == Role::Admin => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(identity) => Redirect::to(identity.role.dashboard_path()).into_response(),
        Err(response) => response,
    }
}
