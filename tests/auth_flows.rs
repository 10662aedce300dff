//! End-to-end flow tests driving the router directly.

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use std::sync::Arc;
use tower::util::ServiceExt;

use autogate::api::email::Mailer;
use autogate::api::handlers::auth::state::{AuthConfig, AuthState};
use autogate::api::handlers::auth::store::CredentialStore;
use autogate::api::handlers::auth::tokens::SessionSigner;
use autogate::api::router;

fn test_state() -> Result<Arc<AuthState>> {
    let config = AuthConfig::new("http://localhost:8080".to_string())
        .with_bcrypt_cost(4)
        .with_admin_credentials("root@x.com".to_string(), SecretString::from("hunter2".to_string()));
    let signer = SessionSigner::new(&SecretString::from("test-secret".to_string()), 3600);
    AuthState::new(config, CredentialStore::memory(), signer, Mailer::memory())
}

async fn get(app: &Router, uri: &str) -> Result<axum::response::Response> {
    let request = Request::builder().uri(uri).body(Body::empty())?;
    app.clone().oneshot(request).await.context("request failed")
}

async fn get_with_cookie(app: &Router, uri: &str, cookie: &str) -> Result<axum::response::Response> {
    let request = Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())?;
    app.clone().oneshot(request).await.context("request failed")
}

async fn post_form(app: &Router, uri: &str, body: &str) -> Result<axum::response::Response> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))?;
    app.clone().oneshot(request).await.context("request failed")
}

async fn body_string(response: axum::response::Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .context("failed to read body")?;
    String::from_utf8(bytes.to_vec()).context("body is not utf-8")
}

fn location(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

fn session_cookie(response: &axum::response::Response) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(ToString::to_string)
}

async fn emailed_token(state: &AuthState, index: usize) -> Result<String> {
    let Mailer::Memory(mailer) = state.mailer() else {
        anyhow::bail!("test state uses the memory mailer");
    };
    let messages = mailer.messages().await;
    let message = messages.get(index).context("email not sent")?;
    let (_, tail) = message.html.split_once("token=").context("no link")?;
    Ok(tail.chars().take_while(|c| *c != '"' && *c != '&').collect())
}

const ANA_SIGNUP: &str = "name=Ana&email=ana%40x.com&password=secret1\
                          &confirm_password=secret1&role=user";

#[tokio::test]
async fn ana_signs_up_verifies_and_logs_in() -> Result<()> {
    let state = test_state()?;
    let app = router(state.clone());

    // Signup lands on the login page with the signup banner.
    let response = post_form(&app, "/signup", ANA_SIGNUP).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?signup=success"));

    let page = body_string(get(&app, "/login?signup=success").await?).await?;
    assert!(page.contains("Check your inbox"));

    // Login before verification gets the generic rejection.
    let response = post_form(&app, "/login", "email=ana%40x.com&password=secret1").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_string(response).await?.contains("Invalid email or password"));

    // Follow the emailed link.
    let token = emailed_token(&state, 0).await?;
    let response = get(&app, &format!("/verify-email?token={token}")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    // The link is single-use.
    let response = get(&app, &format!("/verify-email?token={token}")).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Login sets the session cookie and redirects to the user dashboard.
    let response = post_form(&app, "/login", "email=ana%40x.com&password=secret1").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/user/dashboard"));
    let cookie = session_cookie(&response).context("no session cookie")?;
    assert!(cookie.starts_with("jwt="));

    // Cookie lifetime follows the signer's TTL.
    let raw_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .context("no set-cookie")?
        .to_str()
        .map_err(anyhow::Error::new)?;
    assert!(raw_cookie.contains("Max-Age=3600"));

    let response = get_with_cookie(&app, "/user/dashboard", &cookie).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await?.contains("ana@x.com"));

    // Authenticated non-admins land back on their own dashboard.
    let response = get_with_cookie(&app, "/admin/dashboard", &cookie).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/user/dashboard"));
    Ok(())
}

#[tokio::test]
async fn signup_validation_rerenders_with_old_input() -> Result<()> {
    let state = test_state()?;
    let app = router(state);

    let response = post_form(
        &app,
        "/signup",
        "name=Ana&email=ana%40x.com&password=secret1&confirm_password=other12&role=user",
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = body_string(response).await?;
    assert!(page.contains("Passwords do not match"));
    assert!(page.contains("value=\"Ana\""));
    assert!(page.contains("value=\"ana@x.com\""));
    assert!(!page.contains("secret1"));
    Ok(())
}

#[tokio::test]
async fn duplicate_signup_conflicts() -> Result<()> {
    let state = test_state()?;
    let app = router(state);

    assert_eq!(
        post_form(&app, "/signup", ANA_SIGNUP).await?.status(),
        StatusCode::SEE_OTHER
    );
    let response = post_form(&app, "/signup", ANA_SIGNUP).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(body_string(response).await?.contains("Email already registered"));
    Ok(())
}

#[tokio::test]
async fn guards_redirect_anonymous_and_invalid_sessions() -> Result<()> {
    let state = test_state()?;
    let app = router(state);

    for path in ["/user/dashboard", "/admin/dashboard"] {
        let response = get(&app, path).await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/login"));
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    // A present-but-invalid cookie is cleared on the redirect.
    let response = get_with_cookie(&app, "/user/dashboard", "jwt=garbage").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    let cleared = session_cookie(&response).context("no clearing cookie")?;
    assert_eq!(cleared, "jwt=");
    Ok(())
}

#[tokio::test]
async fn admin_env_login_reaches_admin_dashboard() -> Result<()> {
    let state = test_state()?;
    let app = router(state);

    let response = post_form(&app, "/login", "email=root%40x.com&password=hunter2").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/dashboard"));
    let cookie = session_cookie(&response).context("no session cookie")?;

    let response = get_with_cookie(&app, "/admin/dashboard", &cookie).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await?.contains("root@x.com"));
    Ok(())
}

#[tokio::test]
async fn forgot_password_is_neutral_and_reset_completes() -> Result<()> {
    let state = test_state()?;
    let app = router(state.clone());

    // Unknown email: same acknowledgement, nothing sent, nothing stored.
    let response = post_form(&app, "/forgot-password", "email=nobody%40x.com").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let Mailer::Memory(mailer) = state.mailer() else {
        anyhow::bail!("test state uses the memory mailer");
    };
    assert!(mailer.messages().await.is_empty());

    // Known account: signup, verify, then reset.
    post_form(&app, "/signup", ANA_SIGNUP).await?;
    let verify_token = emailed_token(&state, 0).await?;
    get(&app, &format!("/verify-email?token={verify_token}")).await?;

    let response = post_form(&app, "/forgot-password", "email=ana%40x.com").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let reset_token = emailed_token(&state, 1).await?;

    let response = get(&app, &format!("/reset-password?token={reset_token}")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_form(
        &app,
        "/reset-password",
        &format!("token={reset_token}&new_password=newsecret&confirm_password=newsecret"),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?reset=success"));

    // Consumed token, old password dead, new one works.
    let response = post_form(
        &app,
        "/reset-password",
        &format!("token={reset_token}&new_password=another1&confirm_password=another1"),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_form(&app, "/login", "email=ana%40x.com&password=secret1").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = post_form(&app, "/login", "email=ana%40x.com&password=newsecret").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/user/dashboard"));
    Ok(())
}

#[tokio::test]
async fn logout_clears_the_cookie() -> Result<()> {
    let state = test_state()?;
    let app = router(state);

    let response = get(&app, "/logout").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    let cleared = session_cookie(&response).context("no clearing cookie")?;
    assert_eq!(cleared, "jwt=");
    Ok(())
}

#[tokio::test]
async fn health_reports_the_memory_store() -> Result<()> {
    let state = test_state()?;
    let app = router(state);

    let response = get(&app, "/health").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await?;
    assert!(body.contains("\"store\":\"memory\""));
    assert!(body.contains("\"status\":\"ok\""));
    Ok(())
}

#[tokio::test]
async fn landing_and_forms_render() -> Result<()> {
    let state = test_state()?;
    let app = router(state);

    for (path, needle) in [
        ("/", "Autogate"),
        ("/signup", "Sign up"),
        ("/login", "Log in"),
        ("/forgot-password", "Forgot password"),
    ] {
        let response = get(&app, path).await?;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        assert!(body_string(response).await?.contains(needle), "{path}");
    }

    // Reset form without a token is rejected outright.
    let response = get(&app, "/reset-password?token=").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
