//! Server assembly: store and mailer selection, router, middleware, serve.

use crate::cli::actions::ServerArgs;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;

pub mod email;
pub mod handlers;

use handlers::auth::guard;
use handlers::auth::state::{AuthConfig, AuthState};
use handlers::auth::store::{self, CredentialStore};
use handlers::auth::tokens::SessionSigner;
use handlers::{auth, dashboard, health, root};

/// Build the full application router around a prepared auth state. Shared
/// with the integration tests, which drive it through `oneshot`.
#[must_use]
pub fn router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/", get(root::landing))
        .route("/health", get(health::health))
        .route("/signup", get(auth::signup::page).post(auth::signup::submit))
        .route("/login", get(auth::login::page).post(auth::login::submit))
        .route("/logout", get(auth::login::logout))
        .route("/verify-email", get(auth::verification::verify))
        .route(
            "/forgot-password",
            get(auth::password::forgot_page).post(auth::password::forgot_submit),
        )
        .route(
            "/reset-password",
            get(auth::password::reset_page).post(auth::password::reset_submit),
        )
        .route(
            "/user/dashboard",
            get(dashboard::user).route_layer(middleware::from_fn(guard::require_user)),
        )
        .route(
            "/admin/dashboard",
            get(dashboard::admin).route_layer(middleware::from_fn(guard::require_admin)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(args: ServerArgs) -> Result<()> {
    let store = match &args.dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(5))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;
            store::init_schema(&pool).await?;
            CredentialStore::Postgres(pool)
        }
        None => {
            warn!("no DSN configured, accounts are kept in memory and lost on restart");
            CredentialStore::memory()
        }
    };

    let mailer = match (args.mail_endpoint, args.mail_api_key, args.mail_from) {
        (Some(endpoint), Some(api_key), Some(from)) => email::Mailer::http(endpoint, api_key, from)?,
        _ => {
            warn!("mail transport not fully configured, emails are logged instead of sent");
            email::Mailer::log()
        }
    };

    let mut config = AuthConfig::new(args.base_url)
        .with_reset_ttl_seconds(args.reset_ttl_seconds);
    match (args.admin_email, args.admin_password) {
        (Some(admin_email), Some(admin_password)) => {
            config = config.with_admin_credentials(admin_email, admin_password);
        }
        (None, None) => {}
        _ => warn!("admin email and password must both be set, admin login disabled"),
    }

    let signer = SessionSigner::new(&args.secret, args.session_ttl_seconds);
    let state = AuthState::new(config, store, signer, mailer)?;

    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{}", args.port)).await?;

    info!("Listening on [::]:{}", args.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
