//! Protected dashboard pages. The guards have already verified the session
//! and attached the identity before these run.

use axum::{response::Html, Extension};

use super::auth::guard::Identity;
use super::pages;

pub async fn user(Extension(identity): Extension<Identity>) -> Html<String> {
    Html(pages::user_dashboard(&identity))
}

pub async fn admin(Extension(identity): Extension<Identity>) -> Html<String> {
    Html(pages::admin_dashboard(&identity))
}
