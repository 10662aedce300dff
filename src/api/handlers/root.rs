use axum::response::Html;

use super::pages;

pub async fn landing() -> Html<String> {
    Html(pages::landing())
}
