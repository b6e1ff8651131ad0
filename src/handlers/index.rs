//! `GET /`: the playground page.

use axum::{extract::State, response::Html};

use super::AppState;

pub async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(state.landing.render(None))
}
