//! JSON API under `/api`.

use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod posts;

pub fn routes() -> Router<AppState> {
    Router::new().merge(auth::routes()).merge(posts::routes())
}
