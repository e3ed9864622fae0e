//! Server-rendered pages.

use axum::routing::get;
use axum::Router;
use echo_core::{Principal, TenantContext};
use tower_sessions::Session;

use crate::state::AppState;

pub mod accounts;
pub mod blog;
pub mod flash;
pub mod pages;

use flash::Flash;
use pages::Chrome;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(accounts::home).post(accounts::home))
        .route(
            "/register",
            get(accounts::register_page).post(accounts::register_submit),
        )
        .route("/login", get(accounts::login_page).post(accounts::login_submit))
        .route("/logout", get(accounts::logout))
        .route("/blog/", get(blog::post_list).post(blog::post_create))
        .route("/blog", get(blog::post_list).post(blog::post_create))
}

/// Page chrome with the session's pending messages followed by `extra`.
pub(crate) async fn chrome<'a>(
    tenant: &'a TenantContext,
    user: Option<&'a Principal>,
    session: &Session,
    extra: Vec<Flash>,
) -> anyhow::Result<Chrome<'a>> {
    let mut flashes = flash::take(session).await?;
    flashes.extend(extra);
    Ok(Chrome {
        tenant,
        user,
        flashes,
    })
}
