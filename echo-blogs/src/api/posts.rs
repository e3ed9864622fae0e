use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use echo_axum::{map_json_rejection, ActiveTenant, CurrentUser, EchoAxumError};
use echo_core::{EchoError, Params, Post};

use crate::services::posts::PostData;
use crate::state::AppState;

const PROVIDER: &str = "rest";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/posts/", get(list).post(create))
        .route("/api/posts", get(list).post(create))
        .route(
            "/api/posts/{id}/",
            get(retrieve).put(update).patch(patch).delete(destroy),
        )
        .route(
            "/api/posts/{id}",
            get(retrieve).put(update).patch(patch).delete(destroy),
        )
}

fn params(user: CurrentUser, query: HashMap<String, String>) -> Params {
    Params::external(PROVIDER, user.0, query)
}

/// Anonymous callers get the authentication error, not a body error.
fn body(
    body: Result<Json<PostData>, JsonRejection>,
    user: &CurrentUser,
) -> Result<PostData, EchoAxumError> {
    match body {
        Ok(Json(data)) => Ok(data),
        Err(_) if user.0.is_none() => Err(EchoError::not_authenticated(
            "Authentication credentials were not provided.",
        )
        .into()),
        Err(rejection) => Err(map_json_rejection(rejection)),
    }
}

async fn list(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    user: CurrentUser,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Post>>, EchoAxumError> {
    let posts = state.posts.find(tenant, params(user, query)).await?;
    Ok(Json(posts))
}

async fn create(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    user: CurrentUser,
    data: Result<Json<PostData>, JsonRejection>,
) -> Result<(StatusCode, Json<Post>), EchoAxumError> {
    let data = body(data, &user)?;
    let post = state
        .posts
        .create(tenant, data, params(user, HashMap::new()))
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn retrieve(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Post>, EchoAxumError> {
    let post = state
        .posts
        .get(tenant, &id, params(user, HashMap::new()))
        .await?;
    Ok(Json(post))
}

async fn update(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    user: CurrentUser,
    Path(id): Path<String>,
    data: Result<Json<PostData>, JsonRejection>,
) -> Result<Json<Post>, EchoAxumError> {
    let data = body(data, &user)?;
    let post = state
        .posts
        .update(tenant, &id, data, params(user, HashMap::new()))
        .await?;
    Ok(Json(post))
}

async fn patch(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    user: CurrentUser,
    Path(id): Path<String>,
    data: Result<Json<PostData>, JsonRejection>,
) -> Result<Json<Post>, EchoAxumError> {
    let data = body(data, &user)?;
    let post = state
        .posts
        .patch(tenant, &id, data, params(user, HashMap::new()))
        .await?;
    Ok(Json(post))
}

async fn destroy(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, EchoAxumError> {
    state
        .posts
        .remove(tenant, &id, params(user, HashMap::new()))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
