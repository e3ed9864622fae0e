use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use echo_axum::{map_json_rejection, start_session, ActiveTenant, CurrentUser, EchoAxumError};
use echo_core::validation::REQUIRED;
use echo_core::{EchoError, FieldErrors, UserView};
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::services::accounts::{LoginRequest, RefreshRequest, RegisterRequest};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register/", post(register))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login/", post(login))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh/", post(refresh))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/me/", get(me))
        .route("/api/auth/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    session: Session,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), EchoAxumError> {
    let Json(request) = body.map_err(map_json_rejection)?;

    let out = state.accounts.register(&tenant, request).await?;
    start_session(&session, &out.user).await?;
    let tokens = state.auth.issue_tokens(&out.user)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": UserView::from(&out.user),
            "domain": out.domain.domain,
            "tokens": tokens,
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, EchoAxumError> {
    let Json(request) = body.map_err(map_json_rejection)?;

    let user = state.accounts.login(&request.username, &request.password).await?;
    start_session(&session, &user).await?;
    let tokens = state.auth.issue_tokens(&user)?;

    Ok(Json(json!({
        "user": UserView::from(&user),
        "tokens": tokens,
    })))
}

async fn refresh(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Value>, EchoAxumError> {
    let Json(request) = body.map_err(map_json_rejection)?;
    if request.refresh.trim().is_empty() {
        let mut errors = FieldErrors::default();
        errors.push("refresh", REQUIRED);
        return Err(errors.into_bad_request("Invalid refresh request").into());
    }

    let access = state.auth.refresh(request.refresh.trim())?;
    Ok(Json(json!({ "access": access })))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UserView>, EchoAxumError> {
    let principal = user.require()?;
    let user = state
        .store
        .directory
        .get_user(principal.user_id)
        .await?
        .ok_or_else(|| EchoError::not_authenticated("User not found"))?;
    Ok(Json(UserView::from(&user)))
}
