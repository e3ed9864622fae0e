use std::collections::HashMap;

use axum::extract::rejection::FormRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use echo_axum::{ActiveTenant, CurrentUser};
use echo_core::{EchoError, ErrorKind, Params, Principal, TenantContext};
use serde::Deserialize;
use tower_sessions::Session;

use super::chrome;
use super::flash::{self, Flash};
use super::pages::{self, HtmlError};
use crate::services::posts::PostData;
use crate::state::AppState;

const PROVIDER: &str = "web";

#[derive(Debug, Default, Deserialize)]
pub struct NewPostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

async fn render_list(
    state: &AppState,
    tenant: TenantContext,
    user: Option<Principal>,
    session: &Session,
    query: HashMap<String, String>,
    problems: Vec<Flash>,
) -> Result<Response, HtmlError> {
    let params = Params::external(PROVIDER, user.clone(), query);
    let posts = state.posts.find(tenant.clone(), params).await?;
    let chrome = chrome(&tenant, user.as_ref(), session, problems).await?;
    let body = pages::post_list(&posts, user.is_some());
    Ok(pages::layout("Blog", &chrome, &body).into_response())
}

pub async fn post_list(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    CurrentUser(user): CurrentUser,
    session: Session,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, HtmlError> {
    render_list(&state, tenant, user, &session, query, Vec::new()).await
}

pub async fn post_create(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    CurrentUser(user): CurrentUser,
    session: Session,
    form: Result<Form<NewPostForm>, FormRejection>,
) -> Result<Response, HtmlError> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };
    let form = form.map(|Form(f)| f).unwrap_or_default();

    if form.title.trim().is_empty() || form.content.trim().is_empty() {
        let problems = vec![Flash::error("Please fill in all fields.")];
        return render_list(&state, tenant, Some(user), &session, HashMap::new(), problems).await;
    }

    let params = Params::external(PROVIDER, Some(user.clone()), HashMap::new());
    let data = PostData::new(form.title, form.content);
    match state.posts.create(tenant.clone(), data, params).await {
        Ok(_) => {
            flash::push(&session, Flash::success("Post created successfully!")).await?;
            Ok(Redirect::to("/blog/").into_response())
        }
        Err(err) => match EchoError::from_anyhow(&err) {
            Some(e) if e.kind == ErrorKind::BadRequest => {
                let problems = e.field_messages().into_iter().map(Flash::error).collect();
                render_list(&state, tenant, Some(user), &session, HashMap::new(), problems).await
            }
            _ => Err(err.into()),
        },
    }
}
