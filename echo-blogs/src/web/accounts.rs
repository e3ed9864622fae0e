use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use echo_axum::{end_session, start_session, ActiveTenant, CurrentUser};
use echo_core::{EchoError, ErrorKind};
use tower_sessions::Session;

use super::flash::{self, Flash};
use super::pages::{self, HtmlError};
use super::chrome;
use crate::services::accounts::{LoginRequest, RegisterRequest, PASSWORDS_DO_NOT_MATCH};
use crate::state::AppState;

const WRONG_SCHEMA: &str = "Tenant creation must be done from the public schema.";

pub async fn home(
    ActiveTenant(tenant): ActiveTenant,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Response, HtmlError> {
    let chrome = chrome(&tenant, user.as_ref(), &session, Vec::new()).await?;
    Ok(pages::layout("Home", &chrome, &pages::home(&chrome)).into_response())
}

pub async fn register_page(
    ActiveTenant(tenant): ActiveTenant,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Response, HtmlError> {
    if !tenant.is_public() {
        return Err(EchoError::bad_request(WRONG_SCHEMA).into());
    }
    let chrome = chrome(&tenant, user.as_ref(), &session, Vec::new()).await?;
    Ok(pages::layout("Register", &chrome, &pages::register_form()).into_response())
}

pub async fn register_submit(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    CurrentUser(user): CurrentUser,
    session: Session,
    form: Result<Form<RegisterRequest>, FormRejection>,
) -> Result<Response, HtmlError> {
    if !tenant.is_public() {
        return Err(EchoError::bad_request(WRONG_SCHEMA).into());
    }
    let form = form.map(|Form(f)| f).unwrap_or_default();

    let blank = [&form.username, &form.email, &form.password]
        .iter()
        .any(|v| v.trim().is_empty());
    let problems = if blank {
        vec![Flash::error("All fields are required.")]
    } else if form.confirm_password.as_deref() != Some(form.password.as_str()) {
        vec![Flash::error(PASSWORDS_DO_NOT_MATCH)]
    } else {
        match state.accounts.register(&tenant, form).await {
            Ok(out) => {
                start_session(&session, &out.user).await?;
                let message = format!(
                    "Account created successfully! Your blog is available at {}:{}",
                    out.domain.domain,
                    state.public_port()
                );
                flash::push(&session, Flash::success(message)).await?;
                return Ok(Redirect::to("/").into_response());
            }
            Err(err) => match EchoError::from_anyhow(&err) {
                Some(e) if e.kind == ErrorKind::BadRequest => {
                    let mut messages = e.field_messages();
                    if messages.is_empty() {
                        messages.push(e.message.clone());
                    }
                    messages.into_iter().map(Flash::error).collect()
                }
                _ => vec![Flash::error("Error creating account. Please try again.")],
            },
        }
    };

    let chrome = chrome(&tenant, user.as_ref(), &session, problems).await?;
    Ok(pages::layout("Register", &chrome, &pages::register_form()).into_response())
}

pub async fn login_page(
    ActiveTenant(tenant): ActiveTenant,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Response, HtmlError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let chrome = chrome(&tenant, None, &session, Vec::new()).await?;
    Ok(pages::layout("Log in", &chrome, &pages::login_form()).into_response())
}

pub async fn login_submit(
    State(state): State<AppState>,
    ActiveTenant(tenant): ActiveTenant,
    CurrentUser(user): CurrentUser,
    session: Session,
    form: Result<Form<LoginRequest>, FormRejection>,
) -> Result<Response, HtmlError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let form = form.map(|Form(f)| f).unwrap_or_default();

    match state.accounts.login(&form.username, &form.password).await {
        Ok(user) => {
            start_session(&session, &user).await?;
            flash::push(&session, Flash::success(format!("Welcome back, {}!", user.username))).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(err) if EchoError::kind_of(&err) == Some(ErrorKind::BadRequest) => {
            let problems = vec![Flash::error("Invalid username or password.")];
            let chrome = chrome(&tenant, None, &session, problems).await?;
            Ok(pages::layout("Log in", &chrome, &pages::login_form()).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn logout(session: Session) -> Result<Response, HtmlError> {
    end_session(&session).await?;
    flash::push(&session, Flash::success("You have been logged out successfully.")).await?;
    Ok(Redirect::to("/").into_response())
}
