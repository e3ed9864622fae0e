//! Who is calling: bearer token first, then the session cookie.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use echo_auth::AuthenticationService;
use echo_core::{EchoError, Principal, User};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::EchoAxumError;

pub const SESSION_USER_ID_KEY: &str = "user_id";

/// Authentication handle extracted from the router state.
#[derive(Clone)]
pub struct AuthState(pub Arc<AuthenticationService>);

/// The caller, if authenticated.
///
/// A bearer token that fails verification is rejected with 401 even on
/// open endpoints; a stale session is treated as anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Principal>);

impl CurrentUser {
    pub fn require(self) -> Result<Principal, EchoAxumError> {
        self.0.ok_or_else(|| {
            EchoError::not_authenticated("Authentication credentials were not provided.").into()
        })
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = EchoAxumError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<CurrentUser>() {
            return Ok(cached.clone());
        }

        let AuthState(auth) = AuthState::from_ref(state);

        let mut principal = None;
        if let Some(value) = parts.headers.get(AUTHORIZATION) {
            let value = value
                .to_str()
                .map_err(|_| EchoError::not_authenticated("Invalid Authorization header"))?;
            principal = auth.authenticate_header(value).await?;
        }

        if principal.is_none() {
            if let Ok(session) = Session::from_request_parts(parts, state).await {
                principal = session_principal(&session, &auth).await?;
            }
        }

        let user = CurrentUser(principal);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

async fn session_principal(
    session: &Session,
    auth: &AuthenticationService,
) -> anyhow::Result<Option<Principal>> {
    let Some(raw) = session.get::<String>(SESSION_USER_ID_KEY).await? else {
        return Ok(None);
    };
    let Ok(user_id) = Uuid::parse_str(&raw) else {
        return Ok(None);
    };
    auth.principal_for(user_id).await
}

/// Log `user` in: rotate the session id and remember the user.
pub async fn start_session(session: &Session, user: &User) -> anyhow::Result<()> {
    session.cycle_id().await?;
    session
        .insert(SESSION_USER_ID_KEY, user.id.to_string())
        .await?;
    Ok(())
}

pub async fn end_session(session: &Session) -> anyhow::Result<()> {
    session.flush().await?;
    Ok(())
}
