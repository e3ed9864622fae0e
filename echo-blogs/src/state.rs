use std::sync::Arc;

use axum::extract::FromRef;
use echo_auth::AuthenticationService;
use echo_axum::AuthState;
use echo_core::{ConfigSnapshot, Store};

use crate::services::accounts::AccountsService;
use crate::services::posts::PostsHandle;

/// Router state shared by the API and HTML handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigSnapshot,
    pub store: Store,
    pub auth: Arc<AuthenticationService>,
    pub accounts: Arc<AccountsService>,
    pub posts: Arc<PostsHandle>,
}

impl AppState {
    /// Port shown in links to tenant domains.
    pub fn public_port(&self) -> u16 {
        self.config.get_u16("http.port").unwrap_or(8000)
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        AuthState(state.auth.clone())
    }
}
