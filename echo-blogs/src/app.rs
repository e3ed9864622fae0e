use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use echo_auth::{AuthOptions, AuthenticationService};
use echo_axum::{AxumApp, SessionOptions, TenantResolver};
use echo_core::{ConfigSnapshot, Store};
use tokio::net::ToSocketAddrs;

use crate::services::accounts::AccountsService;
use crate::services::tenants::{ensure_public_tenant, PublicTenantReport};
use crate::state::AppState;
use crate::{api, services, web};

pub struct BlogApp {
    pub router: Router,
    pub state: AppState,
}

impl BlogApp {
    pub async fn setup_public_tenant(&self) -> Result<PublicTenantReport> {
        let trial_days = self
            .state
            .config
            .get_i64("tenants.trial_days")
            .and_then(|d| u64::try_from(d).ok())
            .unwrap_or(365);
        ensure_public_tenant(self.state.store.directory.as_ref(), trial_days).await
    }

    pub async fn listen<A>(self, addr: A) -> Result<()>
    where
        A: ToSocketAddrs,
    {
        AxumApp::new(self.router).listen(addr).await
    }
}

fn session_options(config: &ConfigSnapshot) -> Result<SessionOptions> {
    let mut options = SessionOptions {
        secure: config.get_bool("session.secure").unwrap_or(false),
        cookie_domain: config.get_string("session.cookie_domain"),
        ..SessionOptions::default()
    };
    if let Some(inactivity) = config.get_duration("session.inactivity")? {
        options.inactivity = inactivity;
    }
    Ok(options)
}

pub fn blog_app(config: ConfigSnapshot) -> Result<BlogApp> {
    let store = Store::open(config.get("database.url").unwrap_or("memory"))?;

    let auth_options = AuthOptions::from_config(&config)?;
    let auth = Arc::new(AuthenticationService::new(auth_options, store.directory.clone()));

    let state = AppState {
        accounts: Arc::new(AccountsService::new(store.directory.clone(), auth.clone(), &config)),
        posts: Arc::new(services::configure_posts(store.partitions.clone(), config.clone())),
        config: config.clone(),
        store: store.clone(),
        auth,
    };

    let routes = Router::new()
        .merge(api::routes())
        .merge(web::routes())
        .with_state(state.clone());

    let router = AxumApp::new(routes)
        .with_tenants(TenantResolver::new(store.directory.clone()))
        .merge(Router::new().route("/health", get(|| async { "ok" })))
        .with_sessions(&session_options(&config)?)?
        .with_request_tracing()
        .into_router();

    Ok(BlogApp { router, state })
}
