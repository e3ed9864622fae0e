use std::time::Duration;

use axum::{http::HeaderName, middleware, Router};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::tenant::{resolve_tenant, TenantResolver};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub secure: bool,
    pub cookie_domain: Option<String>,
    pub inactivity: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            secure: false,
            cookie_domain: None,
            inactivity: Duration::from_secs(14 * 24 * 60 * 60),
        }
    }
}

pub fn session_layer(options: &SessionOptions) -> anyhow::Result<SessionManagerLayer<MemoryStore>> {
    let mut layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(options.secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(options.inactivity.try_into()?));
    if let Some(domain) = &options.cookie_domain {
        layer = layer.with_domain(domain.clone());
    }
    Ok(layer)
}

/// Builds the HTTP stack around an application router.
///
/// Call order matters: layers added later wrap the ones added before.
pub struct AxumApp {
    pub router: Router<()>,
}

impl AxumApp {
    pub fn new(router: Router<()>) -> Self {
        Self { router }
    }

    /// Resolve the tenant for every route added so far.
    pub fn with_tenants(mut self, resolver: TenantResolver) -> Self {
        self.router = self
            .router
            .layer(middleware::from_fn_with_state(resolver, resolve_tenant));
        self
    }

    /// Routes that do not need a tenant (health checks).
    pub fn merge(mut self, router: Router<()>) -> Self {
        self.router = self.router.merge(router);
        self
    }

    pub fn with_sessions(mut self, options: &SessionOptions) -> anyhow::Result<Self> {
        self.router = self.router.layer(session_layer(options)?);
        Ok(self)
    }

    /// `x-request-id` (generated when absent) and a tracing span per request.
    pub fn with_request_tracing(mut self) -> Self {
        let header = HeaderName::from_static(REQUEST_ID_HEADER);
        self.router = self.router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(header)),
        );
        self
    }

    pub fn into_router(self) -> Router<()> {
        self.router
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
