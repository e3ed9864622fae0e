//! Host-based tenant resolution.
//!
//! [`resolve_tenant`] looks the request's host up in the directory and
//! stores the resulting [`TenantContext`] in the request extensions.
//! Handlers receive it through the [`ActiveTenant`] extractor.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::HOST, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use echo_core::store::normalize_host;
use echo_core::{Directory, EchoError, TenantContext};

use crate::error::EchoAxumError;

#[derive(Clone)]
pub struct TenantResolver {
    directory: Arc<dyn Directory>,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    pub async fn resolve(&self, host: &str) -> anyhow::Result<TenantContext> {
        let host = normalize_host(host);
        match self.directory.resolve_host(&host).await? {
            Some((client, domain)) => Ok(TenantContext::new(client.id, client.schema_name, domain.domain)),
            None => Err(EchoError::not_found(format!("No tenant for hostname '{host}'")).into_anyhow()),
        }
    }
}

/// `Host` header, or the URI authority for HTTP/2 requests.
pub fn request_host(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .filter(|h| !h.trim().is_empty())
}

pub async fn resolve_tenant(
    State(resolver): State<TenantResolver>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let Some(host) = request_host(&parts) else {
        return EchoAxumError::from(EchoError::not_found("No tenant for hostname ''")).into_response();
    };

    match resolver.resolve(&host).await {
        Ok(tenant) => {
            tracing::debug!(host = %host, schema = %tenant.schema, "tenant resolved");
            parts.extensions.insert(tenant);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => EchoAxumError(err).into_response(),
    }
}

/// The tenant pinned to this request by [`resolve_tenant`].
#[derive(Debug, Clone)]
pub struct ActiveTenant(pub TenantContext);

impl<S> FromRequestParts<S> for ActiveTenant
where
    S: Send + Sync,
{
    type Rejection = EchoAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(ActiveTenant)
            .ok_or_else(|| EchoError::general_error("Tenant resolver is not installed").into())
    }
}
