use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::errors::EchoError;
use crate::models::Principal;
use crate::tenant::TenantContext;

/// Standard service methods: find, get, create, update, patch, remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceMethod {
    Find,
    Get,
    Create,
    Update,
    Patch,
    Remove,
}

impl ServiceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMethod::Find => "find",
            ServiceMethod::Get => "get",
            ServiceMethod::Create => "create",
            ServiceMethod::Update => "update",
            ServiceMethod::Patch => "patch",
            ServiceMethod::Remove => "remove",
        }
    }

    /// create, update, patch and remove.
    pub fn is_write(&self) -> bool {
        !matches!(self, ServiceMethod::Find | ServiceMethod::Get)
    }
}

impl fmt::Display for ServiceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call parameters.
///
/// `provider` is `None` for internal calls and names the transport
/// (`"rest"`, `"web"`) for calls coming from outside.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub provider: Option<String>,
    pub principal: Option<Principal>,
    pub query: HashMap<String, String>,
}

impl Params {
    pub fn internal() -> Self {
        Self::default()
    }

    pub fn external(
        provider: impl Into<String>,
        principal: Option<Principal>,
        query: HashMap<String, String>,
    ) -> Self {
        Self {
            provider: Some(provider.into()),
            principal,
            query,
        }
    }

    pub fn is_external(&self) -> bool {
        self.provider.is_some()
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn not_implemented(method: ServiceMethod) -> anyhow::Error {
    EchoError::method_not_allowed(format!("Method `{method}` is not supported by this service"))
        .into_anyhow()
}

/// A tenant-aware service.
///
/// `R` is the record type, `D` the data accepted by writes. Every method
/// defaults to `MethodNotAllowed`, so a service only overrides what it
/// supports.
#[async_trait]
pub trait EchoService<R, D>: Send + Sync
where
    R: Send + 'static,
    D: Send + 'static,
{
    async fn find(&self, _ctx: &TenantContext, _params: &Params) -> Result<Vec<R>> {
        Err(not_implemented(ServiceMethod::Find))
    }

    async fn get(&self, _ctx: &TenantContext, _id: &str, _params: &Params) -> Result<R> {
        Err(not_implemented(ServiceMethod::Get))
    }

    async fn create(&self, _ctx: &TenantContext, _data: D, _params: &Params) -> Result<R> {
        Err(not_implemented(ServiceMethod::Create))
    }

    /// Full replace.
    async fn update(
        &self,
        _ctx: &TenantContext,
        _id: &str,
        _data: D,
        _params: &Params,
    ) -> Result<R> {
        Err(not_implemented(ServiceMethod::Update))
    }

    async fn patch(
        &self,
        _ctx: &TenantContext,
        _id: &str,
        _data: D,
        _params: &Params,
    ) -> Result<R> {
        Err(not_implemented(ServiceMethod::Patch))
    }

    async fn remove(&self, _ctx: &TenantContext, _id: &str, _params: &Params) -> Result<R> {
        Err(not_implemented(ServiceMethod::Remove))
    }
}
