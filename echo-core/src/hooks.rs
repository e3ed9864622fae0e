//! Hooks run around every service call.
//!
//! Order for one call: global `before` hooks, service `before` hooks (all,
//! then per method), the service method, then `after` hooks in the same
//! order. If anything fails, `error` hooks see the error in `ctx.error`; a
//! hook may clear it and set `ctx.result` to recover.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ConfigSnapshot;
use crate::service::{Params, ServiceMethod};
use crate::tenant::TenantContext;

#[derive(Debug, Clone)]
pub enum HookResult<R> {
    One(R),
    Many(Vec<R>),
}

/// Context passed to hooks.
pub struct HookContext<R, D> {
    pub tenant: TenantContext,
    pub service: &'static str,
    pub method: ServiceMethod,
    pub id: Option<String>,
    pub params: Params,
    /// Input payload of create/update/patch.
    pub data: Option<D>,
    pub result: Option<HookResult<R>>,
    pub error: Option<anyhow::Error>,
    pub config: ConfigSnapshot,
}

impl<R, D> HookContext<R, D> {
    pub fn new(
        tenant: TenantContext,
        service: &'static str,
        method: ServiceMethod,
        params: Params,
        config: ConfigSnapshot,
    ) -> Self {
        Self {
            tenant,
            service,
            method,
            id: None,
            params,
            data: None,
            result: None,
            error: None,
            config,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: D) -> Self {
        self.data = Some(data);
        self
    }
}

#[async_trait]
pub trait BeforeHook<R, D>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, D>) -> Result<()>;
}

#[async_trait]
pub trait AfterHook<R, D>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, D>) -> Result<()>;
}

#[async_trait]
pub trait ErrorHook<R, D>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, D>) -> Result<()>;
}

/// Hooks for the whole pipeline collected for one method.
pub struct MethodHooks<R, D> {
    pub before: Vec<Arc<dyn BeforeHook<R, D>>>,
    pub after: Vec<Arc<dyn AfterHook<R, D>>>,
    pub error: Vec<Arc<dyn ErrorHook<R, D>>>,
}

/// Hook registrations of one service (or the global set).
pub struct ServiceHooks<R, D> {
    before_all: Vec<Arc<dyn BeforeHook<R, D>>>,
    before: HashMap<ServiceMethod, Vec<Arc<dyn BeforeHook<R, D>>>>,
    after_all: Vec<Arc<dyn AfterHook<R, D>>>,
    after: HashMap<ServiceMethod, Vec<Arc<dyn AfterHook<R, D>>>>,
    error_all: Vec<Arc<dyn ErrorHook<R, D>>>,
}

impl<R, D> Default for ServiceHooks<R, D> {
    fn default() -> Self {
        Self {
            before_all: Vec::new(),
            before: HashMap::new(),
            after_all: Vec::new(),
            after: HashMap::new(),
            error_all: Vec::new(),
        }
    }
}

impl<R, D> ServiceHooks<R, D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_all(&mut self, hook: Arc<dyn BeforeHook<R, D>>) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn before(&mut self, method: ServiceMethod, hook: Arc<dyn BeforeHook<R, D>>) -> &mut Self {
        self.before.entry(method).or_default().push(hook);
        self
    }

    /// Register one hook for several methods.
    pub fn before_each(
        &mut self,
        methods: &[ServiceMethod],
        hook: Arc<dyn BeforeHook<R, D>>,
    ) -> &mut Self {
        for method in methods {
            self.before(*method, hook.clone());
        }
        self
    }

    pub fn after_all(&mut self, hook: Arc<dyn AfterHook<R, D>>) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn after(&mut self, method: ServiceMethod, hook: Arc<dyn AfterHook<R, D>>) -> &mut Self {
        self.after.entry(method).or_default().push(hook);
        self
    }

    pub fn error_all(&mut self, hook: Arc<dyn ErrorHook<R, D>>) -> &mut Self {
        self.error_all.push(hook);
        self
    }

    /// Append the hooks registered for `method` to `out`.
    pub fn collect_into(&self, method: ServiceMethod, out: &mut MethodHooks<R, D>) {
        out.before.extend(self.before_all.iter().cloned());
        if let Some(hooks) = self.before.get(&method) {
            out.before.extend(hooks.iter().cloned());
        }
        out.after.extend(self.after_all.iter().cloned());
        if let Some(hooks) = self.after.get(&method) {
            out.after.extend(hooks.iter().cloned());
        }
        out.error.extend(self.error_all.iter().cloned());
    }
}

impl<R, D> MethodHooks<R, D> {
    pub fn empty() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
            error: Vec::new(),
        }
    }
}
