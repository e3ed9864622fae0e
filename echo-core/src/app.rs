use std::sync::Arc;

use anyhow::Result;

use crate::config::ConfigSnapshot;
use crate::errors::EchoError;
use crate::hooks::{HookContext, HookResult, MethodHooks, ServiceHooks};
use crate::service::{EchoService, Params, ServiceMethod};
use crate::tenant::TenantContext;

/// A service wired to its hooks.
///
/// Every call goes through `before` hooks, the service, `after` hooks and,
/// on failure, `error` hooks. Global hooks run ahead of the service's own.
pub struct ServiceHandle<R, D>
where
    R: Send + 'static,
    D: Send + 'static,
{
    name: &'static str,
    service: Arc<dyn EchoService<R, D>>,
    global: Arc<ServiceHooks<R, D>>,
    hooks: ServiceHooks<R, D>,
    config: ConfigSnapshot,
}

impl<R, D> ServiceHandle<R, D>
where
    R: Send + 'static,
    D: Send + 'static,
{
    pub fn new(
        name: &'static str,
        service: Arc<dyn EchoService<R, D>>,
        config: ConfigSnapshot,
    ) -> Self {
        Self {
            name,
            service,
            global: Arc::new(ServiceHooks::new()),
            hooks: ServiceHooks::new(),
            config,
        }
    }

    pub fn with_global_hooks(mut self, global: Arc<ServiceHooks<R, D>>) -> Self {
        self.global = global;
        self
    }

    /// Register service-level hooks.
    pub fn hooks<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut ServiceHooks<R, D>),
    {
        f(&mut self.hooks);
        self
    }

    fn collect(&self, method: ServiceMethod) -> MethodHooks<R, D> {
        let mut out = MethodHooks::empty();
        self.global.collect_into(method, &mut out);
        self.hooks.collect_into(method, &mut out);
        out
    }

    fn context(&self, tenant: TenantContext, method: ServiceMethod, params: Params) -> HookContext<R, D> {
        HookContext::new(tenant, self.name, method, params, self.config.clone())
    }

    async fn invoke(&self, ctx: &mut HookContext<R, D>) -> Result<()> {
        let svc = &self.service;
        let id = ctx.id.clone().unwrap_or_default();
        let result = match ctx.method {
            ServiceMethod::Find => HookResult::Many(svc.find(&ctx.tenant, &ctx.params).await?),
            ServiceMethod::Get => HookResult::One(svc.get(&ctx.tenant, &id, &ctx.params).await?),
            ServiceMethod::Create => {
                let data = take_data(ctx)?;
                HookResult::One(svc.create(&ctx.tenant, data, &ctx.params).await?)
            }
            ServiceMethod::Update => {
                let data = take_data(ctx)?;
                HookResult::One(svc.update(&ctx.tenant, &id, data, &ctx.params).await?)
            }
            ServiceMethod::Patch => {
                let data = take_data(ctx)?;
                HookResult::One(svc.patch(&ctx.tenant, &id, data, &ctx.params).await?)
            }
            ServiceMethod::Remove => {
                HookResult::One(svc.remove(&ctx.tenant, &id, &ctx.params).await?)
            }
        };
        ctx.result = Some(result);
        Ok(())
    }

    async fn run_stages(&self, hooks: &MethodHooks<R, D>, ctx: &mut HookContext<R, D>) -> Result<()> {
        for h in &hooks.before {
            h.run(ctx).await?;
        }
        // a before hook may short-circuit by setting the result
        if ctx.result.is_none() {
            self.invoke(ctx).await?;
        }
        for h in &hooks.after {
            h.run(ctx).await?;
        }
        Ok(())
    }

    async fn run_pipeline(&self, mut ctx: HookContext<R, D>) -> Result<HookContext<R, D>> {
        let hooks = self.collect(ctx.method);

        if let Err(e) = self.run_stages(&hooks, &mut ctx).await {
            ctx.error = Some(e);

            for h in &hooks.error {
                if let Err(hook_err) = h.run(&mut ctx).await {
                    tracing::warn!(
                        service = self.name,
                        method = %ctx.method,
                        error = %hook_err,
                        "error hook failed"
                    );
                }
            }

            if let Some(err) = ctx.error.take() {
                return Err(err);
            }
        }

        Ok(ctx)
    }

    pub async fn find(&self, tenant: TenantContext, params: Params) -> Result<Vec<R>> {
        let ctx = self.context(tenant, ServiceMethod::Find, params);
        match self.run_pipeline(ctx).await?.result {
            Some(HookResult::Many(records)) => Ok(records),
            Some(HookResult::One(record)) => Ok(vec![record]),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get(&self, tenant: TenantContext, id: &str, params: Params) -> Result<R> {
        let ctx = self.context(tenant, ServiceMethod::Get, params).with_id(id);
        one(self.run_pipeline(ctx).await?)
    }

    pub async fn create(&self, tenant: TenantContext, data: D, params: Params) -> Result<R> {
        let ctx = self
            .context(tenant, ServiceMethod::Create, params)
            .with_data(data);
        one(self.run_pipeline(ctx).await?)
    }

    pub async fn update(&self, tenant: TenantContext, id: &str, data: D, params: Params) -> Result<R> {
        let ctx = self
            .context(tenant, ServiceMethod::Update, params)
            .with_id(id)
            .with_data(data);
        one(self.run_pipeline(ctx).await?)
    }

    pub async fn patch(&self, tenant: TenantContext, id: &str, data: D, params: Params) -> Result<R> {
        let ctx = self
            .context(tenant, ServiceMethod::Patch, params)
            .with_id(id)
            .with_data(data);
        one(self.run_pipeline(ctx).await?)
    }

    pub async fn remove(&self, tenant: TenantContext, id: &str, params: Params) -> Result<R> {
        let ctx = self.context(tenant, ServiceMethod::Remove, params).with_id(id);
        one(self.run_pipeline(ctx).await?)
    }
}

fn take_data<R, D>(ctx: &mut HookContext<R, D>) -> Result<D> {
    ctx.data
        .take()
        .ok_or_else(|| EchoError::bad_request("Request body is required").into_anyhow())
}

fn one<R, D>(ctx: HookContext<R, D>) -> Result<R> {
    match ctx.result {
        Some(HookResult::One(record)) => Ok(record),
        Some(HookResult::Many(_)) => Err(EchoError::general_error(format!(
            "{}.{} produced many records",
            ctx.service, ctx.method
        ))
        .into_anyhow()),
        None => Err(EchoError::general_error(format!(
            "{}.{} produced no result",
            ctx.service, ctx.method
        ))
        .into_anyhow()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::ErrorKind;
    use crate::hooks::{AfterHook, BeforeHook, ErrorHook};
    use crate::tenant::{SchemaName, TenantId};

    struct Echo;

    #[async_trait]
    impl EchoService<String, String> for Echo {
        async fn create(&self, _ctx: &TenantContext, data: String, _params: &Params) -> Result<String> {
            if data == "boom" {
                return Err(EchoError::conflict("boom").into_anyhow());
            }
            Ok(data)
        }
    }

    struct Trace(Arc<Mutex<Vec<String>>>, &'static str);

    #[async_trait]
    impl BeforeHook<String, String> for Trace {
        async fn run(&self, ctx: &mut HookContext<String, String>) -> Result<()> {
            self.0.lock().unwrap().push(format!("before:{}", self.1));
            if let Some(data) = ctx.data.as_mut() {
                data.push_str(self.1);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AfterHook<String, String> for Trace {
        async fn run(&self, _ctx: &mut HookContext<String, String>) -> Result<()> {
            self.0.lock().unwrap().push(format!("after:{}", self.1));
            Ok(())
        }
    }

    struct Recover;

    #[async_trait]
    impl ErrorHook<String, String> for Recover {
        async fn run(&self, ctx: &mut HookContext<String, String>) -> Result<()> {
            if ctx.error.as_ref().and_then(EchoError::kind_of) == Some(ErrorKind::Conflict) {
                ctx.error = None;
                ctx.result = Some(HookResult::One("recovered".into()));
            }
            Ok(())
        }
    }

    fn tenant() -> TenantContext {
        TenantContext::new(TenantId::new(), SchemaName::parse("alice").unwrap(), "alice.localhost")
    }

    #[tokio::test]
    async fn global_hooks_run_before_service_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut global = ServiceHooks::new();
        global.before_all(Arc::new(Trace(log.clone(), "g")));
        global.after_all(Arc::new(Trace(log.clone(), "g")));

        let handle = ServiceHandle::new("echo", Arc::new(Echo), ConfigSnapshot::default())
            .with_global_hooks(Arc::new(global))
            .hooks(|h| {
                h.before(ServiceMethod::Create, Arc::new(Trace(log.clone(), "s")));
                h.after(ServiceMethod::Create, Arc::new(Trace(log.clone(), "s")));
            });

        let out = handle
            .create(tenant(), "x".into(), Params::internal())
            .await
            .unwrap();
        assert_eq!(out, "xgs");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:g", "before:s", "after:g", "after:s"]
        );
    }

    #[tokio::test]
    async fn error_hooks_can_recover() {
        let plain = ServiceHandle::new("echo", Arc::new(Echo), ConfigSnapshot::default());
        let err = plain
            .create(tenant(), "boom".into(), Params::internal())
            .await
            .unwrap_err();
        assert_eq!(EchoError::kind_of(&err), Some(ErrorKind::Conflict));

        let recovering = ServiceHandle::new("echo", Arc::new(Echo), ConfigSnapshot::default())
            .hooks(|h| {
                h.error_all(Arc::new(Recover));
            });
        let out = recovering
            .create(tenant(), "boom".into(), Params::internal())
            .await
            .unwrap();
        assert_eq!(out, "recovered");
    }

    #[tokio::test]
    async fn unsupported_methods_are_rejected() {
        let handle = ServiceHandle::new("echo", Arc::new(Echo), ConfigSnapshot::default());
        let err = handle.find(tenant(), Params::internal()).await.unwrap_err();
        assert_eq!(EchoError::kind_of(&err), Some(ErrorKind::MethodNotAllowed));
    }
}
