use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use echo_core::{AfterHook, BeforeHook, EchoError, ErrorHook, HookContext, HookResult, ServiceHooks};

pub struct LogBefore;

#[async_trait]
impl<R, D> BeforeHook<R, D> for LogBefore
where
    R: Send + Sync + 'static,
    D: Send + Sync + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, D>) -> Result<()> {
        tracing::debug!(
            service = ctx.service,
            method = %ctx.method,
            schema = %ctx.tenant.schema,
            provider = ctx.params.provider.as_deref().unwrap_or("internal"),
            "-> service call"
        );
        Ok(())
    }
}

pub struct LogAfter;

#[async_trait]
impl<R, D> AfterHook<R, D> for LogAfter
where
    R: Send + Sync + 'static,
    D: Send + Sync + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, D>) -> Result<()> {
        let records = match &ctx.result {
            Some(HookResult::Many(rs)) => rs.len(),
            Some(HookResult::One(_)) => 1,
            None => 0,
        };
        tracing::debug!(
            service = ctx.service,
            method = %ctx.method,
            schema = %ctx.tenant.schema,
            records,
            "<- ok"
        );
        Ok(())
    }
}

pub struct LogError;

#[async_trait]
impl<R, D> ErrorHook<R, D> for LogError
where
    R: Send + Sync + 'static,
    D: Send + Sync + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, D>) -> Result<()> {
        let Some(err) = &ctx.error else {
            return Ok(());
        };
        let code = EchoError::from_anyhow(err).map(EchoError::code).unwrap_or(500);
        if code >= 500 {
            tracing::error!(
                service = ctx.service,
                method = %ctx.method,
                schema = %ctx.tenant.schema,
                error = %err,
                "<- failed"
            );
        } else {
            tracing::debug!(
                service = ctx.service,
                method = %ctx.method,
                schema = %ctx.tenant.schema,
                code,
                error = %err,
                "<- rejected"
            );
        }
        Ok(())
    }
}

/// Hooks shared by every service.
pub fn global_hooks<R, D>() -> Arc<ServiceHooks<R, D>>
where
    R: Send + Sync + 'static,
    D: Send + Sync + 'static,
{
    let mut hooks = ServiceHooks::new();
    hooks
        .before_all(Arc::new(LogBefore))
        .after_all(Arc::new(LogAfter))
        .error_all(Arc::new(LogError));
    Arc::new(hooks)
}
