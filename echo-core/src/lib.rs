//! echo-core: framework-agnostic core for EchoBlogs.

pub mod app;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod models;
pub mod service;
pub mod store;
pub mod tenant;
pub mod validation;

pub use app::ServiceHandle;
pub use config::{ConfigSnapshot, EchoConfig};
pub use errors::{EchoError, ErrorKind, FieldErrors};
pub use hooks::{AfterHook, BeforeHook, ErrorHook, HookContext, HookResult, ServiceHooks};
pub use models::{Client, Domain, Post, PostQuery, Principal, User, UserView};
pub use service::{EchoService, Params, ServiceMethod};
pub use store::{Directory, Partitions, Store};
pub use tenant::{SchemaName, TenantContext, TenantId, PUBLIC_SCHEMA};
