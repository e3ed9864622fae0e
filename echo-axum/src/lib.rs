//! echo-axum: Axum adapter for EchoBlogs.
//!
//! Tenant resolution middleware, tenant and identity extractors, error
//! rendering, and the request-id/trace/session layers.

pub mod app;
pub mod identity;
pub mod tenant;
mod error;

pub use app::{session_layer, AxumApp, SessionOptions, REQUEST_ID_HEADER};
pub use error::{map_json_rejection, EchoAxumError};
pub use identity::{end_session, start_session, AuthState, CurrentUser, SESSION_USER_ID_KEY};
pub use tenant::{resolve_tenant, ActiveTenant, TenantResolver};

pub use axum;
pub use tower_sessions;
