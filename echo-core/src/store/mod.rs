//! Storage for the tenant directory and per-tenant partitions.
//!
//! Two backends implement the same traits: [`MemoryStore`] for tests and
//! development, and [`SqliteStore`] for a single-file database where each
//! tenant partition is its own `"<schema>__posts"` table.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::EchoError;
use crate::models::{
    Client, Domain, NewClient, NewDomain, Post, PostQuery, Provisioned, Provisioning, User,
};
use crate::tenant::{SchemaName, TenantId};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Backend failures. Domain failures (duplicates, missing records) are
/// reported as `EchoError`s instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt record in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
    #[error("store lock poisoned")]
    Poisoned,
    #[error("unsupported database url '{0}'")]
    UnsupportedUrl(String),
}

impl From<StoreError> for EchoError {
    fn from(err: StoreError) -> Self {
        let constraint = matches!(
            &err,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        );
        if constraint {
            EchoError::conflict("Record already exists").with_source(err.into())
        } else {
            EchoError::general_error("Storage failure").with_source(err.into())
        }
    }
}

impl StoreError {
    pub fn into_anyhow(self) -> anyhow::Error {
        EchoError::from(self).into_anyhow()
    }
}

/// A uniqueness rule broken by a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    Username,
    Email,
    Schema(String),
    Domain(String),
}

impl Conflict {
    pub fn field(&self) -> &'static str {
        match self {
            Conflict::Email => "email",
            Conflict::Username | Conflict::Schema(_) | Conflict::Domain(_) => "username",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Conflict::Username => "Username already exists.".to_string(),
            Conflict::Email => "Email already exists.".to_string(),
            Conflict::Schema(schema) => format!("A blog named '{schema}' already exists."),
            Conflict::Domain(domain) => format!("The domain '{domain}' is already taken."),
        }
    }

    pub fn into_anyhow(self) -> anyhow::Error {
        EchoError::bad_request("Invalid registration data")
            .with_field_error(self.field(), self.message())
            .into_anyhow()
    }
}

/// Lowercased, port-free hostname.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    if let Some(rest) = host.strip_prefix('[') {
        // [::1]:8000
        return rest.split(']').next().unwrap_or_default().to_string();
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            name.to_string()
        }
        _ => host,
    }
}

/// Shared identities and the tenant directory.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Case-insensitive lookup.
    async fn find_user(&self, username: &str) -> Result<Option<User>>;

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Create user, client, partition and primary domain as one unit.
    /// Uniqueness is checked inside the same critical section.
    async fn provision(&self, request: Provisioning) -> Result<Provisioned>;

    /// Returns the client and whether it was created.
    async fn get_or_create_client(&self, client: NewClient) -> Result<(Client, bool)>;

    /// Returns the domain and whether it was created.
    async fn get_or_create_domain(&self, domain: NewDomain) -> Result<(Domain, bool)>;

    /// Tenant bound to `host` (already normalized).
    async fn resolve_host(&self, host: &str) -> Result<Option<(Client, Domain)>>;

    async fn clients(&self) -> Result<Vec<Client>>;

    async fn domains_for(&self, tenant: TenantId) -> Result<Vec<Domain>>;
}

/// Per-tenant blog partitions.
#[async_trait]
pub trait Partitions: Send + Sync {
    async fn has_partition(&self, schema: &SchemaName) -> Result<bool>;

    async fn insert_post(&self, schema: &SchemaName, post: Post) -> Result<Post>;

    /// Matching posts, newest first.
    async fn find_posts(&self, schema: &SchemaName, query: &PostQuery) -> Result<Vec<Post>>;

    async fn get_post(&self, schema: &SchemaName, id: Uuid) -> Result<Option<Post>>;

    async fn replace_post(&self, schema: &SchemaName, post: Post) -> Result<Post>;

    async fn delete_post(&self, schema: &SchemaName, id: Uuid) -> Result<Option<Post>>;
}

pub(crate) fn missing_partition(schema: &SchemaName) -> anyhow::Error {
    EchoError::not_found(format!("No blog partition for '{schema}'")).into_anyhow()
}

/// Directory and partitions of one backend.
#[derive(Clone)]
pub struct Store {
    pub directory: Arc<dyn Directory>,
    pub partitions: Arc<dyn Partitions>,
}

impl Store {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            directory: store.clone(),
            partitions: store,
        }
    }

    pub fn sqlite(store: SqliteStore) -> Self {
        let store = Arc::new(store);
        Self {
            directory: store.clone(),
            partitions: store,
        }
    }

    /// `memory`, `sqlite::memory:` or `sqlite://<path>`.
    pub fn open(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.eq_ignore_ascii_case("memory") {
            return Ok(Self::memory());
        }
        if url == "sqlite::memory:" {
            return Ok(Self::sqlite(SqliteStore::open_in_memory().map_err(StoreError::into_anyhow)?));
        }
        match url.strip_prefix("sqlite://") {
            Some(path) if !path.is_empty() => {
                Ok(Self::sqlite(SqliteStore::open(path).map_err(StoreError::into_anyhow)?))
            }
            _ => Err(StoreError::UnsupportedUrl(url.to_string()).into_anyhow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_are_normalized() {
        assert_eq!(normalize_host("Alice.LocalHost:8000"), "alice.localhost");
        assert_eq!(normalize_host("127.0.0.1"), "127.0.0.1");
        assert_eq!(normalize_host("[::1]:8000"), "::1");
        assert_eq!(normalize_host("::1"), "::1");
    }

    #[test]
    fn unknown_database_urls_are_refused() {
        assert!(Store::open("postgres://x").is_err());
        assert!(Store::open("memory").is_ok());
        assert!(Store::open("sqlite::memory:").is_ok());
    }
}
