//! Core multi-tenant types for EchoBlogs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EchoError;

/// Schema of the shared partition holding identities and the tenant directory.
pub const PUBLIC_SCHEMA: &str = "public";

const MAX_SCHEMA_LEN: usize = 63;

/// Tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaNameError {
    #[error("Username must be between 1 and 63 characters.")]
    Length,
    #[error("Username must start with a letter and contain only letters, digits or underscores.")]
    Charset,
    #[error("Username '{0}' is reserved.")]
    Reserved(String),
}

/// Name of a tenant's isolated data partition.
///
/// Always lowercase ASCII, starting with a letter, at most 63 bytes, so it
/// can be interpolated into identifiers of the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaName(String);

impl SchemaName {
    pub fn public() -> Self {
        Self(PUBLIC_SCHEMA.to_string())
    }

    /// Schema for the tenant owned by `username`: the lowercased username.
    /// `public` and `pg_*` are refused.
    pub fn for_username(username: &str) -> Result<Self, SchemaNameError> {
        let lowered = username.trim().to_ascii_lowercase();
        if lowered == PUBLIC_SCHEMA || lowered.starts_with("pg_") {
            return Err(SchemaNameError::Reserved(lowered));
        }
        Self::parse(&lowered)
    }

    pub fn parse(raw: &str) -> Result<Self, SchemaNameError> {
        if raw.is_empty() || raw.len() > MAX_SCHEMA_LEN {
            return Err(SchemaNameError::Length);
        }
        let mut chars = raw.chars();
        let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !(first_ok && rest_ok) {
            return Err(SchemaNameError::Charset);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_public(&self) -> bool {
        self.0 == PUBLIC_SCHEMA
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SchemaName {
    type Error = SchemaNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SchemaName> for String {
    fn from(value: SchemaName) -> Self {
        value.0
    }
}

/// Context carried with every EchoBlogs operation.
///
/// Built per request by the tenant resolver and passed explicitly into
/// services and hooks. Never stored globally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub schema: SchemaName,
    /// Hostname the request was resolved from.
    pub domain: String,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, schema: SchemaName, domain: impl Into<String>) -> Self {
        Self {
            tenant_id,
            schema,
            domain: domain.into(),
        }
    }

    pub fn is_public(&self) -> bool {
        self.schema.is_public()
    }

    /// Fails with `BadRequest(message)` unless this is the public tenant.
    pub fn require_public(&self, message: &str) -> anyhow::Result<()> {
        if self.is_public() {
            Ok(())
        } else {
            Err(EchoError::bad_request(message).into_anyhow())
        }
    }

    /// The blog partition of this tenant. The public tenant has none.
    pub fn blog_schema(&self) -> anyhow::Result<&SchemaName> {
        if self.is_public() {
            return Err(EchoError::not_found("Blogs are served from tenant domains.").into_anyhow());
        }
        Ok(&self.schema)
    }
}
