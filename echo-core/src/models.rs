//! Records kept by the tenant directory and the per-tenant partitions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::{SchemaName, TenantId};

/// An identity in the shared partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Public view of a user: `{id, username, email}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

/// A tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: TenantId,
    pub schema_name: SchemaName,
    pub name: String,
    pub paid_until: NaiveDate,
    pub on_trial: bool,
    /// `None` for the public tenant.
    pub owner_id: Option<Uuid>,
    pub created_on: DateTime<Utc>,
}

/// A hostname bound to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: Uuid,
    pub domain: String,
    pub tenant_id: TenantId,
    pub is_primary: bool,
}

/// A blog post inside one tenant partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(rename = "author")]
    pub author_id: Uuid,
    pub author_username: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_authored_by(&self, principal: &Principal) -> bool {
        self.author_id == principal.user_id
    }

    /// Published posts are visible to anyone, drafts only to their author.
    pub fn is_visible_to(&self, principal: Option<&Principal>) -> bool {
        self.is_published || principal.is_some_and(|p| self.is_authored_by(p))
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewClient {
    pub schema_name: SchemaName,
    pub name: String,
    pub paid_until: NaiveDate,
    pub on_trial: bool,
}

#[derive(Debug, Clone)]
pub struct NewDomain {
    pub domain: String,
    pub tenant_id: TenantId,
    pub is_primary: bool,
}

/// Everything created by one registration.
#[derive(Debug, Clone)]
pub struct Provisioning {
    pub user: NewUser,
    /// Owner is the user created in the same unit of work.
    pub client: NewClient,
    pub domain: String,
}

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub user: User,
    pub client: Client,
    pub domain: Domain,
}

/// Filters for listing posts.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub published_only: bool,
    /// Author username, compared case-insensitively.
    pub author: Option<String>,
}

impl PostQuery {
    pub fn matches(&self, post: &Post) -> bool {
        if self.published_only && !post.is_published {
            return false;
        }
        match &self.author {
            Some(author) => post.author_username.eq_ignore_ascii_case(author),
            None => true,
        }
    }
}
