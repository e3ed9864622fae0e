use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{missing_partition, normalize_host, Conflict, Directory, Partitions};
use crate::errors::EchoError;
use crate::models::{
    Client, Domain, NewClient, NewDomain, Post, PostQuery, Provisioned, Provisioning, User,
};
use crate::tenant::{SchemaName, TenantId};

/// Process-lifetime store. One lock guards everything, so provisioning is
/// a single critical section.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    clients: HashMap<TenantId, Client>,
    /// keyed by hostname
    domains: HashMap<String, Domain>,
    partitions: HashMap<SchemaName, HashMap<Uuid, Post>>,
}

impl MemoryState {
    fn user_by_name(&self, username: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn client_by_schema(&self, schema: &SchemaName) -> Option<&Client> {
        self.clients.values().find(|c| &c.schema_name == schema)
    }

    fn check_provisioning(&self, request: &Provisioning, domain: &str) -> Option<Conflict> {
        if self.user_by_name(&request.user.username).is_some() {
            return Some(Conflict::Username);
        }
        if self.user_by_email(&request.user.email).is_some() {
            return Some(Conflict::Email);
        }
        if self.client_by_schema(&request.client.schema_name).is_some() {
            return Some(Conflict::Schema(request.client.schema_name.to_string()));
        }
        if self.domains.contains_key(domain) {
            return Some(Conflict::Domain(domain.to_string()));
        }
        None
    }

    fn partition(&self, schema: &SchemaName) -> Result<&HashMap<Uuid, Post>> {
        self.partitions
            .get(schema)
            .ok_or_else(|| missing_partition(schema))
    }

    fn partition_mut(&mut self, schema: &SchemaName) -> Result<&mut HashMap<Uuid, Post>> {
        self.partitions
            .get_mut(schema)
            .ok_or_else(|| missing_partition(schema))
    }
}

fn build_client(new: NewClient, owner_id: Option<Uuid>) -> Client {
    Client {
        id: TenantId::new(),
        schema_name: new.schema_name,
        name: new.name,
        paid_until: new.paid_until,
        on_trial: new.on_trial,
        owner_id,
        created_on: Utc::now(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.user_by_name(username.trim()).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.user_by_email(email.trim()).cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn provision(&self, request: Provisioning) -> Result<Provisioned> {
        let domain_name = normalize_host(&request.domain);
        let mut state = self.state.write().await;

        if let Some(conflict) = state.check_provisioning(&request, &domain_name) {
            return Err(conflict.into_anyhow());
        }

        let user = User {
            id: Uuid::new_v4(),
            username: request.user.username,
            email: request.user.email,
            password_hash: request.user.password_hash,
            is_active: true,
            date_joined: Utc::now(),
        };
        let client = build_client(request.client, Some(user.id));
        let domain = Domain {
            id: Uuid::new_v4(),
            domain: domain_name.clone(),
            tenant_id: client.id,
            is_primary: true,
        };

        state.users.insert(user.id, user.clone());
        state.clients.insert(client.id, client.clone());
        state.partitions.insert(client.schema_name.clone(), HashMap::new());
        state.domains.insert(domain_name, domain.clone());

        Ok(Provisioned {
            user,
            client,
            domain,
        })
    }

    async fn get_or_create_client(&self, new: NewClient) -> Result<(Client, bool)> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.client_by_schema(&new.schema_name) {
            return Ok((existing.clone(), false));
        }
        let client = build_client(new, None);
        if !client.schema_name.is_public() {
            state.partitions.insert(client.schema_name.clone(), HashMap::new());
        }
        state.clients.insert(client.id, client.clone());
        Ok((client, true))
    }

    async fn get_or_create_domain(&self, new: NewDomain) -> Result<(Domain, bool)> {
        let name = normalize_host(&new.domain);
        let mut state = self.state.write().await;
        if let Some(existing) = state.domains.get(&name) {
            if existing.tenant_id != new.tenant_id {
                return Err(EchoError::conflict(format!(
                    "Domain '{name}' belongs to another tenant"
                ))
                .into_anyhow());
            }
            return Ok((existing.clone(), false));
        }
        if !state.clients.contains_key(&new.tenant_id) {
            return Err(EchoError::not_found(format!("No tenant {}", new.tenant_id)).into_anyhow());
        }
        let domain = Domain {
            id: Uuid::new_v4(),
            domain: name.clone(),
            tenant_id: new.tenant_id,
            is_primary: new.is_primary,
        };
        state.domains.insert(name, domain.clone());
        Ok((domain, true))
    }

    async fn resolve_host(&self, host: &str) -> Result<Option<(Client, Domain)>> {
        let state = self.state.read().await;
        let Some(domain) = state.domains.get(host) else {
            return Ok(None);
        };
        Ok(state
            .clients
            .get(&domain.tenant_id)
            .map(|client| (client.clone(), domain.clone())))
    }

    async fn clients(&self) -> Result<Vec<Client>> {
        let state = self.state.read().await;
        let mut clients: Vec<Client> = state.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.created_on.cmp(&b.created_on));
        Ok(clients)
    }

    async fn domains_for(&self, tenant: TenantId) -> Result<Vec<Domain>> {
        let state = self.state.read().await;
        let mut domains: Vec<Domain> = state
            .domains
            .values()
            .filter(|d| d.tenant_id == tenant)
            .cloned()
            .collect();
        domains.sort_by(|a, b| b.is_primary.cmp(&a.is_primary).then(a.domain.cmp(&b.domain)));
        Ok(domains)
    }
}

#[async_trait]
impl Partitions for MemoryStore {
    async fn has_partition(&self, schema: &SchemaName) -> Result<bool> {
        Ok(self.state.read().await.partitions.contains_key(schema))
    }

    async fn insert_post(&self, schema: &SchemaName, post: Post) -> Result<Post> {
        let mut state = self.state.write().await;
        state.partition_mut(schema)?.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_posts(&self, schema: &SchemaName, query: &PostQuery) -> Result<Vec<Post>> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .partition(schema)?
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn get_post(&self, schema: &SchemaName, id: Uuid) -> Result<Option<Post>> {
        let state = self.state.read().await;
        Ok(state.partition(schema)?.get(&id).cloned())
    }

    async fn replace_post(&self, schema: &SchemaName, post: Post) -> Result<Post> {
        let mut state = self.state.write().await;
        let partition = state.partition_mut(schema)?;
        match partition.get_mut(&post.id) {
            Some(slot) => {
                *slot = post.clone();
                Ok(post)
            }
            None => Err(EchoError::not_found(format!("No post with id {}", post.id)).into_anyhow()),
        }
    }

    async fn delete_post(&self, schema: &SchemaName, id: Uuid) -> Result<Option<Post>> {
        let mut state = self.state.write().await;
        Ok(state.partition_mut(schema)?.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::errors::ErrorKind;
    use crate::models::NewUser;

    fn request(username: &str, email: &str) -> Provisioning {
        let schema = SchemaName::for_username(username).unwrap();
        Provisioning {
            user: NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: "hash".into(),
            },
            domain: format!("{schema}.localhost"),
            client: NewClient {
                schema_name: schema,
                name: username.to_string(),
                paid_until: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                on_trial: true,
            },
        }
    }

    fn post(author: &User, title: &str, published: bool) -> Post {
        let now = Utc::now();
        Post {
            id: Uuid::new_v4(),
            title: title.into(),
            content: "body".into(),
            author_id: author.id,
            author_username: author.username.clone(),
            is_published: published,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn provisioning_creates_every_record() {
        let store = MemoryStore::new();
        let out = store.provision(request("Alice", "alice@example.com")).await.unwrap();

        assert_eq!(out.client.schema_name.as_str(), "alice");
        assert_eq!(out.client.name, "Alice");
        assert_eq!(out.client.owner_id, Some(out.user.id));
        assert_eq!(out.domain.domain, "alice.localhost");
        assert!(out.domain.is_primary);
        assert!(store.has_partition(&out.client.schema_name).await.unwrap());

        let (client, domain) = store.resolve_host("alice.localhost").await.unwrap().unwrap();
        assert_eq!(client.id, out.client.id);
        assert_eq!(domain.tenant_id, client.id);
        assert!(store.find_user("ALICE").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicates_leave_no_partial_records() {
        let store = MemoryStore::new();
        store.provision(request("alice", "alice@example.com")).await.unwrap();

        let err = store.provision(request("ALICE", "other@example.com")).await.unwrap_err();
        assert_eq!(EchoError::kind_of(&err), Some(ErrorKind::BadRequest));
        let err = store.provision(request("bob", "Alice@Example.com")).await.unwrap_err();
        let echo = EchoError::from_anyhow(&err).unwrap();
        assert_eq!(echo.errors.as_ref().unwrap()["email"][0], "Email already exists.");

        assert_eq!(store.clients().await.unwrap().len(), 1);
        assert!(store.find_user("bob").await.unwrap().is_none());
        assert!(store.resolve_host("bob.localhost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_registrations_yield_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.provision(request("carol", "c1@example.com")).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.provision(request("carol", "c2@example.com")).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(store.clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partitions_are_isolated() {
        let store = MemoryStore::new();
        let alice = store.provision(request("alice", "a@example.com")).await.unwrap();
        let bob = store.provision(request("bob", "b@example.com")).await.unwrap();

        store
            .insert_post(&alice.client.schema_name, post(&alice.user, "hello", true))
            .await
            .unwrap();
        store
            .insert_post(&alice.client.schema_name, post(&alice.user, "draft", false))
            .await
            .unwrap();

        let published = PostQuery { published_only: true, author: None };
        let mine = store.find_posts(&alice.client.schema_name, &published).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "hello");
        assert!(store
            .find_posts(&bob.client.schema_name, &published)
            .await
            .unwrap()
            .is_empty());

        let err = store
            .find_posts(&SchemaName::parse("nobody").unwrap(), &published)
            .await
            .unwrap_err();
        assert_eq!(EchoError::kind_of(&err), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn public_tenant_setup_is_idempotent() {
        let store = MemoryStore::new();
        let public = NewClient {
            schema_name: SchemaName::public(),
            name: "Public".into(),
            paid_until: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            on_trial: false,
        };
        let (first, created) = store.get_or_create_client(public.clone()).await.unwrap();
        assert!(created);
        let (second, created) = store.get_or_create_client(public).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert!(!store.has_partition(&SchemaName::public()).await.unwrap());

        let domain = NewDomain { domain: "Localhost".into(), tenant_id: first.id, is_primary: false };
        assert!(store.get_or_create_domain(domain.clone()).await.unwrap().1);
        assert!(!store.get_or_create_domain(domain).await.unwrap().1);
        assert_eq!(store.domains_for(first.id).await.unwrap().len(), 1);
    }
}
