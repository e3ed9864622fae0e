use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use uuid::Uuid;

use super::{
    missing_partition, normalize_host, Conflict, Directory, Partitions, StoreError,
};
use crate::errors::EchoError;
use crate::models::{
    Client, Domain, NewClient, NewDomain, Post, PostQuery, Provisioned, Provisioning, User,
};
use crate::tenant::{SchemaName, TenantId};

const MIGRATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    date_joined TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS users_username_ci ON users (lower(username));
CREATE UNIQUE INDEX IF NOT EXISTS users_email_ci ON users (lower(email));

CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    schema_name TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    paid_until TEXT NOT NULL,
    on_trial INTEGER NOT NULL,
    owner_id TEXT REFERENCES users(id),
    created_on TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS domains (
    id TEXT PRIMARY KEY,
    domain TEXT NOT NULL UNIQUE,
    tenant_id TEXT NOT NULL REFERENCES clients(id),
    is_primary INTEGER NOT NULL
);
"#;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, date_joined";
const CLIENT_COLUMNS: &str = "id, schema_name, name, paid_until, on_trial, owner_id, created_on";
const DOMAIN_COLUMNS: &str = "id, domain, tenant_id, is_primary";
const POST_COLUMNS: &str =
    "id, title, content, author_id, author_username, is_published, created_at, updated_at";

/// SQLite backend. Each tenant partition is a `"<schema>__posts"` table;
/// schema names are validated identifiers so they can be quoted directly.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(MIGRATIONS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn posts_table(schema: &SchemaName) -> String {
    format!("\"{}__posts\"", schema.as_str())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn corrupt(table: &'static str, detail: impl ToString) -> StoreError {
    StoreError::Corrupt {
        table,
        detail: detail.to_string(),
    }
}

fn parse_uuid(table: &'static str, raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| corrupt(table, e))
}

fn parse_time(table: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(table, e))
}

struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    is_active: bool,
    date_joined: String,
}

impl UserRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            is_active: row.get(4)?,
            date_joined: row.get(5)?,
        })
    }

    fn into_user(self) -> Result<User, StoreError> {
        Ok(User {
            id: parse_uuid("users", &self.id)?,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_active: self.is_active,
            date_joined: parse_time("users", &self.date_joined)?,
        })
    }
}

struct ClientRow {
    id: String,
    schema_name: String,
    name: String,
    paid_until: String,
    on_trial: bool,
    owner_id: Option<String>,
    created_on: String,
}

impl ClientRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            schema_name: row.get(1)?,
            name: row.get(2)?,
            paid_until: row.get(3)?,
            on_trial: row.get(4)?,
            owner_id: row.get(5)?,
            created_on: row.get(6)?,
        })
    }

    fn into_client(self) -> Result<Client, StoreError> {
        Ok(Client {
            id: TenantId(parse_uuid("clients", &self.id)?),
            schema_name: SchemaName::parse(&self.schema_name).map_err(|e| corrupt("clients", e))?,
            name: self.name,
            paid_until: NaiveDate::parse_from_str(&self.paid_until, "%Y-%m-%d")
                .map_err(|e| corrupt("clients", e))?,
            on_trial: self.on_trial,
            owner_id: self
                .owner_id
                .as_deref()
                .map(|raw| parse_uuid("clients", raw))
                .transpose()?,
            created_on: parse_time("clients", &self.created_on)?,
        })
    }
}

struct DomainRow {
    id: String,
    domain: String,
    tenant_id: String,
    is_primary: bool,
}

impl DomainRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            domain: row.get(1)?,
            tenant_id: row.get(2)?,
            is_primary: row.get(3)?,
        })
    }

    fn into_domain(self) -> Result<Domain, StoreError> {
        Ok(Domain {
            id: parse_uuid("domains", &self.id)?,
            domain: self.domain,
            tenant_id: TenantId(parse_uuid("domains", &self.tenant_id)?),
            is_primary: self.is_primary,
        })
    }
}

struct PostRow {
    id: String,
    title: String,
    content: String,
    author_id: String,
    author_username: String,
    is_published: bool,
    created_at: String,
    updated_at: String,
}

impl PostRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            author_id: row.get(3)?,
            author_username: row.get(4)?,
            is_published: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_post(self) -> Result<Post, StoreError> {
        Ok(Post {
            id: parse_uuid("posts", &self.id)?,
            title: self.title,
            content: self.content,
            author_id: parse_uuid("posts", &self.author_id)?,
            author_username: self.author_username,
            is_published: self.is_published,
            created_at: parse_time("posts", &self.created_at)?,
            updated_at: parse_time("posts", &self.updated_at)?,
        })
    }
}

fn user_where(conn: &Connection, clause: &str, value: &str) -> Result<Option<User>, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
    conn.query_row(&sql, params![value], UserRow::read)
        .optional()?
        .map(UserRow::into_user)
        .transpose()
}

fn client_by_schema(conn: &Connection, schema: &SchemaName) -> Result<Option<Client>, StoreError> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE schema_name = ?1");
    conn.query_row(&sql, params![schema.as_str()], ClientRow::read)
        .optional()?
        .map(ClientRow::into_client)
        .transpose()
}

fn client_by_id(conn: &Connection, id: TenantId) -> Result<Option<Client>, StoreError> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], ClientRow::read)
        .optional()?
        .map(ClientRow::into_client)
        .transpose()
}

fn domain_by_name(conn: &Connection, name: &str) -> Result<Option<Domain>, StoreError> {
    let sql = format!("SELECT {DOMAIN_COLUMNS} FROM domains WHERE domain = ?1");
    conn.query_row(&sql, params![name], DomainRow::read)
        .optional()?
        .map(DomainRow::into_domain)
        .transpose()
}

fn insert_client(tx: &Transaction<'_>, client: &Client) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO clients (id, schema_name, name, paid_until, on_trial, owner_id, created_on)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            client.id.to_string(),
            client.schema_name.as_str(),
            client.name,
            client.paid_until.format("%Y-%m-%d").to_string(),
            client.on_trial,
            client.owner_id.map(|id| id.to_string()),
            timestamp(&client.created_on),
        ],
    )?;
    if !client.schema_name.is_public() {
        create_partition(tx, &client.schema_name)?;
    }
    Ok(())
}

fn create_partition(tx: &Transaction<'_>, schema: &SchemaName) -> Result<(), StoreError> {
    let table = posts_table(schema);
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            author_id TEXT NOT NULL,
            author_username TEXT NOT NULL,
            is_published INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"
    ))?;
    Ok(())
}

fn insert_domain(tx: &Transaction<'_>, domain: &Domain) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO domains (id, domain, tenant_id, is_primary) VALUES (?1, ?2, ?3, ?4)",
        params![
            domain.id.to_string(),
            domain.domain,
            domain.tenant_id.to_string(),
            domain.is_primary,
        ],
    )?;
    Ok(())
}

fn partition_exists(conn: &Connection, schema: &SchemaName) -> Result<bool, StoreError> {
    let name = format!("{}__posts", schema.as_str());
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn ensure_partition(conn: &Connection, schema: &SchemaName) -> Result<()> {
    if partition_exists(conn, schema).map_err(StoreError::into_anyhow)? {
        Ok(())
    } else {
        Err(missing_partition(schema))
    }
}

fn new_client(new: NewClient, owner_id: Option<Uuid>) -> Client {
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

#[async_trait]
impl Directory for SqliteStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        user_where(&conn, "lower(username) = lower(?1)", username.trim())
            .map_err(StoreError::into_anyhow)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        user_where(&conn, "lower(email) = lower(?1)", email.trim())
            .map_err(StoreError::into_anyhow)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        user_where(&conn, "id = ?1", &id.to_string()).map_err(StoreError::into_anyhow)
    }

    async fn provision(&self, request: Provisioning) -> Result<Provisioned> {
        let domain_name = normalize_host(&request.domain);
        let mut conn = self.lock().map_err(StoreError::into_anyhow)?;
        let tx = conn.transaction().map_err(|e| StoreError::from(e).into_anyhow())?;

        let conflict = (|| -> Result<Option<Conflict>, StoreError> {
            if user_where(&tx, "lower(username) = lower(?1)", &request.user.username)?.is_some() {
                return Ok(Some(Conflict::Username));
            }
            if user_where(&tx, "lower(email) = lower(?1)", &request.user.email)?.is_some() {
                return Ok(Some(Conflict::Email));
            }
            if client_by_schema(&tx, &request.client.schema_name)?.is_some() {
                return Ok(Some(Conflict::Schema(request.client.schema_name.to_string())));
            }
            if domain_by_name(&tx, &domain_name)?.is_some() {
                return Ok(Some(Conflict::Domain(domain_name.clone())));
            }
            Ok(None)
        })()
        .map_err(StoreError::into_anyhow)?;
        if let Some(conflict) = conflict {
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
        let client = new_client(request.client, Some(user.id));
        let domain = Domain {
            id: Uuid::new_v4(),
            domain: domain_name,
            tenant_id: client.id,
            is_primary: true,
        };

        (|| -> Result<(), StoreError> {
            tx.execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    user.id.to_string(),
                    user.username,
                    user.email,
                    user.password_hash,
                    user.is_active,
                    timestamp(&user.date_joined),
                ],
            )?;
            insert_client(&tx, &client)?;
            insert_domain(&tx, &domain)?;
            Ok(())
        })()
        .map_err(StoreError::into_anyhow)?;

        // dropping `tx` on any error above rolls everything back
        tx.commit().map_err(|e| StoreError::from(e).into_anyhow())?;

        Ok(Provisioned {
            user,
            client,
            domain,
        })
    }

    async fn get_or_create_client(&self, new: NewClient) -> Result<(Client, bool)> {
        let mut conn = self.lock().map_err(StoreError::into_anyhow)?;
        let tx = conn.transaction().map_err(|e| StoreError::from(e).into_anyhow())?;
        if let Some(existing) = client_by_schema(&tx, &new.schema_name).map_err(StoreError::into_anyhow)? {
            return Ok((existing, false));
        }
        let client = new_client(new, None);
        insert_client(&tx, &client).map_err(StoreError::into_anyhow)?;
        tx.commit().map_err(|e| StoreError::from(e).into_anyhow())?;
        Ok((client, true))
    }

    async fn get_or_create_domain(&self, new: NewDomain) -> Result<(Domain, bool)> {
        let name = normalize_host(&new.domain);
        let mut conn = self.lock().map_err(StoreError::into_anyhow)?;
        let tx = conn.transaction().map_err(|e| StoreError::from(e).into_anyhow())?;

        if let Some(existing) = domain_by_name(&tx, &name).map_err(StoreError::into_anyhow)? {
            if existing.tenant_id != new.tenant_id {
                return Err(EchoError::conflict(format!(
                    "Domain '{name}' belongs to another tenant"
                ))
                .into_anyhow());
            }
            return Ok((existing, false));
        }
        if client_by_id(&tx, new.tenant_id)
            .map_err(StoreError::into_anyhow)?
            .is_none()
        {
            return Err(EchoError::not_found(format!("No tenant {}", new.tenant_id)).into_anyhow());
        }

        let domain = Domain {
            id: Uuid::new_v4(),
            domain: name,
            tenant_id: new.tenant_id,
            is_primary: new.is_primary,
        };
        insert_domain(&tx, &domain).map_err(StoreError::into_anyhow)?;
        tx.commit().map_err(|e| StoreError::from(e).into_anyhow())?;
        Ok((domain, true))
    }

    async fn resolve_host(&self, host: &str) -> Result<Option<(Client, Domain)>> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        let Some(domain) = domain_by_name(&conn, host).map_err(StoreError::into_anyhow)? else {
            return Ok(None);
        };
        let client = client_by_id(&conn, domain.tenant_id).map_err(StoreError::into_anyhow)?;
        Ok(client.map(|client| (client, domain)))
    }

    async fn clients(&self) -> Result<Vec<Client>> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        (|| -> Result<Vec<Client>, StoreError> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_on"
            ))?;
            let rows = stmt.query_map([], ClientRow::read)?;
            rows.map(|row| row?.into_client()).collect()
        })()
        .map_err(StoreError::into_anyhow)
    }

    async fn domains_for(&self, tenant: TenantId) -> Result<Vec<Domain>> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        (|| -> Result<Vec<Domain>, StoreError> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOMAIN_COLUMNS} FROM domains WHERE tenant_id = ?1
                 ORDER BY is_primary DESC, domain"
            ))?;
            let rows = stmt.query_map(params![tenant.to_string()], DomainRow::read)?;
            rows.map(|row| row?.into_domain()).collect()
        })()
        .map_err(StoreError::into_anyhow)
    }
}

#[async_trait]
impl Partitions for SqliteStore {
    async fn has_partition(&self, schema: &SchemaName) -> Result<bool> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        partition_exists(&conn, schema).map_err(StoreError::into_anyhow)
    }

    async fn insert_post(&self, schema: &SchemaName, post: Post) -> Result<Post> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        ensure_partition(&conn, schema)?;
        conn.execute(
            &format!(
                "INSERT INTO {} ({POST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                posts_table(schema)
            ),
            params![
                post.id.to_string(),
                post.title,
                post.content,
                post.author_id.to_string(),
                post.author_username,
                post.is_published,
                timestamp(&post.created_at),
                timestamp(&post.updated_at),
            ],
        )
        .map_err(|e| StoreError::from(e).into_anyhow())?;
        Ok(post)
    }

    async fn find_posts(&self, schema: &SchemaName, query: &PostQuery) -> Result<Vec<Post>> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        ensure_partition(&conn, schema)?;
        (|| -> Result<Vec<Post>, StoreError> {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM {}
                 WHERE (?1 = 0 OR is_published = 1)
                   AND (?2 IS NULL OR lower(author_username) = lower(?2))
                 ORDER BY created_at DESC, rowid DESC",
                posts_table(schema)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![query.published_only, query.author.as_deref()],
                PostRow::read,
            )?;
            rows.map(|row| row?.into_post()).collect()
        })()
        .map_err(StoreError::into_anyhow)
    }

    async fn get_post(&self, schema: &SchemaName, id: Uuid) -> Result<Option<Post>> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        ensure_partition(&conn, schema)?;
        (|| -> Result<Option<Post>, StoreError> {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM {} WHERE id = ?1",
                posts_table(schema)
            );
            conn.query_row(&sql, params![id.to_string()], PostRow::read)
                .optional()?
                .map(PostRow::into_post)
                .transpose()
        })()
        .map_err(StoreError::into_anyhow)
    }

    async fn replace_post(&self, schema: &SchemaName, post: Post) -> Result<Post> {
        let conn = self.lock().map_err(StoreError::into_anyhow)?;
        ensure_partition(&conn, schema)?;
        let changed = conn
            .execute(
                &format!(
                    "UPDATE {} SET title = ?2, content = ?3, is_published = ?4, updated_at = ?5
                     WHERE id = ?1",
                    posts_table(schema)
                ),
                params![
                    post.id.to_string(),
                    post.title,
                    post.content,
                    post.is_published,
                    timestamp(&post.updated_at),
                ],
            )
            .map_err(|e| StoreError::from(e).into_anyhow())?;
        if changed == 0 {
            return Err(EchoError::not_found(format!("No post with id {}", post.id)).into_anyhow());
        }
        Ok(post)
    }

    async fn delete_post(&self, schema: &SchemaName, id: Uuid) -> Result<Option<Post>> {
        let mut conn = self.lock().map_err(StoreError::into_anyhow)?;
        ensure_partition(&conn, schema)?;
        (|| -> Result<Option<Post>, StoreError> {
            let tx = conn.transaction()?;
            let table = posts_table(schema);
            let existing = tx
                .query_row(
                    &format!("SELECT {POST_COLUMNS} FROM {table} WHERE id = ?1"),
                    params![id.to_string()],
                    PostRow::read,
                )
                .optional()?
                .map(PostRow::into_post)
                .transpose()?;
            if existing.is_some() {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE id = ?1"),
                    params![id.to_string()],
                )?;
            }
            tx.commit()?;
            Ok(existing)
        })()
        .map_err(StoreError::into_anyhow)
    }
}

#[cfg(test)]
mod tests {
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

    fn post(user: &User, title: &str, published: bool, at: DateTime<Utc>) -> Post {
        Post {
            id: Uuid::new_v4(),
            title: title.into(),
            content: "body".into(),
            author_id: user.id,
            author_username: user.username.clone(),
            is_published: published,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn provisioning_round_trips_through_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let out = store.provision(request("Alice", "alice@example.com")).await.unwrap();

        assert!(store.has_partition(&out.client.schema_name).await.unwrap());
        let (client, domain) = store.resolve_host("alice.localhost").await.unwrap().unwrap();
        assert_eq!(client, out.client);
        assert_eq!(domain, out.domain);

        let user = store.find_user("alice").await.unwrap().unwrap();
        assert_eq!(user.username, "Alice");
        assert_eq!(user.password_hash, "hash");
    }

    #[tokio::test]
    async fn failed_provisioning_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.provision(request("alice", "alice@example.com")).await.unwrap();

        let err = store.provision(request("Alice", "new@example.com")).await.unwrap_err();
        let echo = EchoError::from_anyhow(&err).unwrap();
        assert_eq!(echo.kind, ErrorKind::BadRequest);
        assert_eq!(echo.errors.as_ref().unwrap()["username"][0], "Username already exists.");

        assert!(store.find_user_by_email("new@example.com").await.unwrap().is_none());
        assert_eq!(store.clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_late_insert_failure_undoes_the_user_and_client() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_domains BEFORE INSERT ON domains
                 BEGIN SELECT RAISE(ABORT, 'domain rejected'); END;",
            )
            .unwrap();

        let request = request("alice", "alice@example.com");
        let schema = request.client.schema_name.clone();
        assert!(store.provision(request).await.is_err());

        assert!(store.find_user("alice").await.unwrap().is_none());
        assert!(store.find_user_by_email("alice@example.com").await.unwrap().is_none());
        assert!(store.clients().await.unwrap().is_empty());
        assert!(!store.has_partition(&schema).await.unwrap());
    }

    #[tokio::test]
    async fn posts_are_ordered_and_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let alice = store.provision(request("alice", "a@example.com")).await.unwrap();
        let bob = store.provision(request("bob", "b@example.com")).await.unwrap();
        let schema = &alice.client.schema_name;

        let t0 = Utc::now();
        let older = post(&alice.user, "older", true, t0 - chrono::Duration::seconds(10));
        let newer = post(&alice.user, "newer", true, t0);
        let draft = post(&alice.user, "draft", false, t0);
        for p in [older.clone(), newer.clone(), draft.clone()] {
            store.insert_post(schema, p).await.unwrap();
        }

        let published = PostQuery { published_only: true, author: None };
        let titles: Vec<String> = store
            .find_posts(schema, &published)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["newer", "older"]);

        let by_bob = PostQuery { published_only: true, author: Some("BOB".into()) };
        assert!(store.find_posts(schema, &by_bob).await.unwrap().is_empty());
        assert!(store
            .find_posts(&bob.client.schema_name, &published)
            .await
            .unwrap()
            .is_empty());

        let mut edited = newer.clone();
        edited.title = "edited".into();
        store.replace_post(schema, edited).await.unwrap();
        assert_eq!(
            store.get_post(schema, newer.id).await.unwrap().unwrap().title,
            "edited"
        );

        assert!(store.delete_post(schema, draft.id).await.unwrap().is_some());
        assert!(store.delete_post(schema, draft.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn public_client_gets_no_partition() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (public, created) = store
            .get_or_create_client(NewClient {
                schema_name: SchemaName::public(),
                name: "Public".into(),
                paid_until: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                on_trial: false,
            })
            .await
            .unwrap();
        assert!(created);
        assert!(!store.has_partition(&public.schema_name).await.unwrap());

        let err = store
            .find_posts(&public.schema_name, &PostQuery::default())
            .await
            .unwrap_err();
        assert_eq!(EchoError::kind_of(&err), Some(ErrorKind::NotFound));

        let (_, created) = store
            .get_or_create_domain(NewDomain {
                domain: "127.0.0.1".into(),
                tenant_id: public.id,
                is_primary: true,
            })
            .await
            .unwrap();
        assert!(created);
        assert_eq!(store.domains_for(public.id).await.unwrap().len(), 1);
    }
}
