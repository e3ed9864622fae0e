use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use echo_core::validation::{self, REQUIRED};
use echo_core::{BeforeHook, EchoError, FieldErrors, HookContext, Partitions, Post, ServiceMethod};

use super::posts_schema::PostData;
use super::posts_shared::{not_found, parse_post_id};

const INVALID_POST: &str = "Invalid post data";

/// External writes need an identity.
pub struct RequireAuthenticated;

#[async_trait]
impl BeforeHook<Post, PostData> for RequireAuthenticated {
    async fn run(&self, ctx: &mut HookContext<Post, PostData>) -> Result<()> {
        if ctx.params.is_external() && ctx.params.principal.is_none() {
            return Err(EchoError::not_authenticated(
                "Authentication credentials were not provided.",
            )
            .into_anyhow());
        }
        Ok(())
    }
}

/// Only the stored author may change or delete a post.
pub struct RequireAuthor {
    pub partitions: Arc<dyn Partitions>,
}

#[async_trait]
impl BeforeHook<Post, PostData> for RequireAuthor {
    async fn run(&self, ctx: &mut HookContext<Post, PostData>) -> Result<()> {
        if !ctx.params.is_external() {
            return Ok(());
        }

        let id = ctx.id.clone().unwrap_or_default();
        let schema = ctx.tenant.blog_schema()?;
        let post = self
            .partitions
            .get_post(schema, parse_post_id(&id)?)
            .await?
            .ok_or_else(|| not_found(&id))?;

        let allowed = ctx
            .params
            .principal
            .as_ref()
            .is_some_and(|p| post.is_authored_by(p));
        if !allowed {
            return Err(EchoError::forbidden(
                "You do not have permission to perform this action.",
            )
            .into_anyhow());
        }
        Ok(())
    }
}

/// create/update need title and content; patch only what it sends.
pub struct ValidatePostData;

#[async_trait]
impl BeforeHook<Post, PostData> for ValidatePostData {
    async fn run(&self, ctx: &mut HookContext<Post, PostData>) -> Result<()> {
        let Some(data) = ctx.data.as_mut() else {
            return Err(EchoError::bad_request("Request body is required").into_anyhow());
        };

        let full = matches!(ctx.method, ServiceMethod::Create | ServiceMethod::Update);
        let mut errors = FieldErrors::default();
        for (field, value) in [("title", &data.title), ("content", &data.content)] {
            match value {
                Some(v) if v.trim().is_empty() => errors.push(field, "This field may not be blank."),
                None if full => errors.push(field, REQUIRED),
                _ => {}
            }
        }
        if !errors.is_empty() {
            return Err(errors.into_bad_request(INVALID_POST));
        }

        if let Some(title) = data.title.as_mut() {
            *title = title.trim().to_string();
        }
        validation::validate(&*data, INVALID_POST)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use echo_core::models::{NewClient, NewUser, Provisioning};
    use echo_core::store::MemoryStore;
    use echo_core::{
        ConfigSnapshot, Directory, ErrorKind, Params, Principal, SchemaName, TenantContext,
        TenantId,
    };
    use uuid::Uuid;

    use super::*;

    fn ctx(method: ServiceMethod, params: Params) -> HookContext<Post, PostData> {
        let tenant = TenantContext::new(
            TenantId::new(),
            SchemaName::parse("alice").unwrap(),
            "alice.localhost",
        );
        HookContext::new(tenant, "posts", method, params, ConfigSnapshot::default())
    }

    fn principal(name: &str) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: name.into(),
        }
    }

    #[tokio::test]
    async fn anonymous_external_writes_are_refused() {
        let mut c = ctx(ServiceMethod::Create, Params::external("rest", None, Default::default()));
        let err = RequireAuthenticated.run(&mut c).await.unwrap_err();
        assert_eq!(EchoError::kind_of(&err), Some(ErrorKind::NotAuthenticated));

        let mut c = ctx(ServiceMethod::Create, Params::internal());
        assert!(RequireAuthenticated.run(&mut c).await.is_ok());
    }

    #[tokio::test]
    async fn create_needs_title_and_content() {
        let mut c = ctx(ServiceMethod::Create, Params::internal())
            .with_data(PostData::new("  ", ""));
        c.data.as_mut().unwrap().content = None;
        let err = ValidatePostData.run(&mut c).await.unwrap_err();
        let e = EchoError::from_anyhow(&err).unwrap();
        assert_eq!(e.kind, ErrorKind::BadRequest);
        let errors = e.errors.clone().unwrap();
        assert_eq!(errors["title"][0], "This field may not be blank.");
        assert_eq!(errors["content"][0], REQUIRED);
    }

    #[tokio::test]
    async fn patch_accepts_partial_data_but_not_long_titles() {
        let mut c = ctx(ServiceMethod::Patch, Params::internal()).with_data(PostData {
            is_published: Some(false),
            ..Default::default()
        });
        assert!(ValidatePostData.run(&mut c).await.is_ok());

        let mut c = ctx(ServiceMethod::Patch, Params::internal()).with_data(PostData {
            title: Some("x".repeat(201)),
            ..Default::default()
        });
        let err = ValidatePostData.run(&mut c).await.unwrap_err();
        let e = EchoError::from_anyhow(&err).unwrap();
        assert!(e.errors.as_ref().unwrap().get("title").is_some());
    }

    #[tokio::test]
    async fn only_the_author_passes() {
        let store = Arc::new(MemoryStore::new());
        let schema = SchemaName::parse("alice").unwrap();
        let out = store
            .provision(Provisioning {
                user: NewUser {
                    username: "alice".into(),
                    email: "alice@example.com".into(),
                    password_hash: "x".into(),
                },
                client: NewClient {
                    schema_name: schema.clone(),
                    name: "alice".into(),
                    paid_until: Utc::now().date_naive(),
                    on_trial: true,
                },
                domain: "alice.localhost".into(),
            })
            .await
            .unwrap();

        let alice = Principal::from(&out.user);
        let now = Utc::now();
        let post = store
            .insert_post(
                &schema,
                Post {
                    id: Uuid::new_v4(),
                    title: "t".into(),
                    content: "c".into(),
                    author_id: alice.user_id,
                    author_username: alice.username.clone(),
                    is_published: true,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await
            .unwrap();

        let hook = RequireAuthor { partitions: store };

        let params = Params::external("rest", Some(principal("bob")), Default::default());
        let mut c = ctx(ServiceMethod::Remove, params).with_id(post.id.to_string());
        let err = hook.run(&mut c).await.unwrap_err();
        assert_eq!(EchoError::kind_of(&err), Some(ErrorKind::Forbidden));

        let params = Params::external("rest", Some(alice), Default::default());
        let mut c = ctx(ServiceMethod::Remove, params).with_id(post.id.to_string());
        assert!(hook.run(&mut c).await.is_ok());

        let params = Params::external("rest", Some(principal("bob")), Default::default());
        let mut c = ctx(ServiceMethod::Remove, params).with_id(Uuid::new_v4().to_string());
        let err = hook.run(&mut c).await.unwrap_err();
        assert_eq!(EchoError::kind_of(&err), Some(ErrorKind::NotFound));
    }
}
