use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use echo_core::{EchoError, EchoService, Params, Partitions, Post, Principal, TenantContext};
use uuid::Uuid;

use super::posts_schema::PostData;
use super::posts_shared::{not_found, parse_post_id};
use super::PostParams;

/// Blog posts of the active tenant's partition.
pub struct PostsService {
    pub partitions: Arc<dyn Partitions>,
}

impl PostsService {
    pub fn new(partitions: Arc<dyn Partitions>) -> Self {
        Self { partitions }
    }

    async fn load(&self, ctx: &TenantContext, id: &str) -> Result<Post> {
        let schema = ctx.blog_schema()?;
        let post_id = parse_post_id(id)?;
        self.partitions
            .get_post(schema, post_id)
            .await?
            .ok_or_else(|| not_found(id))
    }
}

fn author(params: &Params) -> Result<&Principal> {
    params.principal.as_ref().ok_or_else(|| {
        EchoError::not_authenticated("Authentication credentials were not provided.").into_anyhow()
    })
}

#[async_trait]
impl EchoService<Post, PostData> for PostsService {
    async fn find(&self, ctx: &TenantContext, params: &Params) -> Result<Vec<Post>> {
        let schema = ctx.blog_schema()?;
        let query = PostParams::from(params).into_query();
        self.partitions.find_posts(schema, &query).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: &Params) -> Result<Post> {
        let post = self.load(ctx, id).await?;
        if !post.is_visible_to(params.principal.as_ref()) {
            return Err(not_found(id));
        }
        Ok(post)
    }

    async fn create(&self, ctx: &TenantContext, data: PostData, params: &Params) -> Result<Post> {
        let schema = ctx.blog_schema()?;
        let author = author(params)?;
        let now = Utc::now();

        let post = Post {
            id: Uuid::new_v4(),
            title: data.title.unwrap_or_default(),
            content: data.content.unwrap_or_default(),
            author_id: author.user_id,
            author_username: author.username.clone(),
            is_published: data.is_published.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        self.partitions.insert_post(schema, post).await
    }

    async fn update(
        &self,
        ctx: &TenantContext,
        id: &str,
        data: PostData,
        _params: &Params,
    ) -> Result<Post> {
        let mut post = self.load(ctx, id).await?;
        post.title = data.title.unwrap_or_default();
        post.content = data.content.unwrap_or_default();
        if let Some(is_published) = data.is_published {
            post.is_published = is_published;
        }
        post.updated_at = Utc::now();
        self.partitions.replace_post(ctx.blog_schema()?, post).await
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: &str,
        data: PostData,
        _params: &Params,
    ) -> Result<Post> {
        let mut post = self.load(ctx, id).await?;
        if let Some(title) = data.title {
            post.title = title;
        }
        if let Some(content) = data.content {
            post.content = content;
        }
        if let Some(is_published) = data.is_published {
            post.is_published = is_published;
        }
        post.updated_at = Utc::now();
        self.partitions.replace_post(ctx.blog_schema()?, post).await
    }

    async fn remove(&self, ctx: &TenantContext, id: &str, _params: &Params) -> Result<Post> {
        let schema = ctx.blog_schema()?;
        let post_id = parse_post_id(id)?;
        self.partitions
            .delete_post(schema, post_id)
            .await?
            .ok_or_else(|| not_found(id))
    }
}
