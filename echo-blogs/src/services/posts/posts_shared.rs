use std::sync::Arc;

use echo_core::{EchoError, Partitions, Post, ServiceHandle, ServiceMethod};
use uuid::Uuid;

use super::posts_hooks::{RequireAuthenticated, RequireAuthor, ValidatePostData};
use super::posts_schema::PostData;

pub fn not_found(id: &str) -> anyhow::Error {
    EchoError::not_found(format!("No post found for id '{id}'")).into_anyhow()
}

/// Ids that are not UUIDs cannot name a post.
pub fn parse_post_id(id: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|_| not_found(id))
}

pub fn register_hooks(
    posts: ServiceHandle<Post, PostData>,
    partitions: Arc<dyn Partitions>,
) -> ServiceHandle<Post, PostData> {
    use ServiceMethod::{Create, Patch, Remove, Update};

    posts.hooks(|h| {
        h.before_each(&[Create, Update, Patch, Remove], Arc::new(RequireAuthenticated));
        h.before_each(&[Update, Patch, Remove], Arc::new(RequireAuthor { partitions }));
        h.before_each(&[Create, Update, Patch], Arc::new(ValidatePostData));
    })
}
