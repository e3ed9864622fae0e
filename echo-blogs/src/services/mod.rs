use std::sync::Arc;

use echo_core::{ConfigSnapshot, Partitions, ServiceHandle};

pub mod accounts;
pub mod posts;
pub mod tenants;

use posts::{PostsHandle, PostsService};

/// The posts service wired to the global and per-service hooks.
pub fn configure_posts(partitions: Arc<dyn Partitions>, config: ConfigSnapshot) -> PostsHandle {
    let service = Arc::new(PostsService::new(partitions.clone()));
    let handle = ServiceHandle::new("posts", service, config)
        .with_global_hooks(crate::hooks::global_hooks());
    posts::posts_shared::register_hooks(handle, partitions)
}
