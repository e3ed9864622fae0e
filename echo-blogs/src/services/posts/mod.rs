pub mod post_params;
pub mod posts_hooks;
pub mod posts_schema;
pub mod posts_service;
pub mod posts_shared;

pub use post_params::PostParams;
pub use posts_schema::PostData;
pub use posts_service::PostsService;

pub type PostsHandle = echo_core::ServiceHandle<echo_core::Post, PostData>;
