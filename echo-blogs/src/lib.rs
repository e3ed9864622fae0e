mod app;
mod hooks;

pub mod api;
pub mod config;
pub mod services;
pub mod state;
pub mod web;

use anyhow::Result;
use echo_core::ConfigSnapshot;

pub use app::BlogApp;
pub use state::AppState;

pub fn build(config: ConfigSnapshot) -> Result<BlogApp> {
    app::blog_app(config)
}
