pub mod api;
pub mod auth;
pub mod composition;
pub mod config;
pub mod error;
pub mod models;
pub mod packs;
pub mod paragraphs;
pub mod passages;
pub mod questions;
pub mod storage;
pub mod validation;

#[cfg(test)]
mod tests;

use tracing_subscriber::EnvFilter;

pub use api::{router, AppState};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use storage::ContentStore;

const DEFAULT_LOG_FILTER: &str = "reading_content=info,tower_http=info";

/// Installs the global subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub async fn run() -> AppResult<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(data_dir = ?config.data_dir, bind_addr = %config.bind_addr, "configuration loaded");
    api::serve(config).await
}
