mod api;
mod config;
mod content;
mod db;
mod error;
mod fallback;
mod local_store;
mod models;
mod progress;
mod quiz;
mod store;
mod streak;
mod unlock;

#[cfg(test)]
mod fixtures;

use std::sync::Arc;

use log::{info, warn};

use crate::api::{app_router, ApiState};
use crate::config::Config;
use crate::content::{ContentAccessor, ContentSource};
use crate::db::Db;
use crate::local_store::LocalStore;
use crate::store::ProgressStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    let source = ContentSource::from_location(&config.content)?;
    let content = Arc::new(ContentAccessor::new(source));
    // Warm the manifest cache; failures are retried on first request.
    let modules = content.modules().await;
    info!("serving {} modules from {}", modules.len(), config.content);

    let db = match Db::connect(&config.database_url).await {
        Ok(db) => Some(db),
        Err(e) => {
            warn!("database unavailable, progress is stored locally only: {:#}", e);
            None
        }
    };
    let local = LocalStore::new(config.fallback_dir.clone());
    info!("local fallback store at {}", local.dir().display());

    let state = ApiState {
        content,
        store: Arc::new(ProgressStore::new(db, local)),
        costs: config.unlock_costs,
    };

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("listening on {}", config.bind);
    axum::serve(listener, app_router(state)).await?;

    Ok(())
}
