pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use std::sync::Arc;
use tokio::task;

// Shared state for the whole application, passed to handlers via axum State
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub cache: cache::CacheService,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        let cache = cache::CacheService::new(redis, db.clone());
        let state = Arc::new(Self { db, cache, config });

        // Warmup runs in the background so startup is not gated on Redis
        let state_for_bg = state.clone();
        task::spawn(async move {
            state_for_bg.cache.warmup_cache().await;
        });

        Ok(state)
    }
}
