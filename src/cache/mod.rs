use crate::{database::Database, redis_client::RedisClient};
use tracing::{info, warn};

pub mod events;

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    db: Database,
}

impl CacheService {
    pub fn new(redis: RedisClient, db: Database) -> Self {
        Self { redis, db }
    }

    // Prime the default event listing at startup
    pub async fn warmup_cache(&self) {
        info!("Starting cache warmup...");

        match self.load_upcoming_events().await {
            Ok(events) => {
                info!("Loaded {} events", events.len());
                let _ = self.cache_default_listing(&events).await;
            }
            Err(e) => warn!("Cache warmup skipped: {:?}", e),
        }

        info!("Cache warmup done");
    }
}
