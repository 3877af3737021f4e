use crate::cache::CacheService;
use crate::models::Event;
use redis::AsyncCommands;
use tracing::info;

const LISTING_TTL_SECONDS: u64 = 3600;
const EVENT_TTL_SECONDS: u64 = 3600;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Cache key for one page of the event listing.
pub fn list_cache_key(query: &str, page: u32, page_size: u32) -> String {
    format!("events:list:q={}&p={}&ps={}", query, page, page_size)
}

impl CacheService {
    // --- Event documents ---

    /// Single event, cache first, database on miss.
    pub async fn get_event(&self, event_id: i64) -> Result<Option<Event>, sqlx::Error> {
        if let Ok(Some(event)) = self.get_event_from_cache(event_id).await {
            return Ok(Some(event));
        }

        let event = Event::find_by_id(&self.db.pool, event_id).await?;
        if let Some(ref event) = event {
            let _ = self.save_event_to_cache(event).await;
        }
        Ok(event)
    }

    pub async fn invalidate_event(&self, event_id: i64) {
        let key = format!("event:{}", event_id);
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(&key).await;
        info!("Invalidated cache for event {}", event_id);
    }

    async fn get_event_from_cache(&self, event_id: i64) -> Result<Option<Event>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(format!("event:{}", event_id)).await?;
        Ok(data.and_then(|d| serde_json::from_str(&d).ok()))
    }

    async fn save_event_to_cache(&self, event: &Event) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(event).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(format!("event:{}", event.id), data, EVENT_TTL_SECONDS)
            .await
    }

    // --- Event listings ---

    /// Raw JSON for a cached listing page, if present.
    pub async fn get_cached_listing(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.get(key).await
    }

    pub async fn cache_listing(&self, key: &str, json: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key, json, LISTING_TTL_SECONDS).await
    }

    /// Drop every cached listing page. Called after any mutation that
    /// changes what a listing would show, bookings included.
    pub async fn invalidate_listings(&self) {
        let mut conn = self.redis.conn.clone();
        let keys: Vec<String> = match redis::cmd("KEYS")
            .arg("events:list:*")
            .query_async(&mut conn)
            .await
        {
            Ok(keys) => keys,
            Err(_) => return,
        };

        if !keys.is_empty() {
            let mut pipe = redis::pipe();
            for key in &keys {
                pipe.del(key);
            }
            let _: Result<(), _> = pipe.query_async(&mut conn).await;
            info!("Invalidated {} cached event listings", keys.len());
        }
    }

    // --- Warmup plumbing ---

    pub(super) async fn load_upcoming_events(&self) -> Result<Vec<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            "SELECT * FROM events
             WHERE starts_at > NOW()
             ORDER BY starts_at
             LIMIT $1",
        )
        .bind(DEFAULT_PAGE_SIZE as i64)
        .fetch_all(&self.db.pool)
        .await
    }

    pub(super) async fn cache_default_listing(
        &self,
        events: &[Event],
    ) -> Result<(), redis::RedisError> {
        let body = serde_json::to_string(&serde_json::json!({
            "events": events,
            "count": events.len(),
        }))
        .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error")))?;

        self.cache_listing(&list_cache_key("", 1, DEFAULT_PAGE_SIZE), &body)
            .await
    }
}
