use crate::cache::CacheService;
use redis::AsyncCommands;
use tracing::{debug, warn};

/// Счётчик версии списка событий. Ключи списков включают версию,
/// поэтому инкремент делает все старые страницы недостижимыми.
pub const VERSION_KEY: &str = "events:version";
pub const LISTING_TTL_SECONDS: u64 = 3600;

impl CacheService {
    async fn listing_version(&self) -> i64 {
        let mut conn = self.redis.conn.clone();
        conn.get::<_, Option<i64>>(VERSION_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or(0)
    }

    /// Ключ страницы списка событий для текущей версии
    pub async fn listing_key(&self, query: &str, date: &str, page: u32, page_size: u32) -> String {
        let version = self.listing_version().await;
        format!("events:v{version}:q={query}&date={date}&p={page}&ps={page_size}")
    }

    pub async fn get_cached_listing(&self, key: &str) -> Option<String> {
        let mut conn = self.redis.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to read cached listing {}: {:?}", key, e);
                None
            }
        }
    }

    pub async fn cache_listing(&self, key: &str, json: &str) {
        let mut conn = self.redis.conn.clone();
        let result: Result<(), _> = conn.set_ex(key, json, LISTING_TTL_SECONDS).await;
        if let Err(e) = result {
            warn!("Failed to cache listing {}: {:?}", key, e);
        }
    }

    /// Сбросить кеш после создания/изменения события или продажи мест
    pub async fn invalidate_events(&self) {
        let mut conn = self.redis.conn.clone();
        match conn.incr::<_, _, i64>(VERSION_KEY, 1).await {
            Ok(v) => debug!("Event listings invalidated, version {}", v),
            Err(e) => warn!("Failed to invalidate event listings: {:?}", e),
        }
    }
}
