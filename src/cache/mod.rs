use crate::search_client::{EventPage, EventSearch, SearchClient};
use crate::redis_client::RedisClient;
use redis::AsyncCommands;
use tracing::{info, warn};

pub mod auth;
pub mod events;
pub mod holds;

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    // Прогрев кеша при старте: первая страница списка событий
    pub async fn warmup_cache(&self, search_client: &SearchClient) {
        info!("Starting cache warmup...");

        let mut conn = self.redis.conn.clone();
        let created: Result<bool, _> = conn.set_nx(events::VERSION_KEY, 0).await;
        if let Err(e) = created {
            warn!("Cache warmup skipped, redis unavailable: {:?}", e);
            return;
        }

        let search = EventSearch::new(None, None, None, None);
        let key = self.listing_key(&search.query, "", search.page, search.page_size).await;
        if self.get_cached_listing(&key).await.is_some() {
            info!("Cache warmup skipped, first page already cached");
            return;
        }

        let (events, total) = match search_client.search_events(&search).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Cache warmup could not read events: {:?}", e);
                return;
            }
        };
        let cached = events.len();
        match serde_json::to_string(&EventPage::new(events, total, &search)) {
            Ok(json) => {
                self.cache_listing(&key, &json).await;
                info!("Cache warmup done, {} of {} events on the first page", cached, total);
            }
            Err(e) => warn!("Cache warmup could not serialize events: {:?}", e),
        }
    }
}
