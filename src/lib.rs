pub mod config;
pub mod database;
pub mod redis_client;
pub mod models;
pub mod domain;
pub mod controllers;
pub mod middleware;
pub mod cache;
pub mod services;
pub mod search_client;
pub mod error;

use std::sync::Arc;
use tokio::task;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub search_client: search_client::SearchClient,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;
        tracing::info!("Database connected");

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        tracing::info!("Redis connected");

        let cache = cache::CacheService::new(redis.clone());
        let search_client = search_client::SearchClient::new(db.pool.clone());
        let state = Arc::new(Self {
            db,
            redis,
            cache,
            config,
            search_client,
        });

        let state_for_bg = state.clone();
        task::spawn(async move {
            // Прогрев кеша событий в фоне
            state_for_bg.cache.warmup_cache(&state_for_bg.search_client).await;
        });

        Ok(state)
    }
}
