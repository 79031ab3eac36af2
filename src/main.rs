use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use event_tickets::{
    AppState,
    config::Config,
    controllers,
    services::cleanup::CleanupService,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let database = state.db.ping().await;
    let redis = state.redis.ping().await;
    Json(json!({
        "status": if database && redis { "OK" } else { "DEGRADED" },
        "database": database,
        "redis": redis,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    if config.app.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Event Tickets API ({})", config.app.environment);

    // Подключения к БД и Redis, миграции, прогрев кеша
    let app_state = AppState::new(config.clone()).await?;

    // --- Фоновые задачи ---

    // Очистка листов ожидания прошедших событий и висящих холдов
    let cleanup = CleanupService::new(app_state.clone());
    let interval = Duration::from_secs(config.app.cleanup_interval_seconds.max(1));
    task::spawn(async move {
        loop {
            cleanup.run_full_cleanup().await;
            tokio::time::sleep(interval).await;
        }
    });

    // --- Веб-сервер ---

    let app = Router::new()
        .route("/", get(|| async { "Event Tickets API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes(&config.features))
        .with_state(app_state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
