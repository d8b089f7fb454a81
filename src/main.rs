//! Reelindex server
//!
//! Wires up:
//! - Record store (Redis when configured, in-memory otherwise)
//! - Twelve Labs client for uploads, status lookups and search
//! - Polling of indexing jobs, resumed on startup
//! - HTTP API

use std::sync::Arc;

use reelindex::adapters::http::{router, AppState};
use reelindex::adapters::memory::InMemoryRecordStore;
use reelindex::adapters::redis::RedisRecordStore;
use reelindex::adapters::twelvelabs::TwelveLabsClient;
use reelindex::application::events::{spawn_logger, EventHub};
use reelindex::application::indexing::IndexingService;
use reelindex::application::search::SearchService;
use reelindex::config::Config;
use reelindex::ports::repository::RecordStore;
use reelindex::Poller;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // 1. Adapters
    let store: Arc<dyn RecordStore> = match &config.redis_url {
        Some(url) => match RedisRecordStore::new(url) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to Redis");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("REDIS_URL not set, records are kept in memory");
            Arc::new(InMemoryRecordStore::new())
        }
    };
    let client = Arc::new(TwelveLabsClient::new(&config.api_base_url, &config.api_key));

    // 2. Event System
    let event_hub = Arc::new(EventHub::new());
    spawn_logger(&event_hub);

    // 3. Application Services
    let poller = Poller::new(store.clone(), config.poll.clone());
    let indexing = Arc::new(IndexingService::new(
        client.clone(),
        client.clone(),
        store.clone(),
        poller,
        event_hub.clone(),
        &config.index_id,
    ));
    let search = Arc::new(SearchService::new(client, store, &config.index_id));

    // 4. Pick up videos that were still indexing when the server stopped
    if let Err(e) = indexing.resume_indexing().await {
        tracing::warn!(error = %e, "Failed to resume indexing");
    }

    // 5. HTTP Layer
    let app = router(AppState {
        indexing,
        search,
        upload_dir: config.upload_dir.clone(),
    });

    // 6. Start Server
    let listener =
        match tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "Failed to bind TCP listener");
                std::process::exit(1);
            }
        };
    tracing::info!("Listening at {}:{}", config.addr, config.port);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
