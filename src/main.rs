use anyhow::Result;
use axum::Router;
use std::sync::Arc;

mod config;
mod error;
mod logging;
mod routes;
mod services;
pub mod models;

use services::columns::ColumnDetector;
use services::word_store::WordStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;
    let store = WordStore::open(config.database_path.as_deref())?;

    // Build our application state
    let addr = config.bind_addr;
    let max_file_size = config.max_file_size;
    let state = Arc::new(AppState::new(config, store));

    let app = Router::new()
        .merge(routes::routes(max_file_size))
        .with_state(state);

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Application state
pub struct AppState {
    config: config::Config,
    store: WordStore,
    detector: ColumnDetector,
}

impl AppState {
    fn new(config: config::Config, store: WordStore) -> Self {
        Self {
            config,
            store,
            detector: ColumnDetector::new(),
        }
    }
}
