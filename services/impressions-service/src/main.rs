mod app;
mod config;
mod db;
mod decode;
mod error;
mod handlers;
mod models;
mod state;

use std::sync::Arc;

use impressions_common::{bind_listener, init_tracing, shutdown_signal};

use crate::config::Config;
use crate::db::PgImpressionStore;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let _guards = init_tracing("impressions-service");

    let config = Config::from_env();
    if config.database_url.is_empty() {
        tracing::warn!("DATABASE_URL is not set, database calls will fail");
    }

    let store = PgImpressionStore::new(config.database_url.clone());
    let state = AppState::new(Arc::new(store), config.max_inflated_bytes);

    let app = app::build_router(state, config.max_body_bytes);
    let listener = bind_listener(config.port).await.expect("bind listener");
    tracing::info!(port = config.port, "impressions webhook listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}
