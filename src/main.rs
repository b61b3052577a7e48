//! Recipes API server
//!
//! Usage:
//!   cargo run --bin load_data -- --password <secret>   # create a user
//!   JWT_SECRET=... cargo run --bin recipes_api           # start server
//!
//! Settings come from flags, the environment, or a `.env` file; see `config.rs`.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use recipes_api::auth::{CredentialVerifier, TokenService};
use recipes_api::cache::{Cache, MemoryCache, RedisCache};
use recipes_api::config::Config;
use recipes_api::recipes::RecipeService;
use recipes_api::rest::{create_router, AppState};
use recipes_api::storage::Storage;
use recipes_api::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    let _log_guard = telemetry::init(&config)?;

    let signing_key = config.signing_key()?;

    let storage = Storage::open(&config.store_path, &config.store_database)?;
    tracing::info!(
        path = %config.store_path,
        database = %config.store_database,
        "opened document store"
    );

    let cache: Arc<dyn Cache> = match &config.cache_addr {
        Some(addr) => Arc::new(RedisCache::connect(addr).await?),
        None => {
            tracing::info!("CACHE_ADDR not set, using in-process listing cache");
            Arc::new(MemoryCache::new())
        }
    };

    let store = Arc::new(storage.clone());
    let state = AppState {
        recipes: RecipeService::new(store.clone(), cache),
        credentials: CredentialVerifier::new(store, config.bcrypt_cost)?,
        tokens: TokenService::new(signing_key, config.token_ttl()),
    };
    let app = create_router(state, config.request_timeout());

    let listener = TcpListener::bind(config.listen).await?;
    tracing::info!(addr = %config.listen, "recipes API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.flush().await?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
