use std::sync::Arc;

use anyhow::Context;
use common_auth::TokenService;
use store_service::payment::MockGateway;
use store_service::store::{MemoryStore, PgStore};
use store_service::{build_router, load_store_config, AppState, StoreMetrics};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_store_config()?;
    let tokens = Arc::new(TokenService::new(config.jwt_config()).context("Failed to build token service")?);
    let payments = Arc::new(MockGateway::new(
        config.payment_api_key.clone(),
        config.payment_provider.clone(),
    ));
    if config.payment_api_key.is_none() {
        warn!("PAYMENT_API_KEY is not set; payments will be rejected");
    }
    let metrics = StoreMetrics::new()?;

    let state = match config.database_url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .await
                .context("Failed to connect to DATABASE_URL")?;
            store.migrate().await.context("Failed to run migrations")?;
            info!("using postgres store");
            AppState::new(Arc::new(store), tokens, payments, metrics)
        }
        None => {
            warn!("DATABASE_URL is not set; using in-memory store, data is lost on restart");
            AppState::new(Arc::new(MemoryStore::new()), tokens, payments, metrics)
        }
    };

    let app = build_router(state, &config.cors_allowed_origins);
    let addr = config.bind_addr();
    info!(%addr, "starting store-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
