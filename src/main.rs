use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog_api::{
    config::Config,
    db::{create_pool, PgTitleStore},
    routes::{create_router, AppState},
    services::CatalogService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("catalog_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    let store = Arc::new(PgTitleStore::new(pool));

    let catalog = CatalogService::new(store, config.select_max_retries);
    tracing::info!(
        store = catalog.store_name(),
        max_retries = config.select_max_retries,
        feed_layout = ?config.feed_layout,
        "Catalog service ready"
    );

    let state = Arc::new(AppState::new(catalog, config.home_feed()));
    let app = create_router(state);

    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(address = %address, "Server running");

    axum::serve(listener, app).await?;

    Ok(())
}
