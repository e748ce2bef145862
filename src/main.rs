use std::sync::Arc;

use istithmar::{app, config::Config, db, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("istithmar=info,tower_http=info")),
        )
        .init();

    let config = Arc::new(Config::load()?);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await?;
    db::init(&db_pool).await?;

    let state = AppState {
        db_pool,
        config: config.clone(),
        events: broadcast::channel(256).0,
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;

    Ok(())
}
