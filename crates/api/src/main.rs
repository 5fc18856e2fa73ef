//! Deskhub API server entrypoint

use deskhub_api::{routes, sla, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("deskhub_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool =
        deskhub_shared::db::create_pool(&config.database_url, config.database_max_connections)
            .await?;
    deskhub_shared::db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let state = AppState::new(pool, config);

    // Independent fixed-interval sweep; shares the process so monitor-driven
    // transitions reach live feed subscribers.
    tokio::spawn(sla::run_sweeper(state.clone()));

    let app = routes::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&state.config.bind_address).await?;
    tracing::info!(addr = %state.config.bind_address, "Deskhub API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
