use anyhow::Result;
use djaas::config::Config;
use djaas::db;
use djaas::server::{AppState, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("djaas={},tower_http=debug", config.server.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        env = %config.server.env,
        port = config.server.port,
        "starting dad joke service"
    );

    let pool = db::connect_with_retry(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to database: {}", e))?;

    db::migrate(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {}", e))?;

    let state = AppState::new(config, pool);

    Server::new(state)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    Ok(())
}
