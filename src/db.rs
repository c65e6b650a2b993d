use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Timeout for waiting on a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for health-check pings.
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

const MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Open a bounded connection pool and verify connectivity.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.connection_url())
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        "database connection established"
    );

    Ok(pool)
}

/// Connect with linear backoff. The database is often still starting when
/// the service comes up (docker-compose ordering), so retry a few times
/// before giving up.
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool> {
    let mut attempt = 1;

    loop {
        match connect(config).await {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                warn!(
                    attempt,
                    max_attempts = MAX_CONNECT_ATTEMPTS,
                    error = %e,
                    "failed to connect to database, retrying"
                );
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Apply any pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::error::Error::Internal(format!("migration failed: {}", e)))?;
    Ok(())
}

/// Check that the database is reachable within the ping deadline.
pub async fn ping(pool: &PgPool) -> bool {
    matches!(
        tokio::time::timeout(
            PING_TIMEOUT,
            sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool),
        )
        .await,
        Ok(Ok(_))
    )
}
