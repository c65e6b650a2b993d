use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{middleware as axum_middleware, Router};
use sqlx::PgPool;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::handlers;
use crate::middleware;
use crate::rate_limit::RateLimiter;
use crate::service::JokeService;

/// How often the background sweep drops idle rate-limit buckets.
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// How long in-flight requests get to finish after a shutdown signal before
/// the server is force-closed.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub service: JokeService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.requests,
            config.rate_limit.window,
            config.rate_limit.max_tracked_ips,
        ));

        Self {
            config: Arc::new(config),
            service: JokeService::new(pool.clone()),
            pool,
            rate_limiter,
        }
    }
}

/// Assemble the router: API routes, health check, static file fallback, and
/// the middleware stack. Rate limiting is skipped in development.
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/joke", get(handlers::get_joke).post(handlers::create_joke))
        .route("/tags", get(handlers::get_tags));

    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .fallback_service(ServeDir::new("public"));

    if state.config.is_development() {
        info!("rate limiting disabled (development mode)");
    } else {
        info!(
            requests = state.config.rate_limit.requests,
            window_secs = state.config.rate_limit.window.as_secs(),
            "rate limiting enabled"
        );
        app = app.layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(middleware::handle_panic))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(axum_middleware::from_fn(middleware::security_headers)),
    )
    .with_state(state)
}

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn run(self) -> Result<()> {
        let port = self.state.config.server.port;
        let rate_limiter = self.state.rate_limiter.clone();
        let app = create_app(self.state);

        // Periodically drop rate-limit buckets for clients that went quiet.
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                if let Ok(evicted) = rate_limiter.evict_idle() {
                    if evicted > 0 {
                        info!(evicted, "evicted idle rate-limit buckets");
                    }
                }
            }
        });

        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
            .await
            .map_err(|e| crate::error::Error::Internal(format!("failed to bind port: {}", e)))?;

        info!(port, "server starting");

        // Broadcast the shutdown signal so we can both stop accepting
        // connections and enforce the grace period on in-flight requests.
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        let mut graceful_rx = shutdown_rx.clone();
        let serve = async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = graceful_rx.wait_for(|stop| *stop).await;
            })
            .await
        };

        let mut deadline_rx = shutdown_rx;
        let grace_expired = async move {
            let _ = deadline_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
        };

        tokio::select! {
            result = serve => {
                result.map_err(|e| {
                    crate::error::Error::Internal(format!("server error: {}", e))
                })?;
            }
            _ = grace_expired => {
                warn!(
                    grace_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
                    "grace period expired with requests still in flight, forcing shutdown"
                );
            }
        }

        info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("received terminate signal, initiating graceful shutdown");
        },
    }
}
