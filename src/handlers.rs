use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::db;
use crate::error::{Error, Result};
use crate::filter::JokeFilter;
use crate::middleware::check_api_token;
use crate::models::{CreateJokeRequest, HealthResponse, TagsResponse};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct JokeParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
}

/// GET /api/v1/joke — one random joke, optionally filtered.
pub async fn get_joke(
    State(state): State<AppState>,
    Query(params): Query<JokeParams>,
) -> Result<impl IntoResponse> {
    let filter = JokeFilter::from_params(params.search, params.category, params.tags);
    let joke = state.service.random_joke(&filter).await?;
    Ok(Json(joke))
}

/// GET /api/v1/tags — every known tag name.
pub async fn get_tags(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let tags = state.service.all_tags().await?;
    Ok(Json(TagsResponse { tags }))
}

/// POST /api/v1/joke — store a new joke. Requires X-API-Token when the
/// server is configured with one.
pub async fn create_joke(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateJokeRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    check_api_token(&headers, &state.config.server)?;

    let Json(req) = payload.map_err(|_| Error::InvalidJson)?;
    req.validate().map_err(|_| Error::MissingFields)?;

    let joke = state
        .service
        .create_joke(&req.setup, &req.punchline, req.category.as_deref(), &req.tags)
        .await?;

    Ok((StatusCode::CREATED, Json(joke)))
}

/// GET /health — liveness plus a bounded database ping.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let connected = db::ping(&state.pool).await;

    let (http_status, status, database) = if connected {
        (StatusCode::OK, "healthy", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
    };

    let body = HealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    (http_status, Json(body))
}
