use std::any::Any;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::config::ServerConfig;
use crate::error::Error;
use crate::models::ErrorResponse;
use crate::server::AppState;

/// Per-IP rate limiting. Disabled entirely in development (wired up in
/// `server::create_app`). Successful requests carry the limit headers too so
/// clients can pace themselves.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    let allowed = match state.rate_limiter.check(&ip) {
        Ok(allowed) => allowed,
        Err(e) => return e.into_response(),
    };

    let limit = state.rate_limiter.requests().to_string();
    let window = format!("{}s", state.rate_limiter.window().as_secs());

    if !allowed {
        let mut response = Error::RateLimited.into_response();
        set_rate_limit_headers(response.headers_mut(), &limit, &window);
        response
            .headers_mut()
            .insert("Retry-After", HeaderValue::from_static("60"));
        return response;
    }

    let mut response = next.run(request).await;
    set_rate_limit_headers(response.headers_mut(), &limit, &window);
    response
}

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: &str, window: &str) {
    if let Ok(value) = HeaderValue::from_str(limit) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(window) {
        headers.insert("X-RateLimit-Window", value);
    }
}

/// Resolve the client IP: first X-Forwarded-For entry, then X-Real-IP, then
/// the socket peer address.
pub fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let trimmed = first_ip.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.trim().to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        addr.ip().to_string()
    } else {
        "unknown".to_string()
    }
}

/// Security headers applied to every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-XSS-Protection", HeaderValue::from_static("1; mode=block"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; \
             img-src 'self' data:; font-src 'self'; connect-src 'self'; \
             frame-ancestors 'none'; base-uri 'self'; form-action 'self'",
        ),
    );

    response
}

/// Check the X-API-Token header against the configured token. A no-op when
/// no token is configured.
pub fn check_api_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), Error> {
    let Some(expected) = &config.api_token else {
        return Ok(());
    };

    match headers.get("x-api-token").and_then(|v| v.to_str().ok()) {
        Some(token) if token == expected => Ok(()),
        _ => Err(Error::Unauthorized),
    }
}

/// Convert a caught panic into the generic 500 envelope. Wired through
/// tower-http's CatchPanicLayer so a panicking handler never takes down the
/// process.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(panic = %detail, "panic recovered in request handler");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal_error".to_string(),
            message: "An internal error occurred".to_string(),
        }),
    )
        .into_response()
}
