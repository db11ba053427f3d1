use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;

/// Token check ahead of every handler. Runs before any model call, so an
/// unauthenticated request never starts a stream.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let token = match &state.api_token {
        Some(token) => token,
        // No token configured: open access is only safe on loopback.
        None => {
            let is_loopback = state.api_host == "127.0.0.1"
                || state.api_host == "::1"
                || state.api_host == "localhost";
            if is_loopback {
                return next.run(req).await;
            }
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "No API token configured. Set INNKEEPER_API_TOKEN before exposing on a non-loopback address."
                })),
            )
                .into_response();
        }
    };

    let presented = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .or_else(|| {
            req.headers()
                .get("x-innkeeper-internal-token")
                .and_then(|v| v.to_str().ok())
        });

    match presented {
        Some(p) if p == token => next.run(req).await,
        Some(_) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid API token" })),
        )
            .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Missing or invalid Authorization header. Use: Bearer <token>"
            })),
        )
            .into_response(),
    }
}
