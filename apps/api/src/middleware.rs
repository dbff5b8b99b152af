//! Bearer-auth guard for the Token API (`/api/v1/*`). The webhook and
//! health routes are mounted outside this layer — gateways don't carry our
//! bearer secret, and `/health`/`/ready` must stay reachable without one.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

pub async fn require_api_secret(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == state.config.api_secret => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
