//! The credit-core HTTP edge: webhook intake, the Token API, health
//! probes, and the background scheduler, composed over one [`AppState`].

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod scheduler;
pub mod services;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full router. The Token API is the only surface behind the
/// bearer-auth layer — webhooks carry the gateway's own signature instead
/// of our secret, and health/ready must stay reachable by an orchestrator
/// that has neither.
pub fn build_router(state: AppState) -> Router {
    let token_api = Router::new()
        .route("/users/:user_id/balance", get(handlers::token_api::get_balance))
        .route("/users/:user_id/spend", post(handlers::token_api::spend))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::require_api_secret));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/webhook/:provider", post(handlers::webhook::handle_webhook))
        .nest("/api/v1", token_api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
