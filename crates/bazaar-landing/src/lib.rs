//! Bazaar Landing Service
//!
//! Server-side host for the payment confirmation landing page.

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use handlers::*;
pub use state::AppState;

/// Build the service router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Confirmation
        .route("/payment/confirm", get(confirm_payment))
        .route("/payment/confirm/:session_id", get(get_confirmation))
        .route("/payment/confirm/:session_id/retry", post(retry_confirmation))
        // Health
        .route("/api/health", get(health))
        .layer(cors)
        .with_state(state)
}
