pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/interview/start", post(handlers::handle_start))
        .route("/interview/chat", post(handlers::handle_chat))
        .route(
            "/interview/report/:session_id",
            get(handlers::handle_report),
        )
        .with_state(state)
}
