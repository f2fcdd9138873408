pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::comparison::handlers;
use crate::rate_limit::rate_limit_middleware;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Comparison API
        .route("/api/v1/compare", post(handlers::handle_compare))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}
