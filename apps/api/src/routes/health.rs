use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
///
/// Liveness probe plus an operational snapshot: live cache size,
/// rate-limiter aggregates, and which external capabilities carry
/// credentials. Exempt from rate limiting.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pathfinder-api",
        "cache_size": state.cache.len(),
        "cache_ttl_secs": state.config.cache_ttl_secs,
        "rate_limiter": state.rate_limiter.stats(),
        "llm_configured": state.llm.is_configured(),
        "llm_provider": state.llm.provider_name(),
        "rapidapi_configured": state.market.is_configured(),
    }))
}
