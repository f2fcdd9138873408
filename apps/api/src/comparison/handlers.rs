//! Axum route handlers for the Comparison API.

use axum::{extract::State, Json};

use crate::comparison::models::{CompareRequest, ComparisonResult};
use crate::comparison::orchestrator;
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/v1/compare
///
/// Full comparison pipeline: validate → cache → enrich → generate →
/// merge → respond. Validation failures come back as 400 naming the
/// violated constraint; provider problems never surface here.
pub async fn handle_compare(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<ComparisonResult>, AppError> {
    let result = orchestrator::compare(
        &state.cache,
        &state.llm,
        state.market.as_ref(),
        request,
    )
    .await?;

    Ok(Json(result))
}
