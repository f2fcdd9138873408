//! Comparison orchestration — the full request lifecycle.
//!
//! Flow: validate → fingerprint → cache lookup →
//!       (hit: respond) | (miss: enrich ∥ prompt build → generate →
//!       merge → cache write → respond).
//!
//! Provider failures never reach the caller: a failed or unconfigured LLM
//! routes to deterministic fallback, a failed or unconfigured enrichment
//! fetch simply leaves the generated/fallback figures in place. Only
//! validation errors and internal invariant violations propagate.
//!
//! Concurrent requests with the same fingerprint may both miss and both
//! call the provider — there is deliberately no single-flight collapsing;
//! the cache write is last-merge-wins and both writes carry identical
//! content for identical inputs.

use std::time::Instant;

use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::comparison::fallback::{default_currency_for, deterministic_comparison};
use crate::comparison::models::{
    CompareRequest, ComparisonPayload, ComparisonResult, ResponseMeta,
};
use crate::enrichment::{MarketDataSource, MarketStats};
use crate::errors::AppError;
use crate::llm_client::prompts::{COMPARISON_PROMPT_TEMPLATE, COMPARISON_SYSTEM};
use crate::llm_client::{comparison_fingerprint, LlmClient};

const MAX_SCORES: usize = 50;
const MAX_TIMELINE_YEARS: u32 = 10;
const MAX_RESOLUTION_MONTHS: u32 = 120;

/// Runs one comparison end to end.
pub async fn compare(
    cache: &TtlCache,
    llm: &LlmClient,
    market: &dyn MarketDataSource,
    request: CompareRequest,
) -> Result<ComparisonResult, AppError> {
    let started = Instant::now();
    validate(&request)?;

    let fingerprint = comparison_fingerprint(
        &request.subject_a,
        &request.subject_b,
        &request.location,
        request.timeline_years,
        request.scores.iter().map(|s| (s.name.as_str(), s.score)),
    );

    if let Some(cached) = cache.get(&fingerprint) {
        let mut result: ComparisonResult = serde_json::from_value(cached)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt cache entry: {e}")))?;
        result.meta.cache_hit = true;
        result.meta.latency_ms = started.elapsed().as_millis() as u64;
        info!(
            "Comparison cache hit for '{}' vs '{}'",
            request.subject_a, request.subject_b
        );
        return Ok(result);
    }

    // Capability tags are part of the audit contract and are emitted on
    // the happy path too, not just on failure.
    let mut sources: Vec<String> = Vec::new();
    if !market.is_configured() {
        sources.push("missing-rapidapi".to_string());
    }
    if !llm.is_configured() {
        sources.push("missing-llm-key".to_string());
    }

    // Both enrichment fetches run concurrently; neither blocks the other
    // and either may fail without consequence beyond a missing override.
    let (stats_a, stats_b) = tokio::join!(
        market.fetch(&request.subject_a, &request.location),
        market.fetch(&request.subject_b, &request.location),
    );
    if stats_a.is_some() || stats_b.is_some() {
        sources.push("rapidapi".to_string());
    }

    let prompt = build_comparison_prompt(&request)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("prompt build failed: {e}")))?;
    let outcome = llm.generate(&prompt, COMPARISON_SYSTEM).await;

    // Any JSON object deserializes into the defaulted payload shape, so
    // the schema gate is the acceptance check, not deserialization.
    let generated = match outcome.parsed {
        Some(parsed) => match serde_json::from_value::<ComparisonPayload>(parsed) {
            Ok(payload) if payload_is_usable(&payload) => Some(payload),
            Ok(_) => {
                warn!("LLM reply was valid JSON but not a usable comparison payload");
                None
            }
            Err(e) => {
                warn!("LLM payload did not match the comparison schema: {e}");
                None
            }
        },
        None => {
            if let Some(detail) = &outcome.error_detail {
                info!("Generation unavailable ({detail}), using deterministic fallback");
            }
            None
        }
    };

    let (mut payload, model, tokens_used) = match generated {
        Some(payload) => {
            info!(
                "Generation succeeded via {} in {}ms (retried: {})",
                outcome.provider_name, outcome.latency_ms, outcome.retried
            );
            sources.push(format!("llm-{}", outcome.provider_name));
            if outcome.retried {
                sources.push("llm-retry".to_string());
            }
            (payload, llm.model_name().to_string(), outcome.tokens_used)
        }
        None => {
            sources.push("fallback-deterministic".to_string());
            (
                deterministic_comparison(&request),
                "deterministic-fallback".to_string(),
                None,
            )
        }
    };

    merge_enrichment(&mut payload, &stats_a, &stats_b, &request.location);

    let result = ComparisonResult {
        subject_a: request.subject_a.clone(),
        subject_b: request.subject_b.clone(),
        location: request.location.clone(),
        comparison: payload,
        meta: ResponseMeta {
            model,
            tokens_used,
            sources,
            cache_hit: false,
            latency_ms: started.elapsed().as_millis() as u64,
        },
    };

    // Write-through happens strictly after the merge so a concurrent
    // reader can never observe a half-merged result.
    let stored = serde_json::to_value(&result)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("result serialization failed: {e}")))?;
    cache.set(fingerprint, stored);

    info!(
        "Comparison computed for '{}' vs '{}' in {}ms (sources: {:?})",
        result.subject_a, result.subject_b, result.meta.latency_ms, result.meta.sources
    );
    Ok(result)
}

/// Rejects malformed input before anything else runs. Every rejection
/// names the violated constraint.
fn validate(request: &CompareRequest) -> Result<(), AppError> {
    if request.subject_a.trim().is_empty() {
        return Err(AppError::Validation("subject_a cannot be empty".to_string()));
    }
    if request.subject_b.trim().is_empty() {
        return Err(AppError::Validation("subject_b cannot be empty".to_string()));
    }
    if request.subject_a.trim().eq_ignore_ascii_case(request.subject_b.trim()) {
        return Err(AppError::Validation(
            "subject_a and subject_b must be different careers".to_string(),
        ));
    }
    if request.timeline_years == 0 || request.timeline_years > MAX_TIMELINE_YEARS {
        return Err(AppError::Validation(format!(
            "timeline_years must be between 1 and {MAX_TIMELINE_YEARS}"
        )));
    }
    if request.resolution_months == 0 || request.resolution_months > MAX_RESOLUTION_MONTHS {
        return Err(AppError::Validation(format!(
            "resolution_months must be between 1 and {MAX_RESOLUTION_MONTHS}"
        )));
    }
    if request.scores.is_empty() || request.scores.len() > MAX_SCORES {
        return Err(AppError::Validation(format!(
            "scores must contain between 1 and {MAX_SCORES} entries"
        )));
    }
    for skill in &request.scores {
        if skill.name.trim().is_empty() {
            return Err(AppError::Validation(
                "every score entry needs a non-empty name".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&skill.score) {
            return Err(AppError::Validation(format!(
                "score for '{}' must be between 0 and 100",
                skill.name
            )));
        }
    }
    Ok(())
}

/// A usable payload carries at least a trajectory and a sane confidence.
/// Empty-object replies satisfy the defaulted schema, so this is the gate
/// that keeps vacuous generations out of the response and the cache.
fn payload_is_usable(payload: &ComparisonPayload) -> bool {
    !payload.trajectory.is_empty() && payload.confidence > 0.0 && payload.confidence <= 1.0
}

/// Fills the comparison prompt template from the request.
fn build_comparison_prompt(request: &CompareRequest) -> Result<String, serde_json::Error> {
    let scores_json = serde_json::to_string_pretty(&request.scores)?;
    Ok(COMPARISON_PROMPT_TEMPLATE
        .replace("{subject_a}", &request.subject_a)
        .replace("{subject_b}", &request.subject_b)
        .replace("{location}", &request.location)
        .replace("{timeline_years}", &request.timeline_years.to_string())
        .replace("{resolution_months}", &request.resolution_months.to_string())
        .replace("{scores_json}", &scores_json))
}

/// Applies enrichment figures over the generated/fallback payload.
/// Enrichment is treated as ground truth: when a figure is present it
/// always wins. Currency precedence: enrichment, then payload, then the
/// regional default for the location.
fn merge_enrichment(
    payload: &mut ComparisonPayload,
    stats_a: &Option<MarketStats>,
    stats_b: &Option<MarketStats>,
    location: &str,
) {
    if let Some(stats) = stats_a {
        if stats.avg_salary.is_some() {
            payload.salary.career1 = stats.avg_salary;
        }
        if stats.demand_score.is_some() {
            payload.demand.career1 = stats.demand_score;
        }
    }
    if let Some(stats) = stats_b {
        if stats.avg_salary.is_some() {
            payload.salary.career2 = stats.avg_salary;
        }
        if stats.demand_score.is_some() {
            payload.demand.career2 = stats.demand_score;
        }
    }

    let enrichment_currency = stats_a
        .as_ref()
        .and_then(|s| s.currency.clone())
        .or_else(|| stats_b.as_ref().and_then(|s| s.currency.clone()));

    payload.salary.currency = enrichment_currency
        .or_else(|| payload.salary.currency.take())
        .or_else(|| Some(default_currency_for(location).to_string()));
}
