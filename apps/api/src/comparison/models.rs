//! Data model for the comparison pipeline.
//!
//! `ComparisonPayload` is the merged structured body — generation output,
//! enrichment figures, and fallback synthesis all funnel into this one
//! shape. A stored result is written to the cache exactly once after the
//! merge completes and is served read-only afterwards; only the `meta`
//! fields that describe the serving request (`cache_hit`, `latency_ms`)
//! are recomputed per response.

use serde::{Deserialize, Serialize};

/// A single named skill score from the caller, 0-100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillScore {
    pub name: String,
    pub score: f64,
}

/// Inbound comparison request.
#[derive(Debug, Clone, Deserialize)]
pub struct CompareRequest {
    pub subject_a: String,
    pub subject_b: String,
    pub location: String,
    pub timeline_years: u32,
    /// Number of trajectory sample points across the timeline.
    pub resolution_months: u32,
    pub scores: Vec<SkillScore>,
}

/// Annual salary figures per career. `career1` maps to `subject_a`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalaryComparison {
    #[serde(default)]
    pub career1: Option<f64>,
    #[serde(default)]
    pub career2: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Market demand scores per career, 0.0-1.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemandComparison {
    #[serde(default)]
    pub career1: Option<f64>,
    #[serde(default)]
    pub career2: Option<f64>,
}

/// One sampled point on the projected proficiency curves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub month: u32,
    pub career1_score: f64,
    pub career2_score: f64,
}

/// A concrete action pinned to a month on the timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub month: u32,
    pub action: String,
}

/// The structured comparison body. Every field is defaulted so that a
/// generation reply matching only part of the schema still deserializes;
/// the orchestrator separately rejects replies too hollow to serve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonPayload {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub salary: SalaryComparison,
    #[serde(default)]
    pub demand: DemandComparison,
    #[serde(default)]
    pub skill_overlap: Vec<String>,
    #[serde(default)]
    pub trajectory: Vec<TrajectoryPoint>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub confidence: f64,
}

/// Provenance and serving metadata attached to every response.
///
/// `sources` is an append-only audit trail in execution order; it must
/// never assert a subsystem that did not actually run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub model: String,
    pub tokens_used: Option<u32>,
    pub sources: Vec<String>,
    pub cache_hit: bool,
    pub latency_ms: u64,
}

/// Full response envelope for one comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub subject_a: String,
    pub subject_b: String,
    pub location: String,
    pub comparison: ComparisonPayload,
    pub meta: ResponseMeta,
}
