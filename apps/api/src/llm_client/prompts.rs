// All LLM prompt constants for the comparison pipeline.
// Templates use `{placeholder}` substitution; fill every slot before sending.

/// System prompt for career comparison — enforces JSON-only output.
pub const COMPARISON_SYSTEM: &str =
    "You are an expert career analyst comparing two career paths for a specific candidate. \
    Base your analysis on the candidate's skill scores and the given location and timeline. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Comparison prompt template.
/// Replace: {subject_a}, {subject_b}, {location}, {timeline_years},
///          {resolution_months}, {scores_json}
pub const COMPARISON_PROMPT_TEMPLATE: &str = r#"Compare these two career paths for a candidate with the skill profile below.

Career A: {subject_a}
Career B: {subject_b}
Location: {location}
Timeline: {timeline_years} years, projected over {resolution_months} points

CANDIDATE SKILL SCORES (0-100):
{scores_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "Two to three sentences comparing the paths for this candidate",
  "salary": {"career1": 120000, "career2": 110000, "currency": "USD"},
  "demand": {"career1": 0.8, "career2": 0.6},
  "skill_overlap": ["SQL", "communication"],
  "trajectory": [
    {"month": 1, "career1_score": 55.0, "career2_score": 52.0}
  ],
  "milestones": [
    {"month": 6, "action": "Complete a recognized certification for career A"}
  ],
  "confidence": 0.8
}

Rules:
- "salary" values are annual figures local to the given location.
- "demand" values are 0.0-1.0 market demand scores for that location.
- "trajectory" must contain exactly {resolution_months} points, scores 0-100,
  starting from the candidate's current proficiency and never decreasing.
- "milestones" must contain 3-5 concrete, skill-specific actions.
- "confidence" reflects how well the skill profile supports the analysis."#;

/// Appended to the original prompt on the single corrective retry after
/// the first reply failed to parse as JSON.
pub const RETRY_CORRECTION: &str = "\n\nIMPORTANT: Your previous reply was not valid JSON and \
    could not be parsed. Respond again with ONLY the JSON object described above — \
    no prose, no markdown fences, no trailing commentary.";
