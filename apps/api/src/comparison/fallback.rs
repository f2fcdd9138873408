//! Deterministic fallback synthesis — network-free comparison results.
//!
//! Used when no LLM credential is configured or the generation path fails
//! outright. Everything here is pure arithmetic over the request inputs:
//! identical inputs always produce byte-identical results. Confidence is
//! pinned to a fixed constant below anything generation would report, so
//! downstream consumers can tell the paths apart.

use crate::comparison::models::{
    CompareRequest, ComparisonPayload, DemandComparison, Milestone, SalaryComparison,
    TrajectoryPoint,
};

/// Fixed confidence for synthesized results. Deliberately below the
/// 0.5-1.0 range generation replies land in.
pub const FALLBACK_CONFIDENCE: f64 = 0.35;

/// Proficiency projections never exceed this ceiling.
const PROFICIENCY_CEILING: f64 = 95.0;

/// The secondary career track grows at this fraction of the primary slope.
const SECONDARY_SLOPE: f64 = 0.7;

/// Top-N scores feeding the starting-proficiency mean.
const TOP_SKILLS: usize = 3;

const MILESTONE_ACTIONS: [&str; 4] = [
    "Complete a recognized certification in your strongest skill area",
    "Ship a portfolio project demonstrating applied skills in the target role",
    "Take on a cross-functional responsibility that mirrors the target role",
    "Start interviewing for target-level positions and iterate on feedback",
];

/// Synthesizes a full comparison payload from the request alone.
pub fn deterministic_comparison(request: &CompareRequest) -> ComparisonPayload {
    let start = starting_proficiency(request);
    let total_months = request.timeline_years * 12;
    let points = request.resolution_months.max(1);

    let trajectory = (1..=points)
        .map(|i| {
            let fraction = f64::from(i) / f64::from(points);
            TrajectoryPoint {
                month: ((u64::from(i) * u64::from(total_months)) / u64::from(points)) as u32,
                career1_score: project(start, fraction, 1.0),
                career2_score: project(start, fraction, SECONDARY_SLOPE),
            }
        })
        .collect();

    let milestones = MILESTONE_ACTIONS
        .iter()
        .enumerate()
        .map(|(i, action)| Milestone {
            month: (u64::from(total_months) * (i as u64 + 1) / MILESTONE_ACTIONS.len() as u64)
                .max(1) as u32,
            action: (*action).to_string(),
        })
        .collect();

    let salary_base = estimated_salary(start);

    ComparisonPayload {
        summary: format!(
            "Deterministic projection comparing {} and {} over {} years from a starting \
             proficiency of {:.1}. Figures are synthesized from the skill profile alone.",
            request.subject_a, request.subject_b, request.timeline_years, start
        ),
        salary: SalaryComparison {
            career1: Some(salary_base),
            career2: Some((salary_base * 0.95 * 100.0).round() / 100.0),
            currency: Some(default_currency_for(&request.location).to_string()),
        },
        demand: DemandComparison {
            career1: Some(estimated_demand(start)),
            career2: Some((estimated_demand(start) * 0.9 * 100.0).round() / 100.0),
        },
        skill_overlap: top_skill_names(request),
        trajectory,
        milestones,
        confidence: FALLBACK_CONFIDENCE,
    }
}

/// Mean of the top-3 highest scores (all of them when fewer than 3).
/// Zero when the score list is empty — validation upstream prevents that
/// for real requests.
fn starting_proficiency(request: &CompareRequest) -> f64 {
    let mut scores: Vec<f64> = request.scores.iter().map(|s| s.score).collect();
    scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    scores.truncate(TOP_SKILLS);
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Linear projection from `start` toward the ceiling, scaled by `slope`.
fn project(start: f64, fraction: f64, slope: f64) -> f64 {
    let projected = start + (PROFICIENCY_CEILING - start) * fraction * slope;
    (projected.min(PROFICIENCY_CEILING) * 10.0).round() / 10.0
}

fn estimated_salary(proficiency: f64) -> f64 {
    40_000.0 + proficiency * 800.0
}

fn estimated_demand(proficiency: f64) -> f64 {
    let demand = proficiency / 100.0 * 0.8;
    ((demand.clamp(0.2, 0.9)) * 100.0).round() / 100.0
}

fn top_skill_names(request: &CompareRequest) -> Vec<String> {
    let mut ranked: Vec<&crate::comparison::models::SkillScore> = request.scores.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
        .into_iter()
        .take(TOP_SKILLS)
        .map(|s| s.name.clone())
        .collect()
}

/// Regional currency default inferred from the location string. Used only
/// when neither enrichment nor generation supplied a currency.
pub fn default_currency_for(location: &str) -> &'static str {
    let location = location.to_lowercase();
    if ["india", "bangalore", "bengaluru", "mumbai", "delhi", "pune", "hyderabad", "chennai"]
        .iter()
        .any(|hint| location.contains(hint))
    {
        "INR"
    } else if ["united kingdom", "uk", "london", "manchester"]
        .iter()
        .any(|hint| location.contains(hint))
    {
        "GBP"
    } else if ["germany", "france", "berlin", "paris", "amsterdam", "netherlands"]
        .iter()
        .any(|hint| location.contains(hint))
    {
        "EUR"
    } else {
        "USD"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::models::SkillScore;

    fn request() -> CompareRequest {
        CompareRequest {
            subject_a: "Data Scientist".to_string(),
            subject_b: "Product Manager".to_string(),
            location: "Bangalore".to_string(),
            timeline_years: 2,
            resolution_months: 24,
            scores: vec![
                SkillScore {
                    name: "SQL".to_string(),
                    score: 80.0,
                },
                SkillScore {
                    name: "Python".to_string(),
                    score: 60.0,
                },
            ],
        }
    }

    #[test]
    fn test_fallback_is_byte_identical_for_identical_inputs() {
        let a = serde_json::to_vec(&deterministic_comparison(&request())).unwrap();
        let b = serde_json::to_vec(&deterministic_comparison(&request())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_starting_proficiency_is_topn_mean() {
        // Two scores: mean of both (fewer than TOP_SKILLS).
        assert_eq!(starting_proficiency(&request()), 70.0);

        let mut many = request();
        many.scores.push(SkillScore {
            name: "Stats".to_string(),
            score: 90.0,
        });
        many.scores.push(SkillScore {
            name: "Excel".to_string(),
            score: 10.0,
        });
        // Top 3 of {90, 80, 60, 10} -> (90+80+60)/3.
        assert!((starting_proficiency(&many) - 76.7).abs() < 0.1);
    }

    #[test]
    fn test_trajectory_respects_resolution_and_ceiling() {
        let payload = deterministic_comparison(&request());
        assert_eq!(payload.trajectory.len(), 24);

        let last = payload.trajectory.last().unwrap();
        assert_eq!(last.month, 24);
        assert!(last.career1_score <= PROFICIENCY_CEILING);
        // Secondary track grows slower than the primary.
        assert!(last.career2_score < last.career1_score);

        // Monotonically non-decreasing curves.
        for pair in payload.trajectory.windows(2) {
            assert!(pair[1].career1_score >= pair[0].career1_score);
            assert!(pair[1].career2_score >= pair[0].career2_score);
        }
    }

    #[test]
    fn test_milestones_land_on_quartiles() {
        let payload = deterministic_comparison(&request());
        let months: Vec<u32> = payload.milestones.iter().map(|m| m.month).collect();
        assert_eq!(months, vec![6, 12, 18, 24]);
    }

    #[test]
    fn test_confidence_is_fixed_low_constant() {
        let payload = deterministic_comparison(&request());
        assert_eq!(payload.confidence, FALLBACK_CONFIDENCE);
        assert!(payload.confidence < 0.5);
    }

    #[test]
    fn test_currency_inference() {
        assert_eq!(default_currency_for("Bangalore, India"), "INR");
        assert_eq!(default_currency_for("London"), "GBP");
        assert_eq!(default_currency_for("Berlin"), "EUR");
        assert_eq!(default_currency_for("San Francisco"), "USD");
    }

    #[test]
    fn test_salary_and_demand_are_populated() {
        let payload = deterministic_comparison(&request());
        assert!(payload.salary.career1.unwrap() > 0.0);
        assert!(payload.salary.career2.unwrap() < payload.salary.career1.unwrap());
        assert_eq!(payload.salary.currency.as_deref(), Some("INR"));
        let demand = payload.demand.career1.unwrap();
        assert!((0.2..=0.9).contains(&demand));
    }
}
