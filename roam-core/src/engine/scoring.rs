use crate::store::{Plan, Rate};

use super::ServiceType;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPlan {
    pub plan: Plan,
    pub score: f64,
}

/// Scores candidates for a service type. Higher is better.
///
/// Data queries score by allowance and drop every plan under `data_floor`. Calls and
/// SMS score by the zone's pay-per-use price, so all candidates tie.
pub fn score_candidates(
    candidates: Vec<Plan>,
    service_type: ServiceType,
    rate: &Rate,
    data_floor: Option<f64>,
) -> Vec<ScoredPlan> {
    candidates
        .into_iter()
        .filter_map(|plan| {
            let score = match service_type {
                ServiceType::Data => {
                    if data_floor.is_some_and(|floor| plan.data_gb < floor) {
                        return None;
                    }
                    plan.data_gb
                }
                ServiceType::Calls => -rate.rate_calls_outgoing_per_min,
                ServiceType::Sms => -rate.rate_per_sms,
            };
            Some(ScoredPlan { plan, score })
        })
        .collect()
}

/// Best-first, keeping candidate order on ties, truncated to `limit`.
pub fn rank(mut scored: Vec<ScoredPlan>, limit: usize) -> Vec<ScoredPlan> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}
