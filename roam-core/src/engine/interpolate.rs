use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{Plan, PlanSource};

/// How the candidate set for a query was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Stored plans with exactly the requested duration.
    Exact,
    /// One synthetic plan interpolated between the nearest shorter and longer plans.
    Interpolated,
    /// No bounding pair: every plan in the zone is a candidate.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationUnavailable {
    NoLowerBound,
    NoUpperBound,
}

/// Picks the candidates for `duration_days`: exact matches first, then a single
/// interpolated plan, then the whole zone.
pub fn select_candidates(plans: Vec<Plan>, duration_days: i64) -> (MatchKind, Vec<Plan>) {
    let exact: Vec<Plan> = plans
        .iter()
        .filter(|plan| plan.duration_days == duration_days)
        .cloned()
        .collect();
    if !exact.is_empty() {
        return (MatchKind::Exact, exact);
    }

    match interpolate(&plans, duration_days) {
        Ok(plan) => (MatchKind::Interpolated, vec![plan]),
        Err(reason) => {
            debug!(
                target: "engine",
                duration_days,
                reason = ?reason,
                candidates = plans.len(),
                "interpolation unavailable, using every plan in the zone"
            );
            (MatchKind::Fallback, plans)
        }
    }
}

/// Nearest plan strictly shorter and nearest plan strictly longer than `duration_days`.
/// Ties keep the first plan seen.
pub fn bounding_pair(
    plans: &[Plan],
    duration_days: i64,
) -> Result<(&Plan, &Plan), InterpolationUnavailable> {
    let mut lower: Option<&Plan> = None;
    let mut upper: Option<&Plan> = None;
    for plan in plans {
        if plan.duration_days < duration_days
            && lower.map_or(true, |best| plan.duration_days > best.duration_days)
        {
            lower = Some(plan);
        }
        if plan.duration_days > duration_days
            && upper.map_or(true, |best| plan.duration_days < best.duration_days)
        {
            upper = Some(plan);
        }
    }
    match (lower, upper) {
        (Some(lower), Some(upper)) => Ok((lower, upper)),
        (None, _) => Err(InterpolationUnavailable::NoLowerBound),
        (Some(_), None) => Err(InterpolationUnavailable::NoUpperBound),
    }
}

pub fn interpolate(plans: &[Plan], duration_days: i64) -> Result<Plan, InterpolationUnavailable> {
    let (lower, upper) = bounding_pair(plans, duration_days)?;
    let lower_days = lower.duration_days as f64;
    let fraction =
        (duration_days as f64 - lower_days) / (upper.duration_days as f64 - lower_days);
    Ok(Plan {
        source: PlanSource::Interpolated {
            lower_days: lower.duration_days,
            upper_days: upper.duration_days,
        },
        zone: lower.zone,
        duration_days,
        data_gb: round2(lerp(lower.data_gb, upper.data_gb, fraction)),
        price_sgd: round2(lerp(lower.price_sgd, upper.price_sgd, fraction)),
    })
}

fn lerp(from: f64, to: f64, fraction: f64) -> f64 {
    from + fraction * (to - from)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_one() -> Vec<Plan> {
        vec![
            Plan::stored(1, 1, 1, 1.0, 1.5),
            Plan::stored(2, 1, 3, 3.0, 3.0),
            Plan::stored(3, 1, 7, 6.5, 6.0),
            Plan::stored(4, 1, 30, 20.0, 22.0),
        ]
    }

    #[test]
    fn interpolates_linearly_between_neighbours() {
        let plan = interpolate(&zone_one(), 5).unwrap();
        assert_eq!(
            plan.source,
            PlanSource::Interpolated {
                lower_days: 3,
                upper_days: 7
            }
        );
        assert_eq!(plan.duration_days, 5);
        assert_eq!(plan.zone, 1);
        assert_eq!(plan.data_gb, 4.75);
        assert_eq!(plan.price_sgd, 4.5);
        assert_eq!(plan.plan_id(), None);
    }

    #[test]
    fn results_are_rounded_to_cents() {
        let plan = interpolate(&zone_one(), 10).unwrap();
        // 6.5 + 3/23 * 13.5 and 6.0 + 3/23 * 16.0
        assert_eq!(plan.data_gb, 8.26);
        assert_eq!(plan.price_sgd, 8.09);
    }

    #[test]
    fn exact_at_the_boundaries() {
        let plans = zone_one();
        let (lower, upper) = bounding_pair(&plans, 5).unwrap();
        let fraction_at = |days: i64| {
            (days as f64 - lower.duration_days as f64)
                / (upper.duration_days as f64 - lower.duration_days as f64)
        };
        assert_eq!(
            round2(lerp(lower.data_gb, upper.data_gb, fraction_at(3))),
            lower.data_gb
        );
        assert_eq!(
            round2(lerp(lower.price_sgd, upper.price_sgd, fraction_at(7))),
            upper.price_sgd
        );
    }

    #[test]
    fn missing_bounds_are_reported() {
        let plans = zone_one();
        assert_eq!(
            interpolate(&plans, 45).unwrap_err(),
            InterpolationUnavailable::NoUpperBound
        );
        let plans = vec![Plan::stored(1, 2, 3, 2.0, 8.0), Plan::stored(2, 2, 7, 5.0, 15.0)];
        assert_eq!(
            interpolate(&plans, 1).unwrap_err(),
            InterpolationUnavailable::NoLowerBound
        );
    }

    #[test]
    fn ties_keep_the_first_plan_seen() {
        let plans = vec![
            Plan::stored(10, 1, 3, 3.0, 3.0),
            Plan::stored(11, 1, 3, 4.0, 5.0),
            Plan::stored(12, 1, 7, 6.5, 6.0),
            Plan::stored(13, 1, 7, 9.0, 9.0),
        ];
        let (lower, upper) = bounding_pair(&plans, 5).unwrap();
        assert_eq!(lower.plan_id(), Some(10));
        assert_eq!(upper.plan_id(), Some(12));
    }

    #[test]
    fn exact_match_takes_precedence() {
        let mut plans = zone_one();
        plans.push(Plan::stored(5, 1, 7, 8.0, 9.0));
        let (kind, candidates) = select_candidates(plans, 7);
        assert_eq!(kind, MatchKind::Exact);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|plan| !plan.is_interpolated()));
        assert!(candidates.iter().all(|plan| plan.duration_days == 7));
    }

    #[test]
    fn unbounded_durations_fall_back_to_every_plan() {
        let (kind, candidates) = select_candidates(zone_one(), 60);
        assert_eq!(kind, MatchKind::Fallback);
        assert_eq!(candidates, zone_one());
    }

    #[test]
    fn extreme_durations_do_not_overflow() {
        let plans = vec![
            Plan::stored(1, 1, i64::MIN, 0.0, 0.0),
            Plan::stored(2, 1, i64::MAX, 10.0, 10.0),
        ];
        let plan = interpolate(&plans, 2).unwrap();
        assert_eq!(plan.duration_days, 2);
        assert_eq!(plan.data_gb, 5.0);
        assert_eq!(plan.price_sgd, 5.0);
    }

    #[test]
    fn bounded_durations_yield_one_synthetic_plan() {
        let (kind, candidates) = select_candidates(zone_one(), 2);
        assert_eq!(kind, MatchKind::Interpolated);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].data_gb, 2.0);
        assert_eq!(candidates[0].price_sgd, 2.25);
    }
}
