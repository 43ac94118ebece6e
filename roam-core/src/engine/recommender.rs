use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EngineSection, DEFAULT_SHORTLIST_SIZE};
use crate::store::{BuildReport, PlanStore, Rate};

use super::interpolate::{select_candidates, MatchKind};
use super::scoring::{rank, score_candidates, ScoredPlan};
use super::{RecommendError, RecommendResult, TripQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommenderConfig {
    pub shortlist_size: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            shortlist_size: DEFAULT_SHORTLIST_SIZE,
        }
    }
}

impl RecommenderConfig {
    pub fn from_engine_config(config: &EngineSection) -> Self {
        Self {
            shortlist_size: config.shortlist_size,
        }
    }
}

/// A ranked plan merged with its zone's pay-per-use rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub zone: i64,
    pub duration_days: i64,
    pub data_gb: f64,
    pub price_sgd: f64,
    pub rate_data_per_10kb: f64,
    pub rate_calls_outgoing_per_min: f64,
    pub rate_calls_incoming_per_min: f64,
    pub rate_per_sms: f64,
    pub interpolated: bool,
    pub score: f64,
}

impl Recommendation {
    fn merge(scored: ScoredPlan, rate: &Rate) -> Self {
        let ScoredPlan { plan, score } = scored;
        Self {
            zone: plan.zone,
            duration_days: plan.duration_days,
            data_gb: plan.data_gb,
            price_sgd: plan.price_sgd,
            rate_data_per_10kb: rate.rate_data_per_10kb,
            rate_calls_outgoing_per_min: rate.rate_calls_outgoing_per_min,
            rate_calls_incoming_per_min: rate.rate_calls_incoming_per_min,
            rate_per_sms: rate.rate_per_sms,
            interpolated: plan.is_interpolated(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortlist {
    pub destination: String,
    pub zone: i64,
    pub matched: MatchKind,
    pub items: Vec<Recommendation>,
}

impl Shortlist {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn first(&self) -> Option<&Recommendation> {
        self.items.first()
    }
}

/// Maps trip queries onto ranked plan shortlists.
///
/// Owns its store; every call is independent apart from the last-error slot.
#[derive(Debug)]
pub struct Recommender {
    store: PlanStore,
    config: RecommenderConfig,
    last_error: Option<String>,
}

impl Recommender {
    pub fn new(store: PlanStore, config: RecommenderConfig) -> Self {
        Self {
            store,
            config,
            last_error: None,
        }
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PlanStore {
        &mut self.store
    }

    /// Message of the most recent failed call. Not cleared by later successes.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    pub fn build_store(&mut self) -> RecommendResult<BuildReport> {
        let outcome = self.store.build().map_err(RecommendError::StoreBuild);
        self.remember(outcome)
    }

    /// Untyped entry point for shells: parses the inputs, then recommends.
    pub fn recommend_raw(
        &mut self,
        destination: &str,
        duration_days: i64,
        service_type: &str,
        data_needed_gb: Option<f64>,
    ) -> RecommendResult<Shortlist> {
        match TripQuery::parse(destination, duration_days, service_type, data_needed_gb) {
            Ok(query) => self.recommend(&query),
            Err(err) => self.remember(Err(err)),
        }
    }

    /// Same as [`Recommender::recommend_raw`] for durations such as `"7 days"`.
    pub fn recommend_text(
        &mut self,
        destination: &str,
        duration: &str,
        service_type: &str,
        data_needed_gb: Option<f64>,
    ) -> RecommendResult<Shortlist> {
        match TripQuery::parse_text(destination, duration, service_type, data_needed_gb) {
            Ok(query) => self.recommend(&query),
            Err(err) => self.remember(Err(err)),
        }
    }

    pub fn recommend(&mut self, query: &TripQuery) -> RecommendResult<Shortlist> {
        let outcome = query.validate().and_then(|()| self.evaluate(query));
        self.remember(outcome)
    }

    fn remember<T>(&mut self, outcome: RecommendResult<T>) -> RecommendResult<T> {
        if let Err(err) = &outcome {
            warn!(target: "engine", kind = err.kind(), error = %err, "recommendation failed");
            self.last_error = Some(err.to_string());
        }
        outcome
    }

    fn evaluate(&mut self, query: &TripQuery) -> RecommendResult<Shortlist> {
        let zone = self
            .store
            .zone_for_destination(query.destination.trim())?
            .ok_or_else(|| RecommendError::UnknownDestination {
                destination: query.destination.clone(),
            })?;

        let plans = self.store.plans_for_zone(zone)?;
        if plans.is_empty() {
            return Err(RecommendError::NoPlansForZone { zone });
        }
        let rate = self
            .store
            .rate_for_zone(zone)?
            .ok_or(RecommendError::NoRatesForZone { zone })?;

        let (matched, candidates) = select_candidates(plans, query.duration_days);
        debug!(
            target: "engine",
            zone,
            duration_days = query.duration_days,
            matched = ?matched,
            candidates = candidates.len(),
            "candidates selected"
        );

        let scored = score_candidates(candidates, query.service_type, &rate, query.data_floor());
        let items: Vec<Recommendation> = rank(scored, self.config.shortlist_size)
            .into_iter()
            .map(|scored| Recommendation::merge(scored, &rate))
            .collect();

        info!(
            target: "engine",
            destination = %query.destination,
            zone,
            service = %query.service_type,
            results = items.len(),
            "recommendation ready"
        );
        Ok(Shortlist {
            destination: query.destination.clone(),
            zone,
            matched,
            items,
        })
    }
}
