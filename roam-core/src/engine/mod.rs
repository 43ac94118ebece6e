pub mod error;
pub mod interpolate;
pub mod query;
pub mod recommender;
pub mod scoring;

pub use error::{RecommendError, RecommendResult};
pub use interpolate::{select_candidates, InterpolationUnavailable, MatchKind};
pub use query::{parse_duration_days, ServiceType, TripQuery};
pub use recommender::{Recommendation, Recommender, RecommenderConfig, Shortlist};
pub use scoring::ScoredPlan;
