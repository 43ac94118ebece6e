pub mod config;
pub mod engine;
pub mod error;
pub mod sqlite;
pub mod store;

pub use config::{
    load_roam_config, parse_roam_config, EngineSection, PathsSection, RoamConfig, StoreSection,
};
pub use engine::{
    parse_duration_days, MatchKind, RecommendError, RecommendResult, Recommendation, Recommender,
    RecommenderConfig, ServiceType, Shortlist, TripQuery,
};
pub use error::{ConfigError, Result};
pub use store::{
    BuildErrorPolicy, BuildReport, Destination, Plan, PlanSource, PlanStore, PlanStoreBuilder,
    Rate, Schema, StoreError, StoreResult, StoreState, TableLoad, ZoneSummary,
};
