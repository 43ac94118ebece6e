use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("unknown destination '{destination}'")]
    UnknownDestination { destination: String },
    #[error("no plans available for zone {zone}")]
    NoPlansForZone { zone: i64 },
    #[error("no pay-per-use rates available for zone {zone}")]
    NoRatesForZone { zone: i64 },
    #[error("unsupported service type '{value}', expected one of: data, calls, sms")]
    UnsupportedServiceType {
        value: String,
        allowed: &'static [&'static str],
    },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("plan store error: {0}")]
    Store(#[from] StoreError),
    #[error("plan store build failed: {0}")]
    StoreBuild(StoreError),
}

impl RecommendError {
    /// Stable name of the error kind, for shells that map errors to prompts.
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendError::UnknownDestination { .. } => "unknown_destination",
            RecommendError::NoPlansForZone { .. } => "no_plans_for_zone",
            RecommendError::NoRatesForZone { .. } => "no_rates_for_zone",
            RecommendError::UnsupportedServiceType { .. } => "unsupported_service_type",
            RecommendError::InvalidQuery(_) => "invalid_query",
            RecommendError::Store(StoreError::OpenDatabase { .. })
            | RecommendError::Store(StoreError::Unavailable { .. })
            | RecommendError::Store(StoreError::NotBuilt { .. }) => "store_connection_failure",
            RecommendError::Store(_) => "store_failure",
            RecommendError::StoreBuild(_) => "store_build_failure",
        }
    }
}

pub type RecommendResult<T> = std::result::Result<T, RecommendError>;
