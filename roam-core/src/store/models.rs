use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    /// Never connected.
    Ready,
    /// Built (or attached to a built database); queries allowed.
    Connected,
    /// A failure occurred; queries fail fast.
    Error,
}

impl StoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreState::Ready => "READY",
            StoreState::Connected => "CONNECTED",
            StoreState::Error => "ERROR",
        }
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a failed build leaves the store.
///
/// `Recoverable` marks the store ERROR but a later successful build brings it back;
/// `Fatal` also releases the connection and refuses every further call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildErrorPolicy {
    #[default]
    Recoverable,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub country: String,
    pub zone: i64,
}

impl Destination {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            country: row.get("country")?,
            zone: row.get("zone")?,
        })
    }
}

/// Where a plan row came from. Interpolated plans never carry a stored identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanSource {
    Stored { plan_id: i64 },
    Interpolated { lower_days: i64, upper_days: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub source: PlanSource,
    pub zone: i64,
    pub duration_days: i64,
    pub data_gb: f64,
    pub price_sgd: f64,
}

impl Plan {
    pub fn stored(
        plan_id: i64,
        zone: i64,
        duration_days: i64,
        data_gb: f64,
        price_sgd: f64,
    ) -> Self {
        Self {
            source: PlanSource::Stored { plan_id },
            zone,
            duration_days,
            data_gb,
            price_sgd,
        }
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            source: PlanSource::Stored {
                plan_id: row.get("plan_id")?,
            },
            zone: row.get("zone")?,
            duration_days: row.get("duration_days")?,
            data_gb: row.get("data_gb")?,
            price_sgd: row.get("price_sgd")?,
        })
    }

    pub fn plan_id(&self) -> Option<i64> {
        match self.source {
            PlanSource::Stored { plan_id } => Some(plan_id),
            PlanSource::Interpolated { .. } => None,
        }
    }

    pub fn is_interpolated(&self) -> bool {
        matches!(self.source, PlanSource::Interpolated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub zone: i64,
    pub rate_data_per_10kb: f64,
    pub rate_calls_outgoing_per_min: f64,
    pub rate_calls_incoming_per_min: f64,
    pub rate_per_sms: f64,
}

impl Rate {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            zone: row.get("zone")?,
            rate_data_per_10kb: row.get("rate_data_per_10kb")?,
            rate_calls_outgoing_per_min: row.get("rate_calls_outgoing_per_min")?,
            rate_calls_incoming_per_min: row.get("rate_calls_incoming_per_min")?,
            rate_per_sms: row.get("rate_per_sms")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub zone: i64,
    pub destinations: usize,
    pub plans: usize,
    pub has_rates: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableLoad {
    pub table: String,
    pub source: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub tables: Vec<TableLoad>,
    pub built_at: DateTime<Utc>,
}

impl BuildReport {
    pub fn rows_for(&self, table: &str) -> Option<usize> {
        self.tables
            .iter()
            .find(|load| load.table == table)
            .map(|load| load.rows)
    }
}
