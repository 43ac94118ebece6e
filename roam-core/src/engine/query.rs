use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{RecommendError, RecommendResult};

static DURATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+)\s*(?:days?)?\s*$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Data,
    Calls,
    Sms,
}

impl ServiceType {
    pub const NAMES: &'static [&'static str] = &["data", "calls", "sms"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Data => "data",
            ServiceType::Calls => "calls",
            ServiceType::Sms => "sms",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(ServiceType::Data),
            "calls" => Ok(ServiceType::Calls),
            "sms" => Ok(ServiceType::Sms),
            _ => Err(RecommendError::UnsupportedServiceType {
                value: s.to_string(),
                allowed: ServiceType::NAMES,
            }),
        }
    }
}

/// Parses a trip duration given as `3`, `"1 day"` or `"3 Days"`.
pub fn parse_duration_days(raw: &str) -> RecommendResult<i64> {
    let captures = DURATION_PATTERN
        .captures(raw)
        .ok_or_else(|| RecommendError::InvalidQuery(format!("unrecognised duration '{raw}'")))?;
    captures[1]
        .parse::<i64>()
        .map_err(|_| RecommendError::InvalidQuery(format!("duration '{raw}' is out of range")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripQuery {
    pub destination: String,
    pub duration_days: i64,
    pub service_type: ServiceType,
    #[serde(default)]
    pub data_needed_gb: Option<f64>,
}

impl TripQuery {
    pub fn new(
        destination: impl Into<String>,
        duration_days: i64,
        service_type: ServiceType,
    ) -> Self {
        Self {
            destination: destination.into(),
            duration_days,
            service_type,
            data_needed_gb: None,
        }
    }

    pub fn with_data_needed_gb(mut self, gb: f64) -> Self {
        self.data_needed_gb = Some(gb);
        self
    }

    /// Builds a query from untyped inputs. The service type is checked first, so an
    /// unsupported value is reported whatever the other arguments are.
    pub fn parse(
        destination: &str,
        duration_days: i64,
        service_type: &str,
        data_needed_gb: Option<f64>,
    ) -> RecommendResult<Self> {
        let service_type = service_type.parse::<ServiceType>()?;
        Self::checked(destination, duration_days, service_type, data_needed_gb)
    }

    /// Like [`TripQuery::parse`], with the duration still in its textual form.
    pub fn parse_text(
        destination: &str,
        duration: &str,
        service_type: &str,
        data_needed_gb: Option<f64>,
    ) -> RecommendResult<Self> {
        let service_type = service_type.parse::<ServiceType>()?;
        let duration_days = parse_duration_days(duration)?;
        Self::checked(destination, duration_days, service_type, data_needed_gb)
    }

    fn checked(
        destination: &str,
        duration_days: i64,
        service_type: ServiceType,
        data_needed_gb: Option<f64>,
    ) -> RecommendResult<Self> {
        let query = Self {
            destination: destination.to_string(),
            duration_days,
            service_type,
            data_needed_gb,
        };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> RecommendResult<()> {
        if self.destination.trim().is_empty() {
            return Err(RecommendError::InvalidQuery(
                "destination must not be empty".to_string(),
            ));
        }
        if self.duration_days < 1 {
            return Err(RecommendError::InvalidQuery(format!(
                "duration must be at least 1 day, got {}",
                self.duration_days
            )));
        }
        if let Some(gb) = self.data_needed_gb {
            if !gb.is_finite() || gb < 0.0 {
                return Err(RecommendError::InvalidQuery(format!(
                    "data requirement must be a non-negative number, got {gb}"
                )));
            }
        }
        Ok(())
    }

    /// The data floor only applies to data queries.
    pub fn data_floor(&self) -> Option<f64> {
        match self.service_type {
            ServiceType::Data => self.data_needed_gb,
            ServiceType::Calls | ServiceType::Sms => None,
        }
    }
}
