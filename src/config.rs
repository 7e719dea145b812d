use crate::error::{Result, WarehouseError};
use crate::schema::{DateRange, Session};
use crate::utils::parse_day;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters of a single report request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportRequest {
    #[schemars(description = "First day of the report (YYYY-MM-DD), inclusive")]
    pub start: NaiveDate,

    #[schemars(description = "Last day of the report (YYYY-MM-DD), inclusive. A start after the end yields an empty report.")]
    pub end: NaiveDate,

    #[serde(default)]
    #[schemars(description = "Restrict the report to these clients. When absent every client observed is reported.")]
    pub clients: Option<Vec<String>>,

    #[serde(default)]
    #[schemars(description = "Restrict counts to one temperature session")]
    pub session: Option<Session>,

    #[serde(default)]
    #[schemars(description = "Present rows newest first")]
    pub descending: bool,
}

impl ReportRequest {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            clients: None,
            session: None,
            descending: false,
        }
    }

    pub fn with_clients(mut self, clients: Vec<String>) -> Self {
        self.clients = Some(clients);
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }

    pub fn includes_client(&self, client: &str) -> bool {
        match &self.clients {
            Some(list) => list.iter().any(|c| c.trim() == client.trim()),
            None => true,
        }
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(ReportRequest);
        serde_json::to_string_pretty(&schema)
    }
}

/// Named local-time policy for turning creation timestamps into operation days.
/// Applied once, at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LocalTimePolicy {
    pub utc_offset_hours: i32,
}

impl Default for LocalTimePolicy {
    fn default() -> Self {
        // Warehouse local time, UTC-5.
        Self {
            utc_offset_hours: -5,
        }
    }
}

impl LocalTimePolicy {
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            WarehouseError::InvalidDate(format!(
                "UTC offset of {} hours is out of range",
                self.utc_offset_hours
            ))
        })
    }

    pub fn local_day(&self, timestamp: DateTime<Utc>) -> Result<NaiveDate> {
        Ok(timestamp.with_timezone(&self.offset()?).date_naive())
    }

    /// RFC 3339 timestamps are shifted into local time; bare dates are taken as-is.
    pub fn day_of(&self, value: &str) -> Result<NaiveDate> {
        match DateTime::parse_from_rfc3339(value.trim()) {
            Ok(timestamp) => self.local_day(timestamp.with_timezone(&Utc)),
            Err(_) => parse_day(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct IngestionConfig {
    #[serde(default)]
    pub time_policy: LocalTimePolicy,
}

impl IngestionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: IngestionConfig = serde_json::from_str(json)?;
        config.time_policy.offset()?;
        Ok(config)
    }
}
