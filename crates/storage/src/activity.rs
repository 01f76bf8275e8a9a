//! Activity log types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// A unique identifier for an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogId(pub Uuid);

impl LogId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LogId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_string()))
    }
}

/// How notable an activity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Success,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(Severity::Success),
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(Error::InvalidSeverity(s.to_string())),
        }
    }
}

/// A recorded activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: LogId,
    pub principal: String,
    pub action: String,
    pub details: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// An activity to be appended.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub principal: String,
    pub action: String,
    pub details: String,
    pub severity: Severity,
    /// Defaults to the time of append.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewActivity {
    pub fn new(
        principal: impl Into<String>,
        action: impl Into<String>,
        details: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            principal: principal.into(),
            action: action.into(),
            details: details.into(),
            severity,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Field changes to an existing activity entry. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ActivityUpdate {
    pub principal: Option<String>,
    pub action: Option<String>,
    pub details: Option<String>,
    pub severity: Option<Severity>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ActivityUpdate {
    pub fn is_empty(&self) -> bool {
        self.principal.is_none()
            && self.action.is_none()
            && self.details.is_none()
            && self.severity.is_none()
            && self.timestamp.is_none()
    }

    fn apply(self, log: &mut ActivityLog) {
        if let Some(principal) = self.principal {
            log.principal = principal;
        }
        if let Some(action) = self.action {
            log.action = action;
        }
        if let Some(details) = self.details {
            log.details = details;
        }
        if let Some(severity) = self.severity {
            log.severity = severity;
        }
        if let Some(timestamp) = self.timestamp {
            log.timestamp = timestamp;
        }
    }
}

impl ActivityLog {
    /// A copy of this entry with `update` applied.
    pub fn updated(&self, update: ActivityUpdate) -> Self {
        let mut log = self.clone();
        update.apply(&mut log);
        log
    }
}

/// Sort direction by timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters and pagination for listing activity.
#[derive(Debug, Clone)]
pub struct LogFilter {
    /// Substring match on the principal.
    pub principal: Option<String>,
    /// Substring match on the action.
    pub action: Option<String>,
    pub severity: Option<Severity>,
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
    pub order: SortOrder,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            principal: None,
            action: None,
            severity: None,
            start: None,
            end: None,
            page: 1,
            limit: 10,
            order: SortOrder::Desc,
        }
    }
}

/// One page of activity.
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub items: Vec<ActivityLog>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

/// Activity counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub total: u64,
    pub by_severity: BTreeMap<Severity, u64>,
}
