pub mod calendar;
pub mod config;
pub mod duration;
pub mod engine;
pub mod rollover;
pub mod seed;
pub mod store;
pub mod uptime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational status of a server, as entered by staff.
///
/// Purely informational - the uptime percentage is derived from incidents,
/// never from this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Online,
    Offline,
    Maintenance,
}

/// Impact level of a downtime incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Live uptime tracking state for a single server.
///
/// One record exists per distinct server name. `current_month_start` is
/// always the first instant of some calendar month and marks which month the
/// stored percentage applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerUptimeRecord {
    /// Store-assigned identifier (`None` until first persisted)
    pub id: Option<String>,

    /// Unique key within the active roster
    pub server_name: String,

    /// 0.0-100.0, one decimal place
    pub uptime_percentage: f64,

    pub last_checked: DateTime<Utc>,

    pub status: ServerStatus,

    /// First instant of the calendar month this record is tracking
    pub current_month_start: DateTime<Utc>,
}

/// A manually logged server outage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowntimeIncident {
    /// Store-assigned identifier (`None` until first persisted)
    pub id: Option<String>,

    /// References a [`ServerUptimeRecord`] by name, not by id
    pub server_name: String,

    pub start_time: DateTime<Utc>,

    /// Absent while the incident is still ongoing
    pub end_time: Option<DateTime<Utc>>,

    /// Free-text duration such as "1h 15m" (see [`crate::duration`])
    pub duration: String,

    pub cause: String,

    pub resolution: String,

    pub impact: ImpactLevel,
}

/// Immutable archived snapshot of one server's final stats for one past
/// calendar month. Unique per (server name, year, month).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyUptimeHistory {
    pub server_name: String,

    pub year: i32,

    /// 1-12
    pub month: u32,

    /// Number of days in that calendar month
    pub days: u32,

    /// Final uptime percentage, one decimal place
    pub uptime_percentage: f64,

    pub downtime_minutes: u64,

    pub incident_count: usize,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Online => write!(f, "Online"),
            ServerStatus::Offline => write!(f, "Offline"),
            ServerStatus::Maintenance => write!(f, "Maintenance"),
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImpactLevel::Low => write!(f, "Low"),
            ImpactLevel::Medium => write!(f, "Medium"),
            ImpactLevel::High => write!(f, "High"),
            ImpactLevel::Critical => write!(f, "Critical"),
        }
    }
}
