//! Uptime percentage calculation
//!
//! Pure function over a server's incident history and a month window. The
//! caller (the rollover manager) decides what to do with the result; nothing
//! here touches the store.

use crate::DowntimeIncident;
use crate::calendar::MonthWindow;
use crate::duration::parse_duration_minutes;

/// Result of an uptime calculation for one server and one month window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UptimeStats {
    /// Uptime percentage, one decimal place, clamped to [0, 100]
    pub percentage: f64,

    /// Sum of parsed incident durations
    pub downtime_minutes: u64,

    /// Number of qualifying incidents
    pub incident_count: usize,
}

impl UptimeStats {
    /// The healthy baseline: no recorded incidents means 100% uptime, not
    /// missing data.
    pub const FULL: UptimeStats = UptimeStats {
        percentage: 100.0,
        downtime_minutes: 0,
        incident_count: 0,
    };
}

/// Derive uptime stats for `server_name` over `window`.
///
/// An incident qualifies when its server name matches and its start time
/// falls within the window. Durations are parsed best-effort; an
/// unparseable duration (e.g. an ongoing incident) contributes 0 minutes but
/// still counts toward the incident count.
///
/// Downtime exceeding the month's total minutes saturates at 0.0% rather
/// than going negative.
pub fn calculate(
    incidents: &[DowntimeIncident],
    server_name: &str,
    window: &MonthWindow,
) -> UptimeStats {
    let qualifying: Vec<&DowntimeIncident> = incidents
        .iter()
        .filter(|incident| {
            incident.server_name == server_name && window.contains(incident.start_time)
        })
        .collect();

    if qualifying.is_empty() {
        return UptimeStats::FULL;
    }

    let downtime_minutes: u64 = qualifying
        .iter()
        .map(|incident| u64::from(parse_duration_minutes(&incident.duration)))
        .sum();

    let total = f64::from(window.total_minutes);
    let percentage = ((total - downtime_minutes as f64) / total * 100.0).clamp(0.0, 100.0);

    UptimeStats {
        percentage: round_one_decimal(percentage),
        downtime_minutes,
        incident_count: qualifying.len(),
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
