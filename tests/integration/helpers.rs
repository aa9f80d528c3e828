//! Helper functions for integration tests

use chrono::{DateTime, TimeZone, Utc};
use uptime_accounting::{DowntimeIncident, ImpactLevel, ServerStatus, ServerUptimeRecord};

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
}

pub fn create_test_server(name: &str, tracked: DateTime<Utc>) -> ServerUptimeRecord {
    ServerUptimeRecord {
        id: None,
        server_name: name.to_string(),
        uptime_percentage: 100.0,
        last_checked: tracked,
        status: ServerStatus::Online,
        current_month_start: tracked,
    }
}

pub fn create_test_incident(
    server: &str,
    start: DateTime<Utc>,
    duration: &str,
) -> DowntimeIncident {
    DowntimeIncident {
        id: None,
        server_name: server.to_string(),
        start_time: start,
        end_time: None,
        duration: duration.to_string(),
        cause: "unplanned outage".to_string(),
        resolution: String::new(),
        impact: ImpactLevel::Medium,
    }
}
