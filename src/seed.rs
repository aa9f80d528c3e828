//! First-run roster seeding
//!
//! The dashboard tracks a fixed roster of servers; records are created once
//! per distinct name and never deleted in normal operation. Seeding is
//! idempotent: a store that already holds any server record is left alone.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::calendar::MonthWindow;
use crate::store::{RecordStore, StoreResult};
use crate::{ServerStatus, ServerUptimeRecord};

/// Default roster for a fresh deployment.
pub const DEFAULT_ROSTER: [&str; 4] = [
    "Web Server",
    "Database Server",
    "Email Server",
    "File Server",
];

/// Seed `roster` into an empty store at the 100% baseline for the month
/// containing `now`. Returns the number of records created (0 when the
/// store was already populated).
pub async fn seed_servers(
    store: &dyn RecordStore,
    roster: &[String],
    now: DateTime<Utc>,
) -> StoreResult<usize> {
    if !store.list_servers().await?.is_empty() {
        return Ok(0);
    }

    let month_start = MonthWindow::containing(now).start;

    for name in roster {
        store
            .write_server(&ServerUptimeRecord {
                id: None,
                server_name: name.clone(),
                uptime_percentage: 100.0,
                last_checked: now,
                status: ServerStatus::Online,
                current_month_start: month_start,
            })
            .await?;
    }

    info!("seeded {} server records", roster.len());
    Ok(roster.len())
}
