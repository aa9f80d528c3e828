//! Month rollover and live refresh
//!
//! The rollover manager is the only writer of uptime state. For every
//! server record it answers two questions on each pass: has the tracked
//! month fallen behind the real calendar month (archive and reset), and does
//! the stored live percentage still match the incident data (refresh).
//!
//! ## Failure semantics
//!
//! Store failures propagate to the caller and leave no partial in-memory
//! state; the next pass re-detects staleness and retries. Archival and
//! reset are two separate writes with no transaction spanning them - a
//! crash in between leaves a reset record without a history row for the
//! prior month. Re-running is safe (archival checks for an existing row
//! first) but does not repair that ordering.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, instrument, trace, warn};

use crate::calendar::{self, MonthWindow};
use crate::store::{IncidentQuery, RecordStore};
use crate::uptime;
use crate::{DowntimeIncident, MonthlyUptimeHistory, ServerUptimeRecord};

/// Minimum change in percentage points before a live recomputation is
/// persisted. Avoids write amplification on every poll.
pub const DEAD_BAND: f64 = 0.1;

/// Whether a record's tracked month matches the real calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthState {
    /// Tracked month matches the month containing `now`
    Current,

    /// Tracked month is some earlier month; archival is due
    Stale,
}

impl MonthState {
    pub fn evaluate(tracked_month_start: DateTime<Utc>, now: DateTime<Utc>) -> MonthState {
        if calendar::same_month(tracked_month_start, now) {
            return MonthState::Current;
        }

        // a tracked month in the future has nothing to archive; treat it as
        // current and let the live refresh correct the percentage
        if tracked_month_start > now {
            warn!(
                "tracked month start {} is ahead of now {}",
                tracked_month_start, now
            );
            return MonthState::Current;
        }

        MonthState::Stale
    }
}

/// Drives archival, reset and live refresh against a [`RecordStore`].
pub struct RolloverManager {
    store: Arc<dyn RecordStore>,
}

impl RolloverManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Resolve every server record against `now`, returning the rollover-
    /// resolved state ordered by server name.
    #[instrument(skip(self))]
    pub async fn resolve_all(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<ServerUptimeRecord>> {
        let servers = self.store.list_servers().await?;
        let incidents = self.store.list_incidents(IncidentQuery::default()).await?;

        let mut resolved = Vec::with_capacity(servers.len());
        for server in servers {
            resolved.push(self.resolve_server(server, &incidents, now).await?);
        }

        Ok(resolved)
    }

    /// Resolve a single server record: archive any months the record slept
    /// through, reset to the current month if needed, then refresh the live
    /// percentage behind the dead-band.
    pub async fn resolve_server(
        &self,
        mut record: ServerUptimeRecord,
        incidents: &[DowntimeIncident],
        now: DateTime<Utc>,
    ) -> anyhow::Result<ServerUptimeRecord> {
        if MonthState::evaluate(record.current_month_start, now) == MonthState::Stale {
            self.archive_elapsed_months(&record, incidents, now).await?;

            debug!(
                "resetting {} to month of {}",
                record.server_name,
                now.format("%Y-%m")
            );
            record.uptime_percentage = 100.0;
            record.last_checked = now;
            record.current_month_start = MonthWindow::containing(now).start;
            self.store.write_server(&record).await?;
        }

        self.refresh_live(record, incidents, now).await
    }

    /// Archive every calendar month from the record's tracked month up to
    /// (and including) the month before `now`. Each month is guarded by an
    /// existence check, so re-runs and concurrent attempts converge on a
    /// single history row.
    async fn archive_elapsed_months(
        &self,
        record: &ServerUptimeRecord,
        incidents: &[DowntimeIncident],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let (mut year, mut month) = (
            record.current_month_start.year(),
            record.current_month_start.month(),
        );
        let current = (now.year(), now.month());

        while (year, month) < current {
            let Some(window) = MonthWindow::for_month(year, month) else {
                break;
            };

            if self.store.history_exists(&record.server_name, year, month).await? {
                trace!(
                    "{} {}-{:02} already archived, skipping",
                    record.server_name, year, month
                );
            } else {
                let stats = uptime::calculate(incidents, &record.server_name, &window);
                debug!(
                    "archiving {} {}-{:02}: {}% ({} incidents, {} minutes down)",
                    record.server_name,
                    year,
                    month,
                    stats.percentage,
                    stats.incident_count,
                    stats.downtime_minutes
                );

                self.store
                    .write_history(&MonthlyUptimeHistory {
                        server_name: record.server_name.clone(),
                        year,
                        month,
                        days: window.days,
                        uptime_percentage: stats.percentage,
                        downtime_minutes: stats.downtime_minutes,
                        incident_count: stats.incident_count,
                    })
                    .await?;
            }

            (year, month) = calendar::next_month(year, month);
        }

        Ok(())
    }

    /// Recompute the live percentage for the current month and persist it
    /// only when it moved by more than [`DEAD_BAND`] percentage points.
    async fn refresh_live(
        &self,
        mut record: ServerUptimeRecord,
        incidents: &[DowntimeIncident],
        now: DateTime<Utc>,
    ) -> anyhow::Result<ServerUptimeRecord> {
        let window = MonthWindow::containing(now);
        let stats = uptime::calculate(incidents, &record.server_name, &window);

        if (record.uptime_percentage - stats.percentage).abs() > DEAD_BAND {
            trace!(
                "{}: live uptime {}% -> {}%",
                record.server_name, record.uptime_percentage, stats.percentage
            );
            record.uptime_percentage = stats.percentage;
            record.last_checked = now;
            self.store.write_server(&record).await?;
        }

        Ok(record)
    }
}
