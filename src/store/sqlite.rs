//! SQLite record store implementation
//!
//! Embedded persistence for the uptime engine - no separate database server
//! required, which fits a single-tenant internal dashboard.
//!
//! - **WAL mode**: readers are not blocked by the dashboard's writes
//! - **Connection pooling**: shared across concurrent resolver runs
//! - **Migrations**: automatic schema versioning with sqlx
//!
//! Change notifications are published from this process after each
//! successful commit; there is no cross-process notification.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{IncidentQuery, RecordStore, StoreEvent, StoreHealth};
use super::error::{StoreError, StoreResult};
use crate::{DowntimeIncident, ImpactLevel, MonthlyUptimeHistory, ServerStatus, ServerUptimeRecord};

/// Capacity of the change notification channels
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// SQLite-backed record store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    servers_tx: tokio::sync::broadcast::Sender<StoreEvent>,
    incidents_tx: tokio::sync::broadcast::Sender<StoreEvent>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite record store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        let (servers_tx, _) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (incidents_tx, _) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            pool,
            servers_tx,
            incidents_tx,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn status_from_db(s: &str) -> ServerStatus {
        match s {
            "Online" => ServerStatus::Online,
            "Offline" => ServerStatus::Offline,
            "Maintenance" => ServerStatus::Maintenance,
            other => {
                warn!("unknown server status '{}' in database, assuming Online", other);
                ServerStatus::Online
            }
        }
    }

    fn impact_from_db(s: &str) -> ImpactLevel {
        match s {
            "Low" => ImpactLevel::Low,
            "Medium" => ImpactLevel::Medium,
            "High" => ImpactLevel::High,
            "Critical" => ImpactLevel::Critical,
            other => {
                warn!("unknown impact level '{}' in database, assuming Low", other);
                ImpactLevel::Low
            }
        }
    }

    fn incident_from_row(row: &sqlx::sqlite::SqliteRow) -> DowntimeIncident {
        let impact_str: String = row.get("impact");

        DowntimeIncident {
            id: Some(row.get::<i64, _>("id").to_string()),
            server_name: row.get("server_name"),
            start_time: Self::millis_to_timestamp(row.get("start_time")),
            end_time: row
                .get::<Option<i64>, _>("end_time")
                .map(Self::millis_to_timestamp),
            duration: row.get("duration"),
            cause: row.get("cause"),
            resolution: row.get("resolution"),
            impact: Self::impact_from_db(&impact_str),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    #[instrument(skip(self))]
    async fn list_servers(&self) -> StoreResult<Vec<ServerUptimeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, server_name, uptime_percentage, last_checked, status, month_start
            FROM servers
            ORDER BY server_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let servers = rows
            .into_iter()
            .map(|row| {
                let status_str: String = row.get("status");

                ServerUptimeRecord {
                    id: Some(row.get::<i64, _>("id").to_string()),
                    server_name: row.get("server_name"),
                    uptime_percentage: row.get("uptime_percentage"),
                    last_checked: Self::millis_to_timestamp(row.get("last_checked")),
                    status: Self::status_from_db(&status_str),
                    current_month_start: Self::millis_to_timestamp(row.get("month_start")),
                }
            })
            .collect();

        Ok(servers)
    }

    #[instrument(skip(self, record), fields(server = %record.server_name))]
    async fn write_server(&self, record: &ServerUptimeRecord) -> StoreResult<String> {
        let last_checked = Self::timestamp_to_millis(&record.last_checked);
        let month_start = Self::timestamp_to_millis(&record.current_month_start);
        let status = record.status.to_string();

        let id = match &record.id {
            Some(id) => {
                let id_num: i64 = id
                    .parse()
                    .map_err(|_| StoreError::NotFound(id.clone()))?;

                sqlx::query(
                    r#"
                    INSERT INTO servers (id, server_name, uptime_percentage, last_checked, status, month_start)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT (id) DO UPDATE SET
                        server_name = excluded.server_name,
                        uptime_percentage = excluded.uptime_percentage,
                        last_checked = excluded.last_checked,
                        status = excluded.status,
                        month_start = excluded.month_start
                    "#,
                )
                .bind(id_num)
                .bind(&record.server_name)
                .bind(record.uptime_percentage)
                .bind(last_checked)
                .bind(&status)
                .bind(month_start)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

                id.clone()
            }
            None => {
                // names are unique; re-seeding an existing roster updates in place
                sqlx::query(
                    r#"
                    INSERT INTO servers (server_name, uptime_percentage, last_checked, status, month_start)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT (server_name) DO UPDATE SET
                        uptime_percentage = excluded.uptime_percentage,
                        last_checked = excluded.last_checked,
                        status = excluded.status,
                        month_start = excluded.month_start
                    "#,
                )
                .bind(&record.server_name)
                .bind(record.uptime_percentage)
                .bind(last_checked)
                .bind(&status)
                .bind(month_start)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

                // last_insert_rowid is unreliable on the update arm of an
                // upsert, so resolve the id by name instead
                let row: (i64,) = sqlx::query_as("SELECT id FROM servers WHERE server_name = ?")
                    .bind(&record.server_name)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
                row.0.to_string()
            }
        };

        let _ = self.servers_tx.send(StoreEvent::ServersChanged);
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn list_incidents(&self, query: IncidentQuery) -> StoreResult<Vec<DowntimeIncident>> {
        let mut sql = String::from(
            "SELECT id, server_name, start_time, end_time, duration, cause, resolution, impact \
             FROM incidents",
        );

        let mut clauses: Vec<&str> = Vec::new();
        if query.server_name.is_some() {
            clauses.push("server_name = ?");
        }
        if query.start.is_some() {
            clauses.push("start_time >= ?");
        }
        if query.end.is_some() {
            clauses.push("start_time <= ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY start_time DESC");

        let mut q = sqlx::query(&sql);
        if let Some(name) = &query.server_name {
            q = q.bind(name);
        }
        if let Some(start) = query.start {
            q = q.bind(Self::timestamp_to_millis(&start));
        }
        if let Some(end) = query.end {
            q = q.bind(Self::timestamp_to_millis(&end));
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(rows.iter().map(Self::incident_from_row).collect())
    }

    #[instrument(skip(self, incident), fields(server = %incident.server_name))]
    async fn create_incident(&self, incident: &DowntimeIncident) -> StoreResult<String> {
        let result = sqlx::query(
            r#"
            INSERT INTO incidents (server_name, start_time, end_time, duration, cause, resolution, impact)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&incident.server_name)
        .bind(Self::timestamp_to_millis(&incident.start_time))
        .bind(incident.end_time.as_ref().map(Self::timestamp_to_millis))
        .bind(&incident.duration)
        .bind(&incident.cause)
        .bind(&incident.resolution)
        .bind(incident.impact.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let id = result.last_insert_rowid().to_string();
        debug!("created incident {}", id);

        let _ = self.incidents_tx.send(StoreEvent::IncidentsChanged);
        Ok(id)
    }

    #[instrument(skip(self, incident))]
    async fn update_incident(&self, id: &str, incident: &DowntimeIncident) -> StoreResult<()> {
        let id_num: i64 = id.parse().map_err(|_| StoreError::NotFound(id.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE incidents
            SET server_name = ?, start_time = ?, end_time = ?, duration = ?,
                cause = ?, resolution = ?, impact = ?
            WHERE id = ?
            "#,
        )
        .bind(&incident.server_name)
        .bind(Self::timestamp_to_millis(&incident.start_time))
        .bind(incident.end_time.as_ref().map(Self::timestamp_to_millis))
        .bind(&incident.duration)
        .bind(&incident.cause)
        .bind(&incident.resolution)
        .bind(incident.impact.to_string())
        .bind(id_num)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let _ = self.incidents_tx.send(StoreEvent::IncidentsChanged);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_incident(&self, id: &str) -> StoreResult<()> {
        // an id that never parsed cannot exist, so deleting it is a no-op
        let Ok(id_num) = id.parse::<i64>() else {
            return Ok(());
        };

        let result = sqlx::query("DELETE FROM incidents WHERE id = ?")
            .bind(id_num)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        if result.rows_affected() > 0 {
            debug!("deleted incident {}", id);
            let _ = self.incidents_tx.send(StoreEvent::IncidentsChanged);
        }

        Ok(())
    }

    #[instrument(skip(self, record), fields(server = %record.server_name, year = record.year, month = record.month))]
    async fn write_history(&self, record: &MonthlyUptimeHistory) -> StoreResult<()> {
        // first write wins; the unique index resolves concurrent archival races
        sqlx::query(
            r#"
            INSERT INTO uptime_history
                (server_name, year, month, days, uptime_percentage, downtime_minutes, incident_count)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (server_name, year, month) DO NOTHING
            "#,
        )
        .bind(&record.server_name)
        .bind(record.year)
        .bind(record.month)
        .bind(record.days)
        .bind(record.uptime_percentage)
        .bind(record.downtime_minutes as i64)
        .bind(record.incident_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn history_exists(
        &self,
        server_name: &str,
        year: i32,
        month: u32,
    ) -> StoreResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM uptime_history WHERE server_name = ? AND year = ? AND month = ?)",
        )
        .bind(server_name)
        .bind(year)
        .bind(month)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(row.0 != 0)
    }

    #[instrument(skip(self))]
    async fn list_history(
        &self,
        server_name: &str,
        limit: usize,
    ) -> StoreResult<Vec<MonthlyUptimeHistory>> {
        let rows = sqlx::query(
            r#"
            SELECT server_name, year, month, days, uptime_percentage, downtime_minutes, incident_count
            FROM uptime_history
            WHERE server_name = ?
            ORDER BY year DESC, month DESC
            LIMIT ?
            "#,
        )
        .bind(server_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let history = rows
            .into_iter()
            .map(|row| MonthlyUptimeHistory {
                server_name: row.get("server_name"),
                year: row.get("year"),
                month: row.get::<i64, _>("month") as u32,
                days: row.get::<i64, _>("days") as u32,
                uptime_percentage: row.get("uptime_percentage"),
                downtime_minutes: row.get::<i64, _>("downtime_minutes") as u64,
                incident_count: row.get::<i64, _>("incident_count") as usize,
            })
            .collect();

        Ok(history)
    }

    fn subscribe_servers(&self) -> tokio::sync::broadcast::Receiver<StoreEvent> {
        self.servers_tx.subscribe()
    }

    fn subscribe_incidents(&self) -> tokio::sync::broadcast::Receiver<StoreEvent> {
        self.incidents_tx.subscribe()
    }

    async fn health_check(&self) -> StoreResult<StoreHealth> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(StoreHealth {
                healthy: true,
                message: "SQLite record store operational".to_string(),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(StoreHealth {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                })
            }
        }
    }

    async fn close(&self) -> StoreResult<()> {
        info!("closing SQLite record store");
        self.pool.close().await;
        Ok(())
    }
}
