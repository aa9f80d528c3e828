//! Record store trait definition
//!
//! The uptime engine never talks to a database directly; everything goes
//! through the `RecordStore` trait so that tests can substitute the
//! in-memory backend and the rollover manager stays backend-agnostic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::error::StoreResult;
use crate::{DowntimeIncident, MonthlyUptimeHistory, ServerUptimeRecord};

/// Notification that a collection changed in the store.
///
/// Payload of the subscription channels. Server and incident changes are
/// independent streams; either one can invalidate a cached percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    ServersChanged,
    IncidentsChanged,
}

/// Optional filters for incident queries
#[derive(Debug, Clone, Default)]
pub struct IncidentQuery {
    /// Restrict to one server (matched by name)
    pub server_name: Option<String>,

    /// Only incidents starting at or after this instant
    pub start: Option<DateTime<Utc>>,

    /// Only incidents starting at or before this instant
    pub end: Option<DateTime<Utc>>,
}

/// Health status of a store backend
#[derive(Debug, Clone)]
pub struct StoreHealth {
    pub healthy: bool,
    pub message: String,
}

/// Trait for persistent record stores
///
/// Implementations must be `Send + Sync` as they are shared across async
/// tasks behind an `Arc`.
///
/// ## Change notification
///
/// Every successful mutation publishes a [`StoreEvent`] on the matching
/// broadcast channel. Subscribing returns a receiver; dropping it
/// unsubscribes. Channels may lag for slow subscribers - that is acceptable
/// because snapshots are always re-derivable from current data.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All server uptime records, ordered by server name.
    async fn list_servers(&self) -> StoreResult<Vec<ServerUptimeRecord>>;

    /// Upsert a server record by id.
    ///
    /// A record with `id: None` is inserted and assigned an id; otherwise
    /// the existing record is replaced. Returns the record's id.
    async fn write_server(&self, record: &ServerUptimeRecord) -> StoreResult<String>;

    /// Incidents matching the query, ordered by start time descending.
    async fn list_incidents(&self, query: IncidentQuery) -> StoreResult<Vec<DowntimeIncident>>;

    /// Insert a new incident, returning its assigned id.
    async fn create_incident(&self, incident: &DowntimeIncident) -> StoreResult<String>;

    /// Replace an existing incident.
    async fn update_incident(&self, id: &str, incident: &DowntimeIncident) -> StoreResult<()>;

    /// Delete an incident. Deleting an unknown id is a no-op.
    async fn delete_incident(&self, id: &str) -> StoreResult<()>;

    /// Insert a monthly history record.
    ///
    /// Callers guarantee no-overwrite via [`RecordStore::history_exists`];
    /// as a second line of defense a conflicting insert leaves the existing
    /// row untouched, so concurrent archival attempts converge.
    async fn write_history(&self, record: &MonthlyUptimeHistory) -> StoreResult<()>;

    /// Has a history record already been archived for (server, year, month)?
    async fn history_exists(&self, server_name: &str, year: i32, month: u32)
    -> StoreResult<bool>;

    /// The most recent `limit` history records for a server, newest first.
    async fn list_history(
        &self,
        server_name: &str,
        limit: usize,
    ) -> StoreResult<Vec<MonthlyUptimeHistory>>;

    /// Subscribe to server record changes.
    fn subscribe_servers(&self) -> broadcast::Receiver<StoreEvent>;

    /// Subscribe to incident changes.
    fn subscribe_incidents(&self) -> broadcast::Receiver<StoreEvent>;

    /// Lightweight operational check.
    async fn health_check(&self) -> StoreResult<StoreHealth>;

    /// Close the backend and release resources.
    async fn close(&self) -> StoreResult<()>;
}
