//! In-memory record store (no persistence)
//!
//! Keeps everything in maps behind a `tokio::sync::RwLock`. All data is lost
//! on restart, which is fine for its two purposes: the substitutable fake
//! for tests, and ephemeral dashboard sessions that never configured a
//! database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, trace};

use super::backend::{IncidentQuery, RecordStore, StoreEvent, StoreHealth};
use super::error::{StoreError, StoreResult};
use crate::{DowntimeIncident, MonthlyUptimeHistory, ServerUptimeRecord};

/// Capacity of the change notification channels
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct Inner {
    servers: HashMap<String, ServerUptimeRecord>,
    incidents: HashMap<String, DowntimeIncident>,
    history: Vec<MonthlyUptimeHistory>,
}

/// In-memory record store
pub struct MemoryStore {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
    servers_tx: broadcast::Sender<StoreEvent>,
    incidents_tx: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (servers_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (incidents_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: RwLock::new(Inner::default()),
            next_id: AtomicU64::new(1),
            servers_tx,
            incidents_tx,
        }
    }

    fn assign_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    }

    fn notify_servers(&self) {
        // no receivers is fine
        let _ = self.servers_tx.send(StoreEvent::ServersChanged);
    }

    fn notify_incidents(&self) {
        let _ = self.incidents_tx.send(StoreEvent::IncidentsChanged);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_servers(&self) -> StoreResult<Vec<ServerUptimeRecord>> {
        let inner = self.inner.read().await;

        let mut servers: Vec<ServerUptimeRecord> = inner.servers.values().cloned().collect();
        servers.sort_by(|a, b| a.server_name.cmp(&b.server_name));

        Ok(servers)
    }

    async fn write_server(&self, record: &ServerUptimeRecord) -> StoreResult<String> {
        let id = match &record.id {
            Some(id) => id.clone(),
            None => self.assign_id("srv"),
        };

        trace!("writing server record {} ({})", record.server_name, id);

        let mut stored = record.clone();
        stored.id = Some(id.clone());

        self.inner.write().await.servers.insert(id.clone(), stored);
        self.notify_servers();

        Ok(id)
    }

    async fn list_incidents(&self, query: IncidentQuery) -> StoreResult<Vec<DowntimeIncident>> {
        let inner = self.inner.read().await;

        let mut incidents: Vec<DowntimeIncident> = inner
            .incidents
            .values()
            .filter(|incident| {
                query
                    .server_name
                    .as_ref()
                    .is_none_or(|name| &incident.server_name == name)
                    && query.start.is_none_or(|start| incident.start_time >= start)
                    && query.end.is_none_or(|end| incident.start_time <= end)
            })
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        Ok(incidents)
    }

    async fn create_incident(&self, incident: &DowntimeIncident) -> StoreResult<String> {
        let id = self.assign_id("inc");
        debug!("creating incident {} for {}", id, incident.server_name);

        let mut stored = incident.clone();
        stored.id = Some(id.clone());

        self.inner.write().await.incidents.insert(id.clone(), stored);
        self.notify_incidents();

        Ok(id)
    }

    async fn update_incident(&self, id: &str, incident: &DowntimeIncident) -> StoreResult<()> {
        let mut inner = self.inner.write().await;

        if !inner.incidents.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let mut stored = incident.clone();
        stored.id = Some(id.to_string());
        inner.incidents.insert(id.to_string(), stored);
        drop(inner);

        self.notify_incidents();
        Ok(())
    }

    async fn delete_incident(&self, id: &str) -> StoreResult<()> {
        let removed = self.inner.write().await.incidents.remove(id);

        if removed.is_some() {
            debug!("deleted incident {}", id);
            self.notify_incidents();
        }

        Ok(())
    }

    async fn write_history(&self, record: &MonthlyUptimeHistory) -> StoreResult<()> {
        let mut inner = self.inner.write().await;

        let exists = inner.history.iter().any(|h| {
            h.server_name == record.server_name && h.year == record.year && h.month == record.month
        });

        // first write wins; a lost archival race leaves the existing row
        if !exists {
            debug!(
                "archiving {} {}-{:02}: {}%",
                record.server_name, record.year, record.month, record.uptime_percentage
            );
            inner.history.push(record.clone());
        }

        Ok(())
    }

    async fn history_exists(
        &self,
        server_name: &str,
        year: i32,
        month: u32,
    ) -> StoreResult<bool> {
        let inner = self.inner.read().await;

        Ok(inner
            .history
            .iter()
            .any(|h| h.server_name == server_name && h.year == year && h.month == month))
    }

    async fn list_history(
        &self,
        server_name: &str,
        limit: usize,
    ) -> StoreResult<Vec<MonthlyUptimeHistory>> {
        let inner = self.inner.read().await;

        let mut history: Vec<MonthlyUptimeHistory> = inner
            .history
            .iter()
            .filter(|h| h.server_name == server_name)
            .cloned()
            .collect();
        history.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));
        history.truncate(limit);

        Ok(history)
    }

    fn subscribe_servers(&self) -> broadcast::Receiver<StoreEvent> {
        self.servers_tx.subscribe()
    }

    fn subscribe_incidents(&self) -> broadcast::Receiver<StoreEvent> {
        self.incidents_tx.subscribe()
    }

    async fn health_check(&self) -> StoreResult<StoreHealth> {
        Ok(StoreHealth {
            healthy: true,
            message: "in-memory store operational".to_string(),
        })
    }

    async fn close(&self) -> StoreResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
