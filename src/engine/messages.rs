//! Message types for the uptime engine
//!
//! Commands are request/response messages sent to the engine via mpsc;
//! snapshot events are broadcast to every dashboard subscriber. All events
//! are cloneable for the multi-subscriber pattern.

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, oneshot};

use crate::{MonthlyUptimeHistory, ServerUptimeRecord};

/// A rollover-resolved view of every server, broadcast whenever the engine
/// recomputes. Lagging subscribers may miss intermediate snapshots - each
/// snapshot is complete, so only the latest one matters.
#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    pub servers: Vec<ServerUptimeRecord>,

    /// When the snapshot was resolved
    pub timestamp: DateTime<Utc>,
}

/// Commands that can be sent to the uptime engine
#[derive(Debug)]
pub enum EngineCommand {
    /// Resolve and return the current state of all servers
    GetSnapshot {
        respond_to: oneshot::Sender<anyhow::Result<Vec<ServerUptimeRecord>>>,
    },

    /// Fetch the most recent archived months for one server
    GetHistory {
        server_name: String,
        respond_to: oneshot::Sender<anyhow::Result<Vec<MonthlyUptimeHistory>>>,
    },

    /// Subscribe to the resolved snapshot stream
    Subscribe {
        respond_to: oneshot::Sender<broadcast::Receiver<SnapshotEvent>>,
    },

    /// Gracefully shut down the engine
    Shutdown,
}
