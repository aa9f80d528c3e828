//! Uptime engine actor
//!
//! The engine owns the rollover manager and is the single component the UI
//! layer talks to. It runs as an independent async task and reacts to three
//! inputs:
//!
//! 1. **Commands** (mpsc): snapshot fetches, history queries, subscriptions
//! 2. **Server change events** (store broadcast)
//! 3. **Incident change events** (store broadcast)
//!
//! Either change stream triggers a full re-resolution; the result is
//! broadcast to all snapshot subscribers. The engine's own writes during a
//! refresh re-notify the server stream - the dead-band makes the follow-up
//! pass settle without another write, so the loop converges.

pub mod messages;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, trace, warn};

pub use messages::{EngineCommand, SnapshotEvent};

use crate::rollover::RolloverManager;
use crate::store::{RecordStore, StoreEvent};
use crate::{MonthlyUptimeHistory, ServerUptimeRecord};

/// Number of archived months returned by history queries
pub const HISTORY_LIMIT: usize = 12;

/// Capacity of the snapshot broadcast channel
const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// Capacity of the command channel
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// The engine actor. Construct via [`UptimeEngineHandle::spawn`].
struct UptimeEngine {
    store: Arc<dyn RecordStore>,
    rollover: RolloverManager,
    command_rx: mpsc::Receiver<EngineCommand>,
    server_rx: broadcast::Receiver<StoreEvent>,
    incident_rx: broadcast::Receiver<StoreEvent>,
    snapshot_tx: broadcast::Sender<SnapshotEvent>,
}

impl UptimeEngine {
    async fn run(mut self) {
        debug!("starting uptime engine");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                        // every handle has been dropped
                        None => {
                            debug!("all engine handles dropped, shutting down");
                            break;
                        }
                    }
                }

                result = self.server_rx.recv() => {
                    match result {
                        Ok(event) => {
                            trace!("store event: {event:?}");
                            self.refresh().await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("engine lagged, skipped {skipped} server events");
                            self.refresh().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("server change channel closed, shutting down");
                            break;
                        }
                    }
                }

                result = self.incident_rx.recv() => {
                    match result {
                        Ok(event) => {
                            trace!("store event: {event:?}");
                            self.refresh().await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("engine lagged, skipped {skipped} incident events");
                            self.refresh().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("incident change channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = self.store.close().await {
            error!("error closing record store: {}", e);
        }

        debug!("uptime engine stopped");
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::GetSnapshot { respond_to } => {
                let result = self.resolve_and_broadcast().await;
                let _ = respond_to.send(result);
            }

            EngineCommand::GetHistory {
                server_name,
                respond_to,
            } => {
                let result = self
                    .store
                    .list_history(&server_name, HISTORY_LIMIT)
                    .await
                    .map_err(Into::into);
                let _ = respond_to.send(result);
            }

            EngineCommand::Subscribe { respond_to } => {
                let _ = respond_to.send(self.snapshot_tx.subscribe());
            }

            // handled in the main loop
            EngineCommand::Shutdown => {}
        }
    }

    /// Re-resolve on a change notification. A failed refresh keeps the
    /// last-known-good snapshot; the next event retries.
    async fn refresh(&self) {
        if let Err(e) = self.resolve_and_broadcast().await {
            error!("failed to refresh uptime snapshot: {}", e);
        }
    }

    async fn resolve_and_broadcast(&self) -> anyhow::Result<Vec<ServerUptimeRecord>> {
        let servers = self.rollover.resolve_all(Utc::now()).await?;

        // no subscribers is fine
        let _ = self.snapshot_tx.send(SnapshotEvent {
            servers: servers.clone(),
            timestamp: Utc::now(),
        });

        Ok(servers)
    }
}

/// Handle for the uptime engine
///
/// Cheap to clone; every dashboard session holds one. Dropping the last
/// handle stops the engine task and closes the store.
#[derive(Clone)]
pub struct UptimeEngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl UptimeEngineHandle {
    /// Spawn the engine over a record store.
    pub fn spawn(store: Arc<dyn RecordStore>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);

        let engine = UptimeEngine {
            rollover: RolloverManager::new(store.clone()),
            server_rx: store.subscribe_servers(),
            incident_rx: store.subscribe_incidents(),
            store,
            command_rx: cmd_rx,
            snapshot_tx,
        };

        tokio::spawn(engine.run());

        Self { sender: cmd_tx }
    }

    /// Current, rollover-resolved state for all servers.
    pub async fn snapshot(&self) -> anyhow::Result<Vec<ServerUptimeRecord>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::GetSnapshot { respond_to: tx })
            .await?;

        rx.await?
    }

    /// The most recent [`HISTORY_LIMIT`] archived months for a server.
    pub async fn monthly_history(
        &self,
        server_name: &str,
    ) -> anyhow::Result<Vec<MonthlyUptimeHistory>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::GetHistory {
                server_name: server_name.to_string(),
                respond_to: tx,
            })
            .await?;

        rx.await?
    }

    /// Real-time stream of resolved snapshots. Dropping the receiver
    /// unsubscribes.
    pub async fn subscribe(&self) -> anyhow::Result<broadcast::Receiver<SnapshotEvent>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Subscribe { respond_to: tx })
            .await?;

        Ok(rx.await?)
    }

    /// Shut down the engine.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(EngineCommand::Shutdown).await;
    }
}
