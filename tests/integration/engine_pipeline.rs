//! End-to-end tests of the engine actor over the in-memory store

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio::time::timeout;
use uptime_accounting::engine::UptimeEngineHandle;
use uptime_accounting::seed::{DEFAULT_ROSTER, seed_servers};
use uptime_accounting::store::{MemoryStore, RecordStore};
use uptime_accounting::MonthlyUptimeHistory;

use crate::helpers::{create_test_incident, init_tracing};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

fn default_roster() -> Vec<String> {
    DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect()
}

/// Receive snapshots until one satisfies `predicate`. The engine may
/// broadcast intermediate snapshots triggered by its own writes, so a single
/// recv is not deterministic.
async fn wait_for_snapshot<F>(
    snapshots: &mut tokio::sync::broadcast::Receiver<uptime_accounting::engine::SnapshotEvent>,
    predicate: F,
) -> uptime_accounting::engine::SnapshotEvent
where
    F: Fn(&uptime_accounting::engine::SnapshotEvent) -> bool,
{
    timeout(EVENT_TIMEOUT, async {
        loop {
            match snapshots.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("snapshot stream closed: {e}"),
            }
        }
    })
    .await
    .expect("no matching snapshot received")
}

#[tokio::test]
async fn test_snapshot_returns_seeded_roster_ordered() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    seed_servers(store.as_ref(), &default_roster(), Utc::now())
        .await
        .unwrap();

    let engine = UptimeEngineHandle::spawn(store);
    let snapshot = engine.snapshot().await.unwrap();

    assert_eq!(snapshot.len(), 4);
    let names: Vec<&str> = snapshot.iter().map(|s| s.server_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Database Server", "Email Server", "File Server", "Web Server"]
    );
    assert!(snapshot.iter().all(|s| s.uptime_percentage == 100.0));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_incident_creation_pushes_updated_snapshot() {
    let store = Arc::new(MemoryStore::new());
    seed_servers(store.as_ref(), &default_roster(), Utc::now())
        .await
        .unwrap();

    let engine = UptimeEngineHandle::spawn(store.clone());
    let mut snapshots = engine.subscribe().await.unwrap();

    // staff log a 2h outage for the web server this month
    store
        .create_incident(&create_test_incident("Web Server", Utc::now(), "2h 0m"))
        .await
        .unwrap();

    let event = wait_for_snapshot(&mut snapshots, |event| {
        event
            .servers
            .iter()
            .any(|s| s.server_name == "Web Server" && s.uptime_percentage < 100.0)
    })
    .await;

    // the other servers are untouched
    assert!(
        event
            .servers
            .iter()
            .filter(|s| s.server_name != "Web Server")
            .all(|s| s.uptime_percentage == 100.0)
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn test_incident_deletion_restores_baseline() {
    let store = Arc::new(MemoryStore::new());
    seed_servers(store.as_ref(), &default_roster(), Utc::now())
        .await
        .unwrap();

    let id = store
        .create_incident(&create_test_incident("Email Server", Utc::now(), "10h 0m"))
        .await
        .unwrap();

    let engine = UptimeEngineHandle::spawn(store.clone());
    let snapshot = engine.snapshot().await.unwrap();
    let email = snapshot
        .iter()
        .find(|s| s.server_name == "Email Server")
        .unwrap();
    assert!(email.uptime_percentage < 100.0);

    let mut snapshots = engine.subscribe().await.unwrap();
    store.delete_incident(&id).await.unwrap();

    wait_for_snapshot(&mut snapshots, |event| {
        event
            .servers
            .iter()
            .any(|s| s.server_name == "Email Server" && s.uptime_percentage == 100.0)
    })
    .await;

    engine.shutdown().await;
}

#[tokio::test]
async fn test_monthly_history_limited_to_twelve_newest() {
    let store = Arc::new(MemoryStore::new());
    seed_servers(store.as_ref(), &default_roster(), Utc::now())
        .await
        .unwrap();

    // fourteen archived months, written oldest first
    for offset in 0..14u32 {
        let year = 2024 + (offset / 12) as i32;
        let month = offset % 12 + 1;
        store
            .write_history(&MonthlyUptimeHistory {
                server_name: "Web Server".to_string(),
                year,
                month,
                days: 30,
                uptime_percentage: 99.0,
                downtime_minutes: 0,
                incident_count: 0,
            })
            .await
            .unwrap();
    }

    let engine = UptimeEngineHandle::spawn(store);
    let history = engine.monthly_history("Web Server").await.unwrap();

    assert_eq!(history.len(), 12);
    assert_eq!((history[0].year, history[0].month), (2025, 2));
    assert_eq!((history[11].year, history[11].month), (2024, 3));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_dropping_last_handle_stops_engine() {
    let store = Arc::new(MemoryStore::new());
    let engine = UptimeEngineHandle::spawn(store);
    let mut snapshots = engine.subscribe().await.unwrap();

    // no explicit shutdown; the engine must notice the closed command channel
    drop(engine);

    let closed = timeout(EVENT_TIMEOUT, async {
        loop {
            if let Err(tokio::sync::broadcast::error::RecvError::Closed) = snapshots.recv().await {
                break;
            }
        }
    })
    .await;

    assert!(closed.is_ok(), "engine task kept running after all handles were dropped");
}

#[tokio::test]
async fn test_history_for_unknown_server_is_empty() {
    let store = Arc::new(MemoryStore::new());
    let engine = UptimeEngineHandle::spawn(store);

    let history = engine.monthly_history("Ghost Server").await.unwrap();
    assert!(history.is_empty());

    engine.shutdown().await;
}
