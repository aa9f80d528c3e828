//! Month-boundary rollover scenarios against the in-memory store

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use uptime_accounting::rollover::RolloverManager;
use uptime_accounting::store::{MemoryStore, RecordStore};

use crate::helpers::{create_test_incident, create_test_server, init_tracing, month_start};

#[tokio::test]
async fn test_month_boundary_archives_and_resets() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());

    // tracked month is March, "now" is April
    store
        .write_server(&create_test_server("Mail Server", month_start(2025, 3)))
        .await
        .unwrap();
    store
        .create_incident(&create_test_incident(
            "Mail Server",
            month_start(2025, 3) + Duration::days(9),
            "2h 0m",
        ))
        .await
        .unwrap();

    let manager = RolloverManager::new(store.clone());
    let now = Utc.with_ymd_and_hms(2025, 4, 3, 10, 0, 0).unwrap();
    let resolved = manager.resolve_all(now).await.unwrap();

    // server reset to the new month at the 100% baseline
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].uptime_percentage, 100.0);
    assert_eq!(resolved[0].current_month_start, month_start(2025, 4));
    assert_eq!(resolved[0].last_checked, now);

    // exactly one archived row for March with correct day count
    let history = store.list_history("Mail Server", 12).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].year, history[0].month), (2025, 3));
    assert_eq!(history[0].days, 31);
    assert_eq!(history[0].downtime_minutes, 120);
    assert_eq!(history[0].incident_count, 1);
    // 120 minutes over 44640 -> 99.73% -> 99.7
    assert_eq!(history[0].uptime_percentage, 99.7);
}

#[tokio::test]
async fn test_rollover_is_idempotent() {
    let store = Arc::new(MemoryStore::new());

    store
        .write_server(&create_test_server("Web Server", month_start(2025, 3)))
        .await
        .unwrap();

    let manager = RolloverManager::new(store.clone());
    let now = Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap();

    manager.resolve_all(now).await.unwrap();
    manager.resolve_all(now).await.unwrap();

    let history = store.list_history("Web Server", 12).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_multi_month_gap_archives_every_skipped_month() {
    let store = Arc::new(MemoryStore::new());

    // last touched in December 2024, resolved again in April 2025
    store
        .write_server(&create_test_server("File Server", month_start(2024, 12)))
        .await
        .unwrap();
    store
        .create_incident(&create_test_incident(
            "File Server",
            month_start(2025, 2) + Duration::days(3),
            "5h 30m",
        ))
        .await
        .unwrap();

    let manager = RolloverManager::new(store.clone());
    let now = Utc.with_ymd_and_hms(2025, 4, 20, 0, 0, 0).unwrap();
    manager.resolve_all(now).await.unwrap();

    let history = store.list_history("File Server", 12).await.unwrap();
    assert_eq!(history.len(), 4);
    // newest first
    assert_eq!((history[0].year, history[0].month), (2025, 3));
    assert_eq!((history[1].year, history[1].month), (2025, 2));
    assert_eq!((history[2].year, history[2].month), (2025, 1));
    assert_eq!((history[3].year, history[3].month), (2024, 12));

    // incident-free months archive at the healthy baseline
    assert_eq!(history[0].uptime_percentage, 100.0);
    assert_eq!(history[3].uptime_percentage, 100.0);

    // February carries the outage: 330 minutes over 28*1440 = 40320 -> 99.2
    assert_eq!(history[1].downtime_minutes, 330);
    assert_eq!(history[1].uptime_percentage, 99.2);
}

#[tokio::test]
async fn test_live_refresh_updates_percentage() {
    let store = Arc::new(MemoryStore::new());

    let now = Utc.with_ymd_and_hms(2025, 4, 15, 12, 0, 0).unwrap();
    store
        .write_server(&create_test_server("Mail Server", month_start(2025, 4)))
        .await
        .unwrap();
    store
        .create_incident(&create_test_incident(
            "Mail Server",
            month_start(2025, 4) + Duration::days(2),
            "1h 15m",
        ))
        .await
        .unwrap();

    let manager = RolloverManager::new(store.clone());
    let resolved = manager.resolve_all(now).await.unwrap();

    // 75 minutes over 43200 -> 99.8, persisted
    assert_eq!(resolved[0].uptime_percentage, 99.8);
    let stored = store.list_servers().await.unwrap();
    assert_eq!(stored[0].uptime_percentage, 99.8);
}

#[tokio::test]
async fn test_dead_band_suppresses_redundant_writes() {
    let store = Arc::new(MemoryStore::new());

    let now = Utc.with_ymd_and_hms(2025, 4, 15, 12, 0, 0).unwrap();
    let mut server = create_test_server("Mail Server", month_start(2025, 4));
    server.uptime_percentage = 99.8;
    store.write_server(&server).await.unwrap();
    store
        .create_incident(&create_test_incident(
            "Mail Server",
            month_start(2025, 4) + Duration::days(2),
            "1h 15m",
        ))
        .await
        .unwrap();

    // stored and recomputed both 99.8: within the dead-band, no write
    let mut servers_rx = store.subscribe_servers();
    let manager = RolloverManager::new(store.clone());
    let resolved = manager.resolve_all(now).await.unwrap();

    assert_eq!(resolved[0].uptime_percentage, 99.8);
    assert!(servers_rx.try_recv().is_err());

    // last_checked untouched because nothing was persisted
    let stored = store.list_servers().await.unwrap();
    assert_eq!(stored[0].last_checked, month_start(2025, 4));
}

#[tokio::test]
async fn test_ongoing_incident_does_not_reduce_uptime() {
    let store = Arc::new(MemoryStore::new());

    let now = Utc.with_ymd_and_hms(2025, 4, 15, 12, 0, 0).unwrap();
    store
        .write_server(&create_test_server("Web Server", month_start(2025, 4)))
        .await
        .unwrap();
    store
        .create_incident(&create_test_incident(
            "Web Server",
            month_start(2025, 4) + Duration::days(1),
            "Ongoing",
        ))
        .await
        .unwrap();

    let manager = RolloverManager::new(store.clone());
    let resolved = manager.resolve_all(now).await.unwrap();

    assert_eq!(resolved[0].uptime_percentage, 100.0);
}
