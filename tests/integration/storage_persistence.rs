//! Rollover over the SQLite store, including reopen-after-close

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use uptime_accounting::rollover::RolloverManager;
use uptime_accounting::seed::{DEFAULT_ROSTER, seed_servers};
use uptime_accounting::store::{RecordStore, SqliteStore};

use crate::helpers::{create_test_incident, month_start};

fn default_roster() -> Vec<String> {
    DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_rollover_against_sqlite() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SqliteStore::new(temp_dir.path().join("uptime.db"))
            .await
            .unwrap(),
    );

    // seed at March, then let April arrive with one March outage on record
    let seeded_at = Utc.with_ymd_and_hms(2025, 3, 5, 9, 0, 0).unwrap();
    seed_servers(store.as_ref(), &default_roster(), seeded_at)
        .await
        .unwrap();
    store
        .create_incident(&create_test_incident(
            "Database Server",
            month_start(2025, 3) + Duration::days(12),
            "3h 20m",
        ))
        .await
        .unwrap();

    let manager = RolloverManager::new(store.clone());
    let now = Utc.with_ymd_and_hms(2025, 4, 2, 7, 30, 0).unwrap();
    let resolved = manager.resolve_all(now).await.unwrap();

    assert_eq!(resolved.len(), 4);
    assert!(
        resolved
            .iter()
            .all(|s| s.current_month_start == month_start(2025, 4))
    );
    assert!(resolved.iter().all(|s| s.uptime_percentage == 100.0));

    // every server archived March; only the database server has downtime
    for server in &resolved {
        let history = store.list_history(&server.server_name, 12).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!((history[0].year, history[0].month), (2025, 3));
        assert_eq!(history[0].days, 31);
    }

    let db_history = store.list_history("Database Server", 12).await.unwrap();
    assert_eq!(db_history[0].downtime_minutes, 200);
    // 200 minutes over 44640 -> 99.55% -> 99.6
    assert_eq!(db_history[0].uptime_percentage, 99.6);
    assert_eq!(db_history[0].incident_count, 1);

    // second pass changes nothing
    manager.resolve_all(now).await.unwrap();
    let db_history = store.list_history("Database Server", 12).await.unwrap();
    assert_eq!(db_history.len(), 1);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("uptime.db");

    {
        let store = SqliteStore::new(&db_path).await.unwrap();
        seed_servers(&store, &default_roster(), Utc::now())
            .await
            .unwrap();
        store
            .create_incident(&create_test_incident("Web Server", Utc::now(), "45m"))
            .await
            .unwrap();
        store.close().await.unwrap();
    }

    let reopened = SqliteStore::new(&db_path).await.unwrap();
    assert_eq!(reopened.list_servers().await.unwrap().len(), 4);

    let incidents = reopened
        .list_incidents(Default::default())
        .await
        .unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].duration, "45m");
}
