//! Notification history — every decision of a run lands in notify_history.

use chrono::NaiveDate;
use overtime_core::{
    config::NotifyConfig,
    engine::DecisionEngine,
    event::{history_records, HistoryEvent},
    ledger::NotificationLedger,
    plan::{digest_by_recipient, EntryKind},
    results::results_path,
    schedule::RunDecision,
    source::RawOvertimeRow,
    store::SqliteStore,
};

fn row(id: &str, dept: &str, minutes: i64) -> RawOvertimeRow {
    RawOvertimeRow {
        employee_id: id.into(),
        name: format!("Employee {id}"),
        department: dept.into(),
        chat_id: None,
        minutes: Some(minutes),
        previous_minutes: None,
    }
}

#[test]
fn run_history_records_sent_and_quiet_employees() {
    let store = SqliteStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let config = NotifyConfig::default_test();
    let now = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap().and_hms_opt(10, 0, 0).unwrap();

    let report = {
        let mut ledger = NotificationLedger::new(Box::new(&store));
        DecisionEngine::new(&config)
            .run(
                "hist-run".into(),
                now,
                RunDecision::threshold(),
                vec![row("2002", "300", 540), row("3003", "400", 10)],
                &mut ledger,
            )
            .expect("run")
    };

    store
        .insert_run("hist-run", "2026-10", "threshold", "2026-10-15 10:00", "0.1.0-test")
        .unwrap();
    assert_eq!(store.run_count().unwrap(), 1);

    for record in history_records(&report, "2026-10-15 10:00").unwrap() {
        store.append_history(&record).unwrap();
    }

    let history = store.history_for_run("hist-run").unwrap();
    let kinds: Vec<&str> = history.iter().map(|h| h.kind.as_str()).collect();
    assert_eq!(kinds, vec!["planned_ordinary", "not_notified"]);
    assert_eq!(history[1].employee_id, "3003");
    assert!(history.iter().all(|h| h.month == report.month));

    let event: HistoryEvent = serde_json::from_str(&history[0].payload).unwrap();
    assert!(matches!(event, HistoryEvent::Planned { kind: EntryKind::Ordinary, .. }));
}

#[test]
fn digest_groups_every_employee_under_each_recipient() {
    let store = SqliteStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let config = NotifyConfig::default_test();
    let now = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap().and_hms_opt(10, 0, 0).unwrap();
    let mut ledger = NotificationLedger::new(Box::new(&store));
    let report = DecisionEngine::new(&config)
        .run(
            "digest-run".into(),
            now,
            RunDecision::threshold(),
            vec![row("2002", "300", 540), row("3003", "400", 1200)],
            &mut ledger,
        )
        .expect("run");

    let digest = digest_by_recipient(&report.entries);
    assert_eq!(digest["hr@example.com"].len(), 2, "catch-all sees everyone");
    assert_eq!(digest["lead300@example.com"].len(), 1);
    assert_eq!(digest["lead400@example.com"][0].employee_id(), "3003");
}

#[test]
fn unwritable_cache_does_not_stop_history_or_lose_the_plan() {
    let store = SqliteStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let config = NotifyConfig::default_test();
    let now = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap().and_hms_opt(10, 0, 0).unwrap();
    let report = {
        let mut ledger = NotificationLedger::new(Box::new(&store));
        DecisionEngine::new(&config)
            .run("blocked-run".into(), now, RunDecision::threshold(), vec![row("2002", "300", 540)], &mut ledger)
            .expect("run")
    };
    assert_eq!(report.entries.len(), 1);

    // A regular file where the cache directory should be.
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let failures = store.archive_run(&report, &blocker, "2026-10-15 10:00");
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("results cache"), "{failures:?}");

    let history = store.history_for_run("blocked-run").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, "planned_ordinary");

    let cache = dir.path().join("cache");
    assert!(store.archive_run(&report, &cache, "2026-10-15 10:05").is_empty());
    assert!(results_path(&cache, report.month).exists());
}
