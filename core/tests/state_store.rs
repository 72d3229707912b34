//! Notification state persistence — SQLite and flag-file backends behind the ledger.

use overtime_core::{
    flag_store::FlagFileStore,
    ledger::{NotificationLedger, NotifyMarker, StateBackend, StateEntry},
    plan::RunWarning,
    store::SqliteStore,
    threshold::Severity,
    types::YearMonth,
};

const SEP: YearMonth = YearMonth { year: 2026, month: 9 };
const OCT: YearMonth = YearMonth { year: 2026, month: 10 };
const P80: NotifyMarker = NotifyMarker::Level(Severity::P80);

fn sqlite() -> SqliteStore {
    let store = SqliteStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

#[test]
fn sqlite_upsert_is_idempotent() {
    let store = sqlite();
    let entry = StateEntry { employee_id: "1001".into(), month: OCT, marker: P80 };
    store.upsert(&entry).unwrap();
    store.upsert(&entry).unwrap();
    assert_eq!(store.state_count(OCT).unwrap(), 1);
    assert_eq!(store.load_month(OCT).unwrap(), vec![entry]);
}

#[test]
fn sqlite_purge_keeps_current_month() {
    let store = sqlite();
    for month in [SEP, OCT] {
        store
            .upsert(&StateEntry { employee_id: "1001".into(), month, marker: P80 })
            .unwrap();
    }
    assert_eq!(store.purge_before(OCT).unwrap(), 1);
    assert_eq!(store.state_count(SEP).unwrap(), 0);
    assert_eq!(store.state_count(OCT).unwrap(), 1);
}

/// Migrating twice must be harmless: every run migrates on start.
#[test]
fn migrate_is_repeatable() {
    let store = sqlite();
    store.migrate().expect("second migration");
}

#[test]
fn ledger_marks_survive_into_the_next_run() {
    let store = sqlite();
    {
        let mut ledger = NotificationLedger::new(Box::new(&store));
        ledger.mark_notified("1001", OCT, P80).unwrap();
    }
    let mut ledger = NotificationLedger::new(Box::new(&store));
    assert!(ledger.has_notified("1001", OCT, P80));
    assert!(!ledger.has_notified("1001", OCT, NotifyMarker::SelfEscalation));
}

#[test]
fn corrupt_flag_file_falls_back_to_empty_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let files = FlagFileStore::new(dir.path()).unwrap();
    std::fs::write(files.path_for(OCT), "{{{").unwrap();

    let mut ledger = NotificationLedger::new(Box::new(files));
    assert!(!ledger.has_notified("1001", OCT, P80));
    let warnings = ledger.drain_warnings();
    assert!(matches!(warnings.as_slice(), [RunWarning::StateReadFailed { month, .. }] if *month == OCT));

    // Writing after a corrupt read replaces the file with good state.
    ledger.mark_notified("1001", OCT, P80).unwrap();
    let reread = FlagFileStore::new(dir.path()).unwrap();
    assert_eq!(reread.load_month(OCT).unwrap().len(), 1);
}

#[test]
fn flag_file_ledger_reset_removes_old_months() {
    let dir = tempfile::tempdir().unwrap();
    let files = FlagFileStore::new(dir.path()).unwrap();
    let sep_path = files.path_for(SEP);
    let mut ledger = NotificationLedger::new(Box::new(files));
    ledger.mark_notified("1001", SEP, P80).unwrap();
    ledger.mark_notified("1001", OCT, P80).unwrap();

    assert_eq!(ledger.reset(OCT).unwrap(), 1);
    assert!(!sep_path.exists());
    assert!(ledger.has_notified("1001", OCT, P80));
}
