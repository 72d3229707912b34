//! Notification state — which markers each employee has already been sent
//! this month.
//!
//! RULE: The ledger is the only thing the engine asks "already sent?".
//! Backends (SQLite, flag files) sit behind StateBackend and are never
//! called by the engine directly.
//!
//! Reads happen once per month key, on first use. A failed or corrupt read
//! leaves that month empty and records a warning: a duplicate notification
//! is preferred over a lost one. Writes go to memory first, then through to
//! the backend one key at a time, so a later read in the same run always
//! sees the mark even when persisting it failed.

use crate::{
    error::OvertimeResult,
    plan::RunWarning,
    threshold::Severity,
    types::{EmployeeId, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// What was sent. Ordinary severity steps and the forced self-escalation
/// are tracked as separate markers under the same employee+month key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMarker {
    Level(Severity),
    SelfEscalation,
}

const SELF_ESCALATION_KEY: &str = "self_escalation";

impl NotifyMarker {
    /// Stable storage key: "60" … "100", or "self_escalation".
    pub fn as_key(&self) -> String {
        match self {
            NotifyMarker::Level(s) => s.percent().map(|p| p.to_string()).unwrap_or_default(),
            NotifyMarker::SelfEscalation => SELF_ESCALATION_KEY.to_string(),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        if key == SELF_ESCALATION_KEY {
            return Some(NotifyMarker::SelfEscalation);
        }
        key.parse::<u32>()
            .ok()
            .and_then(Severity::from_step)
            .map(NotifyMarker::Level)
    }
}

impl fmt::Display for NotifyMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateEntry {
    pub employee_id: EmployeeId,
    pub month:       YearMonth,
    pub marker:      NotifyMarker,
}

/// Persistence contract for notification state.
pub trait StateBackend {
    /// Every entry recorded for `month`. Errors mean the month's prior
    /// state could not be read at all.
    fn load_month(&self, month: YearMonth) -> OvertimeResult<Vec<StateEntry>>;

    /// Record one entry. Must be an idempotent upsert on the entry's key.
    fn upsert(&self, entry: &StateEntry) -> OvertimeResult<()>;

    /// Drop every entry for months strictly before `month`.
    /// Returns the number of entries removed.
    fn purge_before(&self, month: YearMonth) -> OvertimeResult<usize>;
}

/// Lets a caller keep using a store it lends to the ledger.
impl<T: StateBackend + ?Sized> StateBackend for &T {
    fn load_month(&self, month: YearMonth) -> OvertimeResult<Vec<StateEntry>> {
        (**self).load_month(month)
    }

    fn upsert(&self, entry: &StateEntry) -> OvertimeResult<()> {
        (**self).upsert(entry)
    }

    fn purge_before(&self, month: YearMonth) -> OvertimeResult<usize> {
        (**self).purge_before(month)
    }
}

type MonthState = HashSet<(EmployeeId, NotifyMarker)>;

pub struct NotificationLedger<'a> {
    backend:  Box<dyn StateBackend + 'a>,
    months:   HashMap<YearMonth, MonthState>,
    warnings: Vec<RunWarning>,
}

impl<'a> NotificationLedger<'a> {
    pub fn new(backend: Box<dyn StateBackend + 'a>) -> Self {
        Self {
            backend,
            months: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    fn month_state(&mut self, month: YearMonth) -> &mut MonthState {
        if !self.months.contains_key(&month) {
            let state = match self.backend.load_month(month) {
                Ok(entries) => {
                    log::debug!("Loaded {} notification markers for {month}", entries.len());
                    entries
                        .into_iter()
                        .filter(|e| e.month == month)
                        .map(|e| (e.employee_id, e.marker))
                        .collect()
                }
                Err(e) => {
                    log::warn!("Notification state for {month} unreadable, starting empty: {e}");
                    self.warnings.push(RunWarning::StateReadFailed {
                        month,
                        reason: e.to_string(),
                    });
                    MonthState::new()
                }
            };
            self.months.insert(month, state);
        }
        self.months.entry(month).or_default()
    }

    pub fn has_notified(&mut self, employee_id: &str, month: YearMonth, marker: NotifyMarker) -> bool {
        self.month_state(month)
            .contains(&(employee_id.to_string(), marker))
    }

    /// Record `marker` as sent. The in-memory mark always sticks; an error
    /// means only that persisting it failed.
    pub fn mark_notified(
        &mut self,
        employee_id: &str,
        month:       YearMonth,
        marker:      NotifyMarker,
    ) -> OvertimeResult<()> {
        let inserted = self
            .month_state(month)
            .insert((employee_id.to_string(), marker));
        if !inserted {
            return Ok(());
        }
        self.backend.upsert(&StateEntry {
            employee_id: employee_id.to_string(),
            month,
            marker,
        })
    }

    /// Drop state for months strictly before `month`.
    pub fn reset(&mut self, month: YearMonth) -> OvertimeResult<usize> {
        self.months.retain(|m, _| *m >= month);
        let removed = self.backend.purge_before(month)?;
        if removed > 0 {
            log::info!("Purged {removed} notification markers older than {month}");
        }
        Ok(removed)
    }

    /// Warnings raised while reading state since the last drain.
    pub fn drain_warnings(&mut self) -> Vec<RunWarning> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OvertimeError;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Backend whose reads and writes can be made to fail.
    #[derive(Default, Clone)]
    struct FlakyBackend {
        entries:    Rc<RefCell<Vec<StateEntry>>>,
        fail_read:  bool,
        fail_write: bool,
    }

    impl StateBackend for FlakyBackend {
        fn load_month(&self, month: YearMonth) -> OvertimeResult<Vec<StateEntry>> {
            if self.fail_read {
                return Err(OvertimeError::CorruptState { reason: "garbage".into() });
            }
            Ok(self.entries.borrow().iter().filter(|e| e.month == month).cloned().collect())
        }

        fn upsert(&self, entry: &StateEntry) -> OvertimeResult<()> {
            if self.fail_write {
                return Err(OvertimeError::CorruptState { reason: "disk full".into() });
            }
            let mut entries = self.entries.borrow_mut();
            if !entries.contains(entry) {
                entries.push(entry.clone());
            }
            Ok(())
        }

        fn purge_before(&self, month: YearMonth) -> OvertimeResult<usize> {
            let mut entries = self.entries.borrow_mut();
            let before = entries.len();
            entries.retain(|e| e.month >= month);
            Ok(before - entries.len())
        }
    }

    const OCT: YearMonth = YearMonth { year: 2026, month: 10 };
    const P90: NotifyMarker = NotifyMarker::Level(Severity::P90);

    #[test]
    fn marker_keys_round_trip() {
        for key in ["60", "70", "80", "90", "100", "self_escalation"] {
            assert_eq!(NotifyMarker::from_key(key).unwrap().as_key(), key);
        }
        assert_eq!(NotifyMarker::from_key("95"), None);
        assert_eq!(NotifyMarker::from_key("none"), None);
    }

    #[test]
    fn mark_then_check_is_true_and_idempotent() {
        let backend = FlakyBackend::default();
        let mut ledger = NotificationLedger::new(Box::new(backend.clone()));
        assert!(!ledger.has_notified("1001", OCT, P90));
        ledger.mark_notified("1001", OCT, P90).unwrap();
        ledger.mark_notified("1001", OCT, P90).unwrap();
        assert!(ledger.has_notified("1001", OCT, P90));
        assert!(!ledger.has_notified("1001", OCT, NotifyMarker::SelfEscalation));
        assert_eq!(backend.entries.borrow().len(), 1);
    }

    #[test]
    fn new_month_starts_empty() {
        let mut ledger = NotificationLedger::new(Box::new(FlakyBackend::default()));
        ledger.mark_notified("1001", OCT, P90).unwrap();
        assert!(!ledger.has_notified("1001", YearMonth::new(2026, 11), P90));
    }

    #[test]
    fn failed_read_falls_back_to_empty_with_warning() {
        let backend = FlakyBackend { fail_read: true, ..Default::default() };
        let mut ledger = NotificationLedger::new(Box::new(backend));
        assert!(!ledger.has_notified("1001", OCT, P90));
        let warnings = ledger.drain_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], RunWarning::StateReadFailed { month, .. } if month == OCT));
        // The month is read once; no second warning.
        assert!(!ledger.has_notified("2002", OCT, P90));
        assert!(ledger.drain_warnings().is_empty());
    }

    #[test]
    fn failed_write_still_marks_in_memory() {
        let backend = FlakyBackend { fail_write: true, ..Default::default() };
        let mut ledger = NotificationLedger::new(Box::new(backend));
        assert!(ledger.mark_notified("1001", OCT, P90).is_err());
        assert!(ledger.has_notified("1001", OCT, P90));
    }

    #[test]
    fn reset_drops_only_older_months() {
        let backend = FlakyBackend::default();
        let mut ledger = NotificationLedger::new(Box::new(backend.clone()));
        let sep = YearMonth::new(2026, 9);
        ledger.mark_notified("1001", sep, P90).unwrap();
        ledger.mark_notified("1001", OCT, P90).unwrap();
        assert_eq!(ledger.reset(OCT).unwrap(), 1);
        assert!(ledger.has_notified("1001", OCT, P90));
        assert!(!ledger.has_notified("1001", sep, P90));
    }
}
