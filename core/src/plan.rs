//! The notification plan — the engine's only output.
//!
//! A plan is an ordered list of entries, one per (employee, report kind),
//! plus the warnings raised while building it. Delivery and message
//! rendering happen downstream.

use crate::{
    ledger::NotifyMarker,
    routing::Recipients,
    schedule::{RunDecision, RunMode},
    threshold::Severity,
    types::{DepartmentCode, EmployeeId, RecipientId, RunId, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A newly reached severity step.
    Ordinary,
    /// The employee crossed the forced self-notify threshold.
    SelfEscalation,
    /// Part of the weekly whole-roster report.
    Forced,
}

/// Figures a notifier needs to render one employee's report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeSnapshot {
    pub employee_id:        EmployeeId,
    pub name:               String,
    pub department:         DepartmentCode,
    pub month:              YearMonth,
    pub minutes:            u32,
    pub previous_minutes:   Option<u32>,
    pub ceiling_minutes:    u32,
    /// minutes / ceiling × 100, unrounded.
    pub percent:            f64,
    pub severity:           Severity,
    /// Rounded percentage of last month's total; 0 when last month is 0 or unknown.
    pub percent_vs_last:    u32,
    /// Negative once over the ceiling.
    pub remaining_minutes:  i64,
}

impl EmployeeSnapshot {
    pub fn is_over_ceiling(&self) -> bool {
        self.minutes > self.ceiling_minutes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub kind:            EntryKind,
    pub mode:            RunMode,
    pub recipients:      Recipients,
    pub snapshot:        EmployeeSnapshot,
    /// True when no recipient could be resolved (configuration gap).
    pub recipient_gap:   bool,
    /// False when the entry's state marker could not be persisted;
    /// a later run may send it again.
    pub state_persisted: bool,
}

impl PlanEntry {
    pub fn employee_id(&self) -> &str {
        &self.snapshot.employee_id
    }

    pub fn severity(&self) -> Severity {
        self.snapshot.severity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SuppressReason {
    BelowThreshold,
    AlreadyNotified { severity: Severity },
}

/// An evaluated employee who got no ordinary entry this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suppressed {
    pub employee_id: EmployeeId,
    pub percent:     f64,
    #[serde(flatten)]
    pub reason:      SuppressReason,
}

/// Recoverable problems. None of these abort the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunWarning {
    StateReadFailed {
        month:  YearMonth,
        reason: String,
    },
    StateWriteFailed {
        employee_id: EmployeeId,
        marker:      NotifyMarker,
        reason:      String,
    },
    RecipientGap {
        employee_id: EmployeeId,
        department:  DepartmentCode,
    },
    RecordSkipped {
        employee_id: EmployeeId,
        reason:      String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id:     RunId,
    pub month:      YearMonth,
    pub decision:   RunDecision,
    pub entries:    Vec<PlanEntry>,
    pub suppressed: Vec<Suppressed>,
    pub evaluated:  Vec<EmployeeSnapshot>,
    pub warnings:   Vec<RunWarning>,
}

impl RunReport {
    pub fn entries_for<'a>(&'a self, employee_id: &'a str) -> impl Iterator<Item = &'a PlanEntry> + 'a {
        self.entries.iter().filter(move |e| e.employee_id() == employee_id)
    }

    pub fn has_gaps(&self) -> bool {
        self.entries.iter().any(|e| e.recipient_gap)
    }
}

/// Regroup entries per recipient, keeping plan order within each group.
/// Each recipient gets one message covering every employee routed to them.
pub fn digest_by_recipient(entries: &[PlanEntry]) -> BTreeMap<RecipientId, Vec<&PlanEntry>> {
    let mut digest: BTreeMap<RecipientId, Vec<&PlanEntry>> = BTreeMap::new();
    for entry in entries {
        for recipient in entry.recipients.all() {
            digest.entry(recipient).or_default().push(entry);
        }
    }
    digest
}
