//! Notification history — the audit trail of what each run decided.
//!
//! RULE: Every evaluated employee leaves at least one history event per run,
//! whether or not anything was sent. Variants are only ever added.

use crate::{
    plan::{EntryKind, RunReport, RunWarning, SuppressReason},
    routing::Recipients,
    schedule::RunMode,
    threshold::Severity,
    types::{EmployeeId, RunId, YearMonth},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    Planned {
        employee_id: EmployeeId,
        kind:        EntryKind,
        mode:        RunMode,
        severity:    Severity,
        percent:     f64,
        recipients:  Recipients,
    },
    NotNotified {
        employee_id: EmployeeId,
        percent:     f64,
        reason:      SuppressReason,
    },
    Warning {
        warning: RunWarning,
    },
}

/// A row of the notify_history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id:          Option<i64>,
    pub run_id:      RunId,
    pub month:       YearMonth,
    pub employee_id: EmployeeId,
    pub kind:        String,
    pub payload:     String,
    pub recorded_at: String,
}

/// Stable string name for the kind column.
pub fn event_kind_name(event: &HistoryEvent) -> &'static str {
    match event {
        HistoryEvent::Planned { kind: EntryKind::Ordinary, .. }       => "planned_ordinary",
        HistoryEvent::Planned { kind: EntryKind::SelfEscalation, .. } => "planned_self_escalation",
        HistoryEvent::Planned { kind: EntryKind::Forced, .. }         => "planned_forced",
        HistoryEvent::NotNotified { .. }                              => "not_notified",
        HistoryEvent::Warning { .. }                                  => "warning",
    }
}

fn warning_subject(warning: &RunWarning) -> &str {
    match warning {
        RunWarning::StateReadFailed { .. } => "",
        RunWarning::StateWriteFailed { employee_id, .. }
        | RunWarning::RecipientGap { employee_id, .. }
        | RunWarning::RecordSkipped { employee_id, .. } => employee_id.as_str(),
    }
}

/// Flatten a run report into history events, in plan order.
pub fn history_events(report: &RunReport) -> Vec<(EmployeeId, HistoryEvent)> {
    let planned = report.entries.iter().map(|e| {
        (
            e.employee_id().to_string(),
            HistoryEvent::Planned {
                employee_id: e.employee_id().to_string(),
                kind:        e.kind,
                mode:        e.mode,
                severity:    e.severity(),
                percent:     e.snapshot.percent,
                recipients:  e.recipients.clone(),
            },
        )
    });
    let quiet = report.suppressed.iter().map(|s| {
        (
            s.employee_id.clone(),
            HistoryEvent::NotNotified {
                employee_id: s.employee_id.clone(),
                percent:     s.percent,
                reason:      s.reason,
            },
        )
    });
    let warnings = report.warnings.iter().map(|w| {
        (
            warning_subject(w).to_string(),
            HistoryEvent::Warning { warning: w.clone() },
        )
    });
    planned.chain(quiet).chain(warnings).collect()
}

/// Build the rows to append for a finished run.
pub fn history_records(report: &RunReport, recorded_at: &str) -> serde_json::Result<Vec<HistoryRecord>> {
    history_events(report)
        .into_iter()
        .map(|(employee_id, event)| {
            Ok(HistoryRecord {
                id: None,
                run_id: report.run_id.clone(),
                month: report.month,
                employee_id,
                kind: event_kind_name(&event).to_string(),
                payload: serde_json::to_string(&event)?,
                recorded_at: recorded_at.to_string(),
            })
        })
        .collect()
}
