//! The decision engine — turns one run's overtime rows into a notification plan.
//!
//! EXECUTION ORDER (per run):
//!   1. Validate rows; skip malformed or duplicate employees.
//!   2. Resolve every ceiling up front. One unresolvable department aborts
//!      the run before any employee is evaluated.
//!   3. Per employee, in row order:
//!        FORCED    → one entry to managers (+ self if allowed). No state writes.
//!        THRESHOLD → one ordinary entry for a newly reached step, then mark it;
//!                    plus one self-escalation entry the first time the forced
//!                    self-notify threshold is crossed this month.
//!
//! RULES:
//!   - Single-threaded, sequential. State writes happen in decision order.
//!   - Forced runs never touch notification state.
//!   - Persistence failures never block an entry; they are flagged on it.

use crate::{
    config::NotifyConfig,
    error::{OvertimeError, OvertimeResult},
    ledger::{NotificationLedger, NotifyMarker},
    plan::{EmployeeSnapshot, EntryKind, PlanEntry, RunReport, RunWarning, SuppressReason, Suppressed},
    routing::{RecipientRouter, Recipients},
    schedule::{RunDecision, RunMode},
    source::{OvertimeRecord, RawOvertimeRow},
    threshold::{evaluate, rounded_percent},
    types::{RunId, YearMonth},
};
use chrono::NaiveDateTime;
use std::collections::HashSet;

pub struct DecisionEngine<'a> {
    config: &'a NotifyConfig,
    router: RecipientRouter<'a>,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(config: &'a NotifyConfig) -> Self {
        Self {
            config,
            router: RecipientRouter::new(config),
        }
    }

    /// Build the plan for one run.
    ///
    /// Errors only on a fatal configuration gap (missing ceiling with no
    /// default). Every other problem lands in `RunReport::warnings`.
    pub fn run(
        &self,
        run_id:   RunId,
        now:      NaiveDateTime,
        decision: RunDecision,
        rows:     Vec<RawOvertimeRow>,
        ledger:   &mut NotificationLedger<'_>,
    ) -> OvertimeResult<RunReport> {
        let month = YearMonth::of(now.date());
        let mut warnings = Vec::new();
        let records = self.validate(rows, month, &mut warnings);

        let ceilings = records
            .iter()
            .map(|r| {
                self.config
                    .ceiling_for(&r.department)
                    .ok_or_else(|| OvertimeError::MissingCeiling {
                        department: r.department.clone(),
                    })
            })
            .collect::<OvertimeResult<Vec<u32>>>()?;

        log::info!(
            "Run {run_id}: {} employees for {month} in {:?} mode",
            records.len(),
            decision.mode
        );

        let mut report = RunReport {
            run_id,
            month,
            decision,
            entries: Vec::new(),
            suppressed: Vec::new(),
            evaluated: Vec::with_capacity(records.len()),
            warnings: Vec::new(),
        };

        for (record, ceiling) in records.iter().zip(ceilings) {
            let snapshot = snapshot(record, ceiling);
            match decision.mode {
                RunMode::Forced => self.plan_forced(record, &snapshot, &mut report, &mut warnings),
                RunMode::Threshold => {
                    self.plan_threshold(record, &snapshot, ledger, &mut report, &mut warnings)
                }
            }
            report.evaluated.push(snapshot);
        }

        // Read failures first: they explain any duplicates that follow.
        report.warnings = ledger.drain_warnings();
        report.warnings.extend(warnings);

        log::info!(
            "Run {}: {} plan entries, {} suppressed, {} warnings",
            report.run_id,
            report.entries.len(),
            report.suppressed.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    fn validate(
        &self,
        rows:     Vec<RawOvertimeRow>,
        month:    YearMonth,
        warnings: &mut Vec<RunWarning>,
    ) -> Vec<OvertimeRecord> {
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let employee_id = row.employee_id.clone();
            match row.validate(month) {
                Ok(record) if !seen.insert(record.employee_id.clone()) => {
                    log::warn!("Skipping duplicate row for employee {}", record.employee_id);
                    warnings.push(RunWarning::RecordSkipped {
                        employee_id: record.employee_id,
                        reason: "duplicate row".into(),
                    });
                }
                Ok(record) => records.push(record),
                Err(reason) => {
                    log::warn!("Skipping employee {employee_id:?}: {reason}");
                    warnings.push(RunWarning::RecordSkipped { employee_id, reason });
                }
            }
        }
        records
    }

    fn plan_forced(
        &self,
        record:   &OvertimeRecord,
        snapshot: &EmployeeSnapshot,
        report:   &mut RunReport,
        warnings: &mut Vec<RunWarning>,
    ) {
        let recipients = self.router.resolve(
            &record.department,
            &record.employee_id,
            record.chat_id.as_deref(),
            RunMode::Forced,
            snapshot.severity,
        );
        let entry = self.entry(EntryKind::Forced, RunMode::Forced, recipients, snapshot, warnings);
        report.entries.push(entry);
    }

    fn plan_threshold(
        &self,
        record:   &OvertimeRecord,
        snapshot: &EmployeeSnapshot,
        ledger:   &mut NotificationLedger<'_>,
        report:   &mut RunReport,
        warnings: &mut Vec<RunWarning>,
    ) {
        let severity = snapshot.severity;
        let id = &record.employee_id;
        let month = record.month;

        if !severity.is_notifiable() {
            report.suppressed.push(Suppressed {
                employee_id: id.clone(),
                percent: snapshot.percent,
                reason: SuppressReason::BelowThreshold,
            });
        } else if ledger.has_notified(id, month, NotifyMarker::Level(severity)) {
            log::debug!("{id} already notified at {severity} for {month}");
            report.suppressed.push(Suppressed {
                employee_id: id.clone(),
                percent: snapshot.percent,
                reason: SuppressReason::AlreadyNotified { severity },
            });
        } else {
            let recipients = self.router.resolve(
                &record.department,
                id,
                record.chat_id.as_deref(),
                RunMode::Threshold,
                severity,
            );
            let mut entry = self.entry(EntryKind::Ordinary, RunMode::Threshold, recipients, snapshot, warnings);
            entry.state_persisted = mark(ledger, id, month, NotifyMarker::Level(severity), warnings);
            report.entries.push(entry);
        }

        if self.escalation_due(record, snapshot)
            && !ledger.has_notified(id, month, NotifyMarker::SelfEscalation)
        {
            if let Some(identity) = record.chat_id.clone() {
                log::info!(
                    "{id} at {:.1}% crossed the self-notify threshold of {}%",
                    snapshot.percent,
                    self.config.self_notify.force_threshold_percent
                );
                let mut entry = self.entry(
                    EntryKind::SelfEscalation,
                    RunMode::Threshold,
                    Recipients::only_employee(identity),
                    snapshot,
                    warnings,
                );
                entry.state_persisted = mark(ledger, id, month, NotifyMarker::SelfEscalation, warnings);
                report.entries.push(entry);
            }
        }
    }

    /// The forced self-notify path needs the global switch and a chat
    /// identity, but not allowlist membership.
    fn escalation_due(&self, record: &OvertimeRecord, snapshot: &EmployeeSnapshot) -> bool {
        let s = &self.config.self_notify;
        s.enabled && record.chat_id.is_some() && snapshot.percent >= s.force_threshold_percent
    }

    fn entry(
        &self,
        kind:       EntryKind,
        mode:       RunMode,
        recipients: Recipients,
        snapshot:   &EmployeeSnapshot,
        warnings:   &mut Vec<RunWarning>,
    ) -> PlanEntry {
        let recipient_gap = recipients.is_empty();
        if recipient_gap {
            log::warn!(
                "No recipients for employee {} (department {}); check the recipient mapping",
                snapshot.employee_id,
                snapshot.department
            );
            warnings.push(RunWarning::RecipientGap {
                employee_id: snapshot.employee_id.clone(),
                department: snapshot.department.clone(),
            });
        }
        PlanEntry {
            kind,
            mode,
            recipients,
            snapshot: snapshot.clone(),
            recipient_gap,
            state_persisted: true,
        }
    }
}

/// Mark and report whether the mark reached the backend.
fn mark(
    ledger:      &mut NotificationLedger<'_>,
    employee_id: &str,
    month:       YearMonth,
    marker:      NotifyMarker,
    warnings:    &mut Vec<RunWarning>,
) -> bool {
    match ledger.mark_notified(employee_id, month, marker) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Could not persist {marker} for {employee_id} in {month}: {e}");
            warnings.push(RunWarning::StateWriteFailed {
                employee_id: employee_id.to_string(),
                marker,
                reason: e.to_string(),
            });
            false
        }
    }
}

pub fn snapshot(record: &OvertimeRecord, ceiling_minutes: u32) -> EmployeeSnapshot {
    let evaluation = evaluate(record.minutes, ceiling_minutes);
    EmployeeSnapshot {
        employee_id:       record.employee_id.clone(),
        name:              record.name.clone(),
        department:        record.department.clone(),
        month:             record.month,
        minutes:           record.minutes,
        previous_minutes:  record.previous_minutes,
        ceiling_minutes,
        percent:           evaluation.percent,
        severity:          evaluation.severity,
        percent_vs_last:   rounded_percent(record.minutes, record.previous_minutes.unwrap_or(0)),
        remaining_minutes: i64::from(ceiling_minutes) - i64::from(record.minutes),
    }
}
