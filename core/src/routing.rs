//! Recipient router — department code → who receives the report.
//!
//! Managers come from the department's mapping plus the catch-all mapping.
//! The employee's own identity is added only when self-notify is enabled
//! globally, the employee is on the allowlist, and the entry qualifies
//! (see `RecipientRouter::qualifies`).

use crate::{
    config::{NotifyConfig, CATCH_ALL},
    schedule::RunMode,
    threshold::Severity,
    types::RecipientId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    pub managers: BTreeSet<RecipientId>,
    /// The employee's own chat identity, when self-notify applies.
    pub employee: Option<RecipientId>,
}

impl Recipients {
    pub fn only_employee(identity: RecipientId) -> Self {
        Self { managers: BTreeSet::new(), employee: Some(identity) }
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty() && self.employee.is_none()
    }

    /// Union of managers and the employee, deduplicated.
    pub fn all(&self) -> BTreeSet<RecipientId> {
        let mut all = self.managers.clone();
        all.extend(self.employee.iter().cloned());
        all
    }
}

pub struct RecipientRouter<'a> {
    config: &'a NotifyConfig,
}

impl<'a> RecipientRouter<'a> {
    pub fn new(config: &'a NotifyConfig) -> Self {
        Self { config }
    }

    /// Manager recipients for a department: its own entries plus catch-all.
    pub fn managers(&self, department: &str) -> BTreeSet<RecipientId> {
        [department, CATCH_ALL]
            .iter()
            .filter_map(|key| self.config.recipients.get(*key))
            .flatten()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether `employee_id` may receive their own report at all.
    pub fn self_notify_allowed(&self, employee_id: &str) -> bool {
        let s = &self.config.self_notify;
        s.enabled && s.allowlist.contains(employee_id)
    }

    /// Forced runs qualify at any severity, including none; threshold runs
    /// only at a notifiable step.
    pub fn qualifies(mode: RunMode, severity: Severity) -> bool {
        mode == RunMode::Forced || severity.is_notifiable()
    }

    pub fn resolve(
        &self,
        department:  &str,
        employee_id: &str,
        identity:    Option<&str>,
        mode:        RunMode,
        severity:    Severity,
    ) -> Recipients {
        let qualifies = Self::qualifies(mode, severity);
        let employee = identity
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .filter(|_| qualifies && self.self_notify_allowed(employee_id))
            .map(str::to_string);
        Recipients {
            managers: self.managers(department),
            employee,
        }
    }
}
