//! Run configuration — loaded once, validated, then passed by reference.
//!
//! RULE: No component reads the environment or the filesystem for
//! configuration. Everything flows from the single NotifyConfig value.

use crate::error::{OvertimeError, OvertimeResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Recipient mapping key that applies to every department.
pub const CATCH_ALL: &str = "ALL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfNotifyConfig {
    /// Global switch. When false nobody receives their own report.
    #[serde(default)]
    pub enabled: bool,
    /// Employee ids allowed to receive their own report. Closed set:
    /// an empty list means nobody, never everybody.
    #[serde(default)]
    pub allowlist: BTreeSet<String>,
    /// Percent of ceiling at or above which the employee is told directly,
    /// independent of the allowlist and of the manager notification ladder.
    #[serde(default = "default_force_threshold")]
    pub force_threshold_percent: f64,
}

fn default_force_threshold() -> f64 {
    90.0
}

impl Default for SelfNotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowlist: BTreeSet::new(),
            force_threshold_percent: default_force_threshold(),
        }
    }
}

/// Weekly time slot for the whole-roster status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceWindow {
    /// 0 = Monday … 6 = Sunday.
    pub weekday:           u32,
    pub hour:              u32,
    pub minute:            u32,
    pub tolerance_minutes: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DebugOverrides {
    /// Every run is a forced run.
    #[serde(default)]
    pub force_always: bool,
    /// Skip the weekday/time comparison and treat the window as matched.
    #[serde(default)]
    pub bypass_window: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub default_ceiling_minutes: Option<u32>,
    #[serde(default)]
    pub department_ceilings: HashMap<String, u32>,
    /// Department code (or CATCH_ALL) → recipient identities.
    #[serde(default)]
    pub recipients: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub self_notify: SelfNotifyConfig,
    #[serde(default)]
    pub force_window: Option<ForceWindow>,
    #[serde(default)]
    pub debug: DebugOverrides,
    /// Non-working days on which ordinary runs are skipped.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

impl NotifyConfig {
    /// Load from `<data_dir>/config/notify_config.json` and validate.
    /// In tests, use NotifyConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/config/notify_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: NotifyConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OvertimeResult<()> {
        if self.default_ceiling_minutes == Some(0) {
            return Err(invalid("default_ceiling_minutes must be > 0"));
        }
        if let Some((dept, _)) = self.department_ceilings.iter().find(|(_, c)| **c == 0) {
            return Err(invalid(format!("ceiling for department '{dept}' must be > 0")));
        }
        if let Some(w) = &self.force_window {
            if w.weekday > 6 {
                return Err(invalid(format!("force_window.weekday {} not in 0..=6", w.weekday)));
            }
            if w.hour > 23 || w.minute > 59 {
                return Err(invalid(format!(
                    "force_window time {:02}:{:02} is not a valid time of day",
                    w.hour, w.minute
                )));
            }
        }
        let t = self.self_notify.force_threshold_percent;
        if !(t.is_finite() && t > 0.0) {
            return Err(invalid("self_notify.force_threshold_percent must be > 0"));
        }
        Ok(())
    }

    /// Explicit department ceiling, else the default. None only when both are missing.
    pub fn ceiling_for(&self, department: &str) -> Option<u32> {
        self.department_ceilings
            .get(department)
            .copied()
            .or(self.default_ceiling_minutes)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let mut department_ceilings = HashMap::new();
        department_ceilings.insert("300".to_string(), 600);
        department_ceilings.insert("400".to_string(), 1200);

        let mut recipients = HashMap::new();
        recipients.insert("300".to_string(), vec!["lead300@example.com".to_string()]);
        recipients.insert("400".to_string(), vec!["lead400@example.com".to_string()]);
        recipients.insert(CATCH_ALL.to_string(), vec!["hr@example.com".to_string()]);

        Self {
            default_ceiling_minutes: Some(900),
            department_ceilings,
            recipients,
            self_notify: SelfNotifyConfig {
                enabled: true,
                allowlist: ["1001".to_string()].into_iter().collect(),
                force_threshold_percent: 95.0,
            },
            force_window: Some(ForceWindow {
                weekday: 4,
                hour: 21,
                minute: 30,
                tolerance_minutes: 5,
            }),
            debug: DebugOverrides::default(),
            holidays: Vec::new(),
        }
    }
}

fn invalid(reason: impl Into<String>) -> OvertimeError {
    OvertimeError::InvalidConfig { reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_ceiling_wins_over_default() {
        let config = NotifyConfig::default_test();
        assert_eq!(config.ceiling_for("300"), Some(600));
        assert_eq!(config.ceiling_for("999"), Some(900));
    }

    #[test]
    fn missing_default_leaves_unknown_departments_unresolved() {
        let mut config = NotifyConfig::default_test();
        config.default_ceiling_minutes = None;
        assert_eq!(config.ceiling_for("999"), None);
        assert_eq!(config.ceiling_for("400"), Some(1200));
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let mut config = NotifyConfig::default_test();
        config.department_ceilings.insert("500".into(), 0);
        assert!(matches!(config.validate(), Err(OvertimeError::InvalidConfig { .. })));
    }

    #[test]
    fn out_of_range_window_is_rejected() {
        let mut config = NotifyConfig::default_test();
        config.force_window = Some(ForceWindow { weekday: 7, hour: 21, minute: 30, tolerance_minutes: 5 });
        assert!(config.validate().is_err());

        config.force_window = Some(ForceWindow { weekday: 4, hour: 24, minute: 0, tolerance_minutes: 5 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_minimal_json() {
        let json = r#"{
            "default_ceiling_minutes": 600,
            "recipients": { "ALL": ["hr@example.com"] }
        }"#;
        let config: NotifyConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert!(!config.self_notify.enabled);
        assert!(config.self_notify.allowlist.is_empty());
        assert_eq!(config.self_notify.force_threshold_percent, 90.0);
        assert!(config.force_window.is_none());
    }
}
