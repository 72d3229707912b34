//! Overtime record source — where per-employee monthly minutes come from.
//!
//! The engine never fetches. The runner asks an OvertimeSource for raw rows
//! and hands them over; rows that fail validation are skipped one by one.

use crate::{
    error::{OvertimeError, OvertimeResult},
    types::{DepartmentCode, EmployeeId, RecipientId, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One employee's data as delivered by a source, before validation.
/// `minutes` is None when the source had nothing usable for the employee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOvertimeRow {
    pub employee_id:      EmployeeId,
    pub name:             String,
    pub department:       DepartmentCode,
    pub chat_id:          Option<RecipientId>,
    pub minutes:          Option<i64>,
    pub previous_minutes: Option<i64>,
}

/// A validated record. Produced fresh each run, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvertimeRecord {
    pub employee_id:      EmployeeId,
    pub name:             String,
    pub department:       DepartmentCode,
    pub chat_id:          Option<RecipientId>,
    pub month:            YearMonth,
    pub minutes:          u32,
    pub previous_minutes: Option<u32>,
}

impl RawOvertimeRow {
    /// Validate into a record for `month`, or say why not.
    pub fn validate(self, month: YearMonth) -> Result<OvertimeRecord, String> {
        if self.employee_id.trim().is_empty() {
            return Err("missing employee id".into());
        }
        if self.department.trim().is_empty() {
            return Err("missing department code".into());
        }
        let minutes = match self.minutes {
            None => return Err(format!("no overtime figure for {month}")),
            Some(m) => u32::try_from(m).map_err(|_| format!("invalid overtime minutes {m}"))?,
        };
        // A bad previous-month figure only costs the comparison.
        let previous_minutes = self.previous_minutes.and_then(|m| u32::try_from(m).ok());
        Ok(OvertimeRecord {
            employee_id: self.employee_id.trim().to_string(),
            name: self.name,
            department: self.department.trim().to_string(),
            chat_id: self.chat_id.filter(|c| !c.trim().is_empty()),
            month,
            minutes,
            previous_minutes,
        })
    }
}

pub trait OvertimeSource {
    /// One row per known employee for `month`, previous month included.
    fn fetch(&self, month: YearMonth) -> OvertimeResult<Vec<RawOvertimeRow>>;
}

// ── File-based source ──────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    pub code:       String,
    pub key:        String,
    pub name:       String,
    pub department: String,
    #[serde(default)]
    pub chat_id:    String,
}

/// One row of the time-tracking system's monthly-workings export.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonthlyWorking {
    employee_key:   String,
    #[serde(default)]
    overtime:       i64,
    #[serde(default)]
    night_overtime: i64,
}

/// Reads `<data_dir>/employees.json` and `<data_dir>/monthly/YYYY-MM.json`.
///
/// An employee missing from a month's export worked no overtime that month.
/// A malformed export row leaves that employee without a figure.
pub struct MonthlyExportSource {
    data_dir: PathBuf,
}

enum ExportFigure {
    Minutes(i64),
    Malformed,
}

impl MonthlyExportSource {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self { data_dir: data_dir.as_ref().to_path_buf() }
    }

    fn roster(&self, month: YearMonth) -> OvertimeResult<Vec<RosterEntry>> {
        let path = self.data_dir.join("employees.json");
        let content = std::fs::read_to_string(&path).map_err(|e| OvertimeError::SourceUnavailable {
            month,
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overtime per employee key, or None when the export file is absent.
    fn export(&self, month: YearMonth) -> OvertimeResult<Option<HashMap<String, ExportFigure>>> {
        let path = self.data_dir.join("monthly").join(format!("{month}.json"));
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let rows: Vec<serde_json::Value> = serde_json::from_str(&content)?;
        let mut figures = HashMap::new();
        for row in rows {
            let key = row
                .get("employeeKey")
                .and_then(|k| k.as_str())
                .map(str::to_string);
            match (serde_json::from_value::<MonthlyWorking>(row), key) {
                (Ok(w), _) => {
                    figures.insert(w.employee_key, ExportFigure::Minutes(w.overtime + w.night_overtime));
                }
                (Err(e), Some(key)) => {
                    log::warn!("Malformed {month} export row for key {key}: {e}");
                    figures.insert(key, ExportFigure::Malformed);
                }
                (Err(e), None) => log::warn!("Dropping {month} export row without employeeKey: {e}"),
            }
        }
        Ok(Some(figures))
    }
}

fn figure_for(export: &HashMap<String, ExportFigure>, key: &str) -> Option<i64> {
    match export.get(key) {
        Some(ExportFigure::Minutes(m)) => Some(*m),
        Some(ExportFigure::Malformed) => None,
        None => Some(0),
    }
}

impl OvertimeSource for MonthlyExportSource {
    fn fetch(&self, month: YearMonth) -> OvertimeResult<Vec<RawOvertimeRow>> {
        let roster = self.roster(month)?;
        let current = self.export(month)?.ok_or_else(|| OvertimeError::SourceUnavailable {
            month,
            reason: "monthly export not found".into(),
        })?;
        let previous = self.export(month.previous())?;
        if previous.is_none() {
            log::info!("No export for {}; previous-month comparison unavailable", month.previous());
        }

        Ok(roster
            .into_iter()
            .map(|e| RawOvertimeRow {
                minutes: figure_for(&current, &e.key),
                previous_minutes: previous.as_ref().and_then(|p| figure_for(p, &e.key)),
                employee_id: e.code,
                name: e.name,
                department: e.department,
                chat_id: Some(e.chat_id).filter(|c| !c.is_empty()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OCT: YearMonth = YearMonth { year: 2026, month: 10 };

    fn row(minutes: Option<i64>) -> RawOvertimeRow {
        RawOvertimeRow {
            employee_id: "1001".into(),
            name: "Sato Hanako".into(),
            department: "300".into(),
            chat_id: Some("".into()),
            minutes,
            previous_minutes: Some(-5),
        }
    }

    #[test]
    fn valid_row_becomes_record() {
        let record = row(Some(540)).validate(OCT).unwrap();
        assert_eq!(record.minutes, 540);
        assert_eq!(record.month, OCT);
        assert_eq!(record.chat_id, None);
        assert_eq!(record.previous_minutes, None);
    }

    #[test]
    fn missing_or_negative_minutes_are_rejected() {
        assert!(row(None).validate(OCT).is_err());
        assert!(row(Some(-1)).validate(OCT).is_err());
        let mut r = row(Some(10));
        r.department = " ".into();
        assert!(r.validate(OCT).is_err());
    }
}
