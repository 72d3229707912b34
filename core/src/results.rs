//! Results cache — the month's evaluated figures as a JSON document.

use crate::{error::OvertimeResult, plan::EmployeeSnapshot, threshold::rounded_percent, types::YearMonth};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub name:               String,
    pub division:           String,
    pub current:            u32,
    pub last:               Option<u32>,
    pub target:             u32,
    pub percent_vs_last:    u32,
    pub percent_target:     u32,
}

impl From<&EmployeeSnapshot> for ResultRow {
    fn from(s: &EmployeeSnapshot) -> Self {
        Self {
            name:            s.name.clone(),
            division:        s.department.clone(),
            current:         s.minutes,
            last:            s.previous_minutes,
            target:          s.ceiling_minutes,
            percent_vs_last: s.percent_vs_last,
            percent_target:  rounded_percent(s.minutes, s.ceiling_minutes),
        }
    }
}

pub fn results_path(cache_dir: &Path, month: YearMonth) -> PathBuf {
    cache_dir.join(format!("overtime_result_{}.json", month.compact()))
}

/// Write `<cache_dir>/overtime_result_YYYYMM.json`, keyed by employee id.
/// Overwrites the previous run's file for the same month.
pub fn save_results(
    cache_dir: &Path,
    month:     YearMonth,
    snapshots: &[EmployeeSnapshot],
) -> OvertimeResult<PathBuf> {
    std::fs::create_dir_all(cache_dir)?;
    let rows: BTreeMap<&str, ResultRow> = snapshots
        .iter()
        .map(|s| (s.employee_id.as_str(), ResultRow::from(s)))
        .collect();
    let path = results_path(cache_dir, month);
    std::fs::write(&path, serde_json::to_string_pretty(&rows)?)?;
    log::info!("Saved {} results to {}", rows.len(), path.display());
    Ok(path)
}
