//! Store methods for the notification history log.

use super::SqliteStore;
use crate::{
    error::OvertimeResult,
    event::{history_records, HistoryRecord},
    plan::RunReport,
    results::save_results,
    types::YearMonth,
};
use rusqlite::params;
use std::path::Path;

impl SqliteStore {
    /// Write a finished run's results cache and history rows.
    ///
    /// RULE: Runs after the plan has been emitted. Markers are already
    /// persisted by then, so nothing here may abort the run: each failure
    /// is logged and returned, and the remaining steps still execute.
    pub fn archive_run(&self, report: &RunReport, cache_dir: &Path, recorded_at: &str) -> Vec<String> {
        let mut failures = Vec::new();

        if let Err(e) = save_results(cache_dir, report.month, &report.evaluated) {
            log::warn!("Results cache write to {} failed: {e}", cache_dir.display());
            failures.push(format!("results cache: {e}"));
        }

        match history_records(report, recorded_at) {
            Ok(records) => {
                for record in &records {
                    if let Err(e) = self.append_history(record) {
                        log::warn!("History write for {} failed: {e}", record.employee_id);
                        failures.push(format!("history {}: {e}", record.employee_id));
                    }
                }
            }
            Err(e) => {
                log::warn!("Could not serialise history for run {}: {e}", report.run_id);
                failures.push(format!("history: {e}"));
            }
        }
        failures
    }

    pub fn append_history(&self, record: &HistoryRecord) -> OvertimeResult<()> {
        self.conn.execute(
            "INSERT INTO notify_history (run_id, month, employee_id, kind, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.run_id,
                record.month.to_string(),
                record.employee_id,
                record.kind,
                record.payload,
                record.recorded_at,
            ],
        )?;
        Ok(())
    }

    pub fn history_for_run(&self, run_id: &str) -> OvertimeResult<Vec<HistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, month, employee_id, kind, payload, recorded_at
             FROM notify_history WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                let month: String = row.get(2)?;
                Ok(HistoryRecord {
                    id:          Some(row.get(0)?),
                    run_id:      row.get(1)?,
                    month:       month.parse::<YearMonth>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            e.into(),
                        )
                    })?,
                    employee_id: row.get(3)?,
                    kind:        row.get(4)?,
                    payload:     row.get(5)?,
                    recorded_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
