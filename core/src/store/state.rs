//! Notification state rows — the SQLite StateBackend.

use super::SqliteStore;
use crate::{
    error::OvertimeResult,
    ledger::{NotifyMarker, StateBackend, StateEntry},
    types::YearMonth,
};
use rusqlite::params;

impl StateBackend for SqliteStore {
    fn load_month(&self, month: YearMonth) -> OvertimeResult<Vec<StateEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT employee_id, marker FROM notification_state
             WHERE month = ?1
             ORDER BY employee_id, marker",
        )?;
        let rows = stmt
            .query_map(params![month.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        // Rows with an unknown marker are skipped, not fatal.
        let entries = rows
            .into_iter()
            .filter_map(|(employee_id, key)| match NotifyMarker::from_key(&key) {
                Some(marker) => Some(StateEntry { employee_id, month, marker }),
                None => {
                    log::warn!("Ignoring unknown marker {key:?} for {employee_id} in {month}");
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    fn upsert(&self, entry: &StateEntry) -> OvertimeResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO notification_state (employee_id, month, marker)
             VALUES (?1, ?2, ?3)",
            params![entry.employee_id, entry.month.to_string(), entry.marker.as_key()],
        )?;
        Ok(())
    }

    fn purge_before(&self, month: YearMonth) -> OvertimeResult<usize> {
        // YYYY-MM compares lexically in calendar order.
        let removed = self.conn.execute(
            "DELETE FROM notification_state WHERE month < ?1",
            params![month.to_string()],
        )?;
        Ok(removed)
    }
}

impl SqliteStore {
    // ── Test / summary helpers ────────────────────────────────────────

    /// Number of markers stored for a month (for tests and summaries).
    pub fn state_count(&self, month: YearMonth) -> OvertimeResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notification_state WHERE month = ?1",
            params![month.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Write a raw marker string, bypassing validation (for corruption tests).
    pub fn insert_raw_marker(&self, employee_id: &str, month: &str, marker: &str) -> OvertimeResult<()> {
        self.conn.execute(
            "INSERT INTO notification_state (employee_id, month, marker) VALUES (?1, ?2, ?3)",
            params![employee_id, month, marker],
        )?;
        Ok(())
    }
}
