//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The ledger and the runner call store methods — they never execute SQL directly.

use crate::error::OvertimeResult;
use rusqlite::{params, Connection};

mod history;
mod state;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> OvertimeResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; ignore failure elsewhere.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> OvertimeResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> OvertimeResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_notify_history.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id:     &str,
        month:      &str,
        mode:       &str,
        started_at: &str,
        version:    &str,
    ) -> OvertimeResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, month, mode, started_at, version) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, month, mode, started_at, version],
        )?;
        Ok(())
    }

    pub fn run_count(&self) -> OvertimeResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM run", [], |row| row.get(0))?;
        Ok(count)
    }
}
