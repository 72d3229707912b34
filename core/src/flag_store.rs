//! Flat-file StateBackend: one JSON document per month.
//!
//! `<dir>/notified_YYYY-MM.json` maps employee id → sent marker keys.
//! Files are replaced whole via write-to-temp + rename.

use crate::{
    error::{OvertimeError, OvertimeResult},
    ledger::{NotifyMarker, StateBackend, StateEntry},
    types::YearMonth,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const PREFIX: &str = "notified_";
const EXT: &str = ".json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct MonthFile {
    month:   Option<YearMonth>,
    entries: BTreeMap<String, BTreeSet<String>>,
}

pub struct FlagFileStore {
    dir: PathBuf,
}

impl FlagFileStore {
    pub fn new(dir: impl AsRef<Path>) -> OvertimeResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self { dir: dir.as_ref().to_path_buf() })
    }

    pub fn path_for(&self, month: YearMonth) -> PathBuf {
        self.dir.join(format!("{PREFIX}{month}{EXT}"))
    }

    fn read(&self, month: YearMonth) -> OvertimeResult<MonthFile> {
        let path = self.path_for(month);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MonthFile::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| OvertimeError::CorruptState {
            reason: format!("{}: {e}", path.display()),
        })
    }

    fn write(&self, month: YearMonth, file: &MonthFile) -> OvertimeResult<()> {
        let path = self.path_for(month);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(file)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl StateBackend for FlagFileStore {
    fn load_month(&self, month: YearMonth) -> OvertimeResult<Vec<StateEntry>> {
        let file = self.read(month)?;
        let mut entries = Vec::new();
        for (employee_id, keys) in file.entries {
            for key in keys {
                match NotifyMarker::from_key(&key) {
                    Some(marker) => entries.push(StateEntry {
                        employee_id: employee_id.clone(),
                        month,
                        marker,
                    }),
                    None => log::warn!("Ignoring unknown marker {key:?} for {employee_id} in {month}"),
                }
            }
        }
        Ok(entries)
    }

    fn upsert(&self, entry: &StateEntry) -> OvertimeResult<()> {
        let mut file = match self.read(entry.month) {
            Ok(f) => f,
            Err(OvertimeError::CorruptState { reason }) => {
                log::warn!("Replacing corrupt state file: {reason}");
                MonthFile::default()
            }
            Err(e) => return Err(e),
        };
        file.month = Some(entry.month);
        let inserted = file
            .entries
            .entry(entry.employee_id.clone())
            .or_default()
            .insert(entry.marker.as_key());
        if inserted {
            self.write(entry.month, &file)?;
        }
        Ok(())
    }

    fn purge_before(&self, month: YearMonth) -> OvertimeResult<usize> {
        let mut removed = 0;
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(file_month) = name
                .strip_prefix(PREFIX)
                .and_then(|rest| rest.strip_suffix(EXT))
                .and_then(|m| m.parse::<YearMonth>().ok())
            else {
                continue;
            };
            if file_month < month {
                // Count what the file held; a corrupt file counts as one.
                let held = self
                    .load_month(file_month)
                    .map(|e| e.len().max(1))
                    .unwrap_or(1);
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += held,
                    Err(e) => log::warn!("Cannot remove {}: {e}", path.display()),
                }
            }
        }
        Ok(removed)
    }
}
