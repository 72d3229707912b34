//! Force-notify scheduler — is this run the weekly whole-roster report?
//!
//! Pure functions of wall-clock time and config. No state.
//! Time is compared at minute resolution; seconds are ignored.

use crate::config::{DebugOverrides, ForceWindow, NotifyConfig};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Ordinary pass: notify on newly reached severity steps only.
    Threshold,
    /// Weekly pass: report everyone, ignore severity and dedup state.
    Forced,
}

/// Why a run was forced. Recorded on the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceReason {
    Window,
    BypassWindow,
    ForceAlways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDecision {
    pub mode:   RunMode,
    pub reason: Option<ForceReason>,
}

impl RunDecision {
    pub fn threshold() -> Self {
        Self { mode: RunMode::Threshold, reason: None }
    }

    pub fn forced(reason: ForceReason) -> Self {
        Self { mode: RunMode::Forced, reason: Some(reason) }
    }

    pub fn is_forced(&self) -> bool {
        self.mode == RunMode::Forced
    }
}

/// True when `now` falls on the window's weekday and within
/// ±tolerance minutes of its hour:minute, both ends inclusive.
/// The window does not wrap across midnight.
pub fn in_window(now: NaiveDateTime, window: &ForceWindow) -> bool {
    if now.weekday().num_days_from_monday() != window.weekday {
        return false;
    }
    let now_min = (now.hour() * 60 + now.minute()) as i64;
    let target = (window.hour * 60 + window.minute) as i64;
    (now_min - target).abs() <= window.tolerance_minutes as i64
}

/// `Some(reason)` when this run must be forced.
/// Debug overrides win over the time check.
pub fn is_force_run(
    now:    NaiveDateTime,
    window: Option<&ForceWindow>,
    debug:  &DebugOverrides,
) -> Option<ForceReason> {
    if debug.force_always {
        return Some(ForceReason::ForceAlways);
    }
    if debug.bypass_window {
        return Some(ForceReason::BypassWindow);
    }
    match window {
        Some(w) if in_window(now, w) => Some(ForceReason::Window),
        _ => None,
    }
}

pub fn decide_run_mode(now: NaiveDateTime, config: &NotifyConfig) -> RunDecision {
    match is_force_run(now, config.force_window.as_ref(), &config.debug) {
        Some(reason) => {
            log::info!("Forced notify run ({reason:?}) at {now}");
            RunDecision::forced(reason)
        }
        None => RunDecision::threshold(),
    }
}

/// Weekends and configured holidays. Forced runs go ahead regardless;
/// callers must check the run mode first.
pub fn is_skip_day(date: NaiveDate, config: &NotifyConfig) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || config.is_holiday(date)
}
