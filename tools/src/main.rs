//! overtime-runner: cron-invoked overtime threshold notification pass.
//!
//! Usage:
//!   overtime-runner --data-dir ./data --db state.db
//!   overtime-runner --data-dir ./data --state-backend file --state-dir ./notified_flags
//!   overtime-runner --now 2026-10-16T21:30 --cache-dir ./cache
//!
//! Prints the notification plan as JSON lines on stdout, one per entry,
//! followed by a per-recipient summary. Delivery is left to the notifier
//! that consumes those lines.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use overtime_core::{
    config::NotifyConfig,
    engine::DecisionEngine,
    flag_store::FlagFileStore,
    ledger::{NotificationLedger, StateBackend},
    plan::{digest_by_recipient, RunReport},
    schedule::{decide_run_mode, is_skip_day},
    source::{MonthlyExportSource, OvertimeSource},
    store::SqliteStore,
    types::{new_run_id, YearMonth},
};
use std::env;
use std::io::{self, Write};
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = arg_str(&args, "--data-dir").unwrap_or("./data");
    let db = arg_str(&args, "--db").unwrap_or("./overtime_state.db");
    let backend = arg_str(&args, "--state-backend").unwrap_or("sqlite");
    let state_dir = arg_str(&args, "--state-dir").unwrap_or("./notified_flags");
    let cache_dir = arg_str(&args, "--cache-dir").unwrap_or("./cache");
    let now = match arg_str(&args, "--now") {
        Some(s) => parse_now(s)?,
        None => Local::now().naive_local(),
    };

    let config = NotifyConfig::load(data_dir)?;

    // The force check comes before the skip-day check: the weekly report
    // goes out even on a weekend.
    let decision = decide_run_mode(now, &config);
    if !decision.is_forced() && is_skip_day(now.date(), &config) {
        log::info!("{} is a weekend or holiday; skipping run", now.date());
        return Ok(());
    }

    // History and run bookkeeping always live in SQLite.
    let store = SqliteStore::open(db)?;
    store.migrate()?;

    let state: Box<dyn StateBackend + '_> = match backend {
        "sqlite" => Box::new(&store),
        "file" => Box::new(FlagFileStore::new(state_dir)?),
        other => anyhow::bail!("unknown --state-backend {other:?} (expected sqlite or file)"),
    };
    let mut ledger = NotificationLedger::new(state);

    let month = YearMonth::of(now.date());
    if let Err(e) = ledger.reset(month) {
        log::warn!("Stale notification state cleanup failed: {e}");
    }

    let source = MonthlyExportSource::new(data_dir);
    let rows = source
        .fetch(month)
        .with_context(|| format!("fetching overtime for {month}"))?;

    let run_id = new_run_id();
    let mode = serde_json::to_value(decision.mode)?;
    store.insert_run(
        &run_id,
        &month.to_string(),
        mode.as_str().unwrap_or_default(),
        &now.to_string(),
        env!("CARGO_PKG_VERSION"),
    )?;

    let engine = DecisionEngine::new(&config);
    let report = engine.run(run_id, now, decision, rows, &mut ledger)?;

    // Markers are already persisted: the plan goes out before anything
    // else can fail.
    emit_plan(&report)?;
    print_summary(&report);

    let recorded_at = now.format("%Y-%m-%d %H:%M").to_string();
    let failures = store.archive_run(&report, Path::new(cache_dir), &recorded_at);
    if !failures.is_empty() {
        eprintln!("  archive failures: {}", failures.len());
    }
    Ok(())
}

fn emit_plan(report: &RunReport) -> Result<()> {
    let mut stdout = io::stdout().lock();
    for entry in &report.entries {
        writeln!(stdout, "{}", serde_json::to_string(entry)?)?;
    }
    stdout.flush()?;
    Ok(())
}

fn print_summary(report: &RunReport) {
    eprintln!("=== RUN SUMMARY ===");
    eprintln!("  run_id:     {}", report.run_id);
    eprintln!("  month:      {}", report.month);
    eprintln!("  mode:       {:?}", report.decision.mode);
    if let Some(reason) = report.decision.reason {
        eprintln!("  forced by:  {reason:?}");
    }
    eprintln!("  evaluated:  {}", report.evaluated.len());
    eprintln!("  entries:    {}", report.entries.len());
    eprintln!("  suppressed: {}", report.suppressed.len());
    eprintln!("  warnings:   {}", report.warnings.len());

    let digest = digest_by_recipient(&report.entries);
    if digest.is_empty() {
        eprintln!("  (nobody to notify this run)");
    }
    for (recipient, entries) in &digest {
        let targets: Vec<String> = entries
            .iter()
            .map(|e| format!("{} ({:.0}%)", e.snapshot.name, e.snapshot.percent))
            .collect();
        eprintln!("  {recipient}: {} | {}", entries.len(), targets.join(", "));
    }
    for warning in &report.warnings {
        eprintln!("  warning: {}", serde_json::to_string(warning).unwrap_or_default());
    }
}

fn arg_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_now(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| format!("--now expects YYYY-MM-DDTHH:MM, got {s:?}"))
}
