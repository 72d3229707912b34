//! Overtime threshold notification engine.
//!
//! One run = one batch pass over the employee roster:
//!   config → run mode → per-employee evaluation → notification plan.
//!
//! The engine decides *who* is told *what*; delivering the plan to Slack
//! and rendering message text belong to the caller.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod flag_store;
pub mod ledger;
pub mod plan;
pub mod results;
pub mod routing;
pub mod schedule;
pub mod source;
pub mod store;
pub mod threshold;
pub mod types;
