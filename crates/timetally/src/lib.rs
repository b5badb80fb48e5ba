//! ⏱️ timetally — timesheets in, totals out.
//!
//! Pulls timesheet lines from an Odoo ERP over XML-RPC, page by page and several pages at
//! a time, folds them into per-employee, per-project and per-day totals, and writes the
//! report to stdout and a file. Optionally mails it, or serves it from a Telegram bot.

pub mod aggregate;
pub mod app_config;
pub mod period;
pub mod report;
pub mod runner;

mod backends;
mod common;
mod dispatch;
mod progress;
mod supervisors;
mod xmlrpc;

pub use common::{Relation, TimesheetDraft, TimesheetEntry};
pub use dispatch::run_bot;
pub use runner::{ReportOutcome, ReportRequest, generate_report};
