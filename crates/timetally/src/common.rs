//! 📦 Common data structures — the building blocks of timetally
//!
//! 🎬 COLD OPEN — INT. OPEN-PLAN OFFICE — 17:58, FRIDAY
//!
//! Somebody just remembered they have not logged a single hour all week.
//! The timesheet screen loads. The cursor blinks. Five days of "meetings"
//! are typed in under a minute. Each of those rows ends up here, as a
//! [`TimesheetEntry`], carried through the pipeline without judgement.
//!
//! 🦆
//!
//! The entry types don't ask questions. They carry the hours. They are the
//! postal workers of this codebase. Please tip your postal workers.

use chrono::NaiveDate;

/// 🔗 A resolved many-to-one relation, the ERP's way of saying "this row points at that row".
///
/// On the wire it is `[id, "Display Name"]` or a bare `false` when unset.
/// Only the linked shape survives decoding; everything else becomes `None` upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: i64,
    pub name: String,
}

/// 🎯 One timesheet line — one person, one project, one day, some hours.
///
/// Immutable once decoded, consumed exactly once by the aggregator.
/// Relations are `Option` because an unset relation is a perfectly normal thing
/// for the ERP to hand us. It resolves to an empty display name, never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct TimesheetEntry {
    pub date: NaiveDate,
    pub employee: Option<Relation>,
    pub project: Option<Relation>,
    pub description: String,
    pub hours: f64,
}

impl TimesheetEntry {
    /// 👤 The employee's display name, or `""` when the relation is unset.
    pub fn employee_name(&self) -> &str {
        self.employee.as_ref().map_or("", |r| r.name.as_str())
    }

    /// 🏢 The project's display name, or `""` when the relation is unset.
    pub fn project_name(&self) -> &str {
        self.project.as_ref().map_or("", |r| r.name.as_str())
    }
}

/// ✍️ A new timesheet line waiting to be created remotely.
///
/// Built from a chat message like `2025-02-07|APOLLO|CX-7006|Fixed the thing|3.5`.
/// The task is optional. The hours are not. Nobody gets paid for optional hours.
#[derive(Debug, Clone, PartialEq)]
pub struct TimesheetDraft {
    pub date: NaiveDate,
    pub project: String,
    pub task: Option<String>,
    pub description: String,
    pub hours: f64,
}
