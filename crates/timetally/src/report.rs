//! 📝 Report — turning sums into sentences.
//!
//! Everything in here is a pure function of its inputs: same aggregate, same roster,
//! same bytes out. No clocks, no I/O, no surprises. The detail lines are rendered here
//! too, but they are streamed by the page workers as they go, not by the summary.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use crate::aggregate::PipelineSummary;
use crate::common::TimesheetEntry;
use crate::period::DateRange;

/// 🏷️ How a day's hours look next to everyone else's that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    UnderWorked,
    TopPerformer,
    FullyWorked,
}

impl fmt::Display for DayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnderWorked => "under-worked",
            Self::TopPerformer => "top performer",
            Self::FullyWorked => "fully worked",
        })
    }
}

/// ⚖️ Under the minimum loses to everything. Otherwise, matching the day's maximum
/// makes you a top performer, and every tied employee gets the title.
pub fn day_label(hours: f64, day_max: f64, min_work_hours: f64) -> DayLabel {
    if hours < min_work_hours {
        DayLabel::UnderWorked
    } else if hours == day_max {
        DayLabel::TopPerformer
    } else {
        DayLabel::FullyWorked
    }
}

pub fn render_header(range: &DateRange) -> String {
    format!("Date range: {range}\n\n")
}

/// 📄 One detail record per accepted entry, blank line after.
pub fn render_entry(entry: &TimesheetEntry) -> String {
    format!(
        "Date: {}\nEmployee: {}\nProject: {}\nDescription: {}\nHours: {:.2}\n\n",
        entry.date.format("%Y-%m-%d"),
        entry.employee_name(),
        entry.project_name(),
        entry.description,
        entry.hours
    )
}

/// 📊 Everything after the detail lines: totals, sections, labels, skipped pages, roster.
///
/// `employee` is the `--employee` filter, if any. With a filter, the employee section
/// names just that person instead of listing everyone.
pub fn render_summary(
    summary: &PipelineSummary,
    employee: Option<&str>,
    roster: &BTreeMap<String, f64>,
    min_work_hours: f64,
) -> String {
    let mut out = String::new();
    // -- writing into a String cannot fail
    let _ = write_summary(&mut out, summary, employee, roster, min_work_hours);
    out
}

fn write_summary(
    out: &mut String,
    summary: &PipelineSummary,
    employee: Option<&str>,
    roster: &BTreeMap<String, f64>,
    min_work_hours: f64,
) -> fmt::Result {
    let agg = &summary.aggregate;
    writeln!(out, "\n=== Summary ===\n")?;
    writeln!(out, "Total hours: {:.2}\n", agg.total_hours)?;

    match employee {
        Some(name) => {
            writeln!(out, "Employee: {name}\n")?;
        }
        None => {
            writeln!(out, "Hours by employee:")?;
            for (name, hours) in &agg.hours_by_employee {
                writeln!(out, "{name}: {hours:.2} hours")?;
            }
        }
    }

    writeln!(out, "\nHours by project:")?;
    for (project, hours) in &agg.hours_by_project {
        writeln!(out, "{project}: {hours:.2} hours")?;
    }

    writeln!(out, "\nDaily hours:")?;
    for (day, employees) in &agg.hours_by_day {
        let day_max = employees.values().copied().fold(f64::MIN, f64::max);
        writeln!(out, "\n{}:", day.format("%Y-%m-%d"))?;
        for (name, hours) in employees {
            let label = day_label(*hours, day_max, min_work_hours);
            writeln!(out, "  {name}: {hours:.2} hours ====== {label}")?;
        }
    }

    if !summary.skipped.is_empty() {
        writeln!(
            out,
            "\nSkipped pages ({} of {}), totals above are incomplete:",
            summary.skipped.len(),
            summary.pages_planned
        )?;
        for page in &summary.skipped {
            writeln!(out, "  offset {}: {}", page.offset, page.reason)?;
        }
    }
    if summary.cancelled {
        writeln!(out, "\nRun was cancelled before every page was fetched.")?;
    }

    writeln!(out, "\nRoster:")?;
    for (name, hours) in roster {
        writeln!(out, "{name}: {hours:.2} hours")?;
    }
    Ok(())
}

/// 💬 The short version for chat: range, total, employees, projects. Telegram Markdown.
pub fn render_chat_summary(
    range: &DateRange,
    summary: &PipelineSummary,
    employee: Option<&str>,
) -> String {
    let mut out = String::new();
    let _ = write_chat_summary(&mut out, range, summary, employee);
    out
}

fn write_chat_summary(
    out: &mut String,
    range: &DateRange,
    summary: &PipelineSummary,
    employee: Option<&str>,
) -> fmt::Result {
    let agg = &summary.aggregate;
    writeln!(out, "📊 *Timesheet report summary*\n")?;
    writeln!(out, "Date range: {range}")?;
    writeln!(out, "Total hours: {:.2}\n", agg.total_hours)?;

    writeln!(out, "👥 *Hours by employee:*")?;
    match employee {
        Some(name) => {
            let hours = agg.hours_by_employee.get(name).copied().unwrap_or_default();
            writeln!(out, "{}: {hours:.2}", escape_markdown(name))?;
        }
        None if agg.hours_by_employee.is_empty() => {
            writeln!(out, "No employee hours recorded.")?;
        }
        None => {
            for (name, hours) in &agg.hours_by_employee {
                writeln!(out, "{}: {hours:.2}", escape_markdown(name))?;
            }
        }
    }

    writeln!(out, "\n🏢 *Hours by project:*")?;
    if agg.hours_by_project.is_empty() {
        writeln!(out, "No project hours recorded.")?;
    }
    for (project, hours) in &agg.hours_by_project {
        writeln!(out, "{}: {hours:.2}", escape_markdown(project))?;
    }

    if !summary.skipped.is_empty() {
        writeln!(
            out,
            "\n⚠️ {} page(s) skipped, totals are incomplete.",
            summary.skipped.len()
        )?;
    }
    Ok(())
}

/// 🧼 Legacy Telegram Markdown chokes on stray `_`, `*`, `` ` `` and `[` in names.
pub(crate) fn escape_markdown(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
