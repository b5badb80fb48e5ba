//! 🧮 Aggregate — where hours go to be added up.
//!
//! 🎬 *[a page of timesheets enters. a partial aggregate leaves. the roster gets a little heavier.]*
//!
//! Every page worker folds its own entries into a private [`Aggregate`], then hands it
//! to the supervisor, which merges them all. Merge is field-wise addition and map union
//! with sums, so the order pages finish in does not matter. Maps are `BTreeMap`s so the
//! renderer walks them in the same order every time.
//!
//! The [`Roster`] is the one shared, mutable thing in here: a fixed allow-list of names,
//! each with a running total, behind an async mutex.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::trace;

use crate::common::TimesheetEntry;
use crate::report::render_entry;

/// 📊 Hours, summed three ways.
///
/// Invariants: `total_hours` is the sum of every recorded entry's hours, the values of
/// `hours_by_employee` add up to `total_hours`, and `hours_by_day[d][e]` is the sum for
/// employee `e` on day `d`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub total_hours: f64,
    pub entries: usize,
    pub hours_by_employee: BTreeMap<String, f64>,
    pub hours_by_project: BTreeMap<String, f64>,
    pub hours_by_day: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl Aggregate {
    /// ➕ Fold one accepted entry in.
    pub fn record(&mut self, entry: &TimesheetEntry) {
        let employee = entry.employee_name();
        self.total_hours += entry.hours;
        self.entries += 1;
        *self
            .hours_by_employee
            .entry(employee.to_string())
            .or_default() += entry.hours;
        *self
            .hours_by_project
            .entry(entry.project_name().to_string())
            .or_default() += entry.hours;
        *self
            .hours_by_day
            .entry(entry.date)
            .or_default()
            .entry(employee.to_string())
            .or_default() += entry.hours;
    }

    /// 🔀 Absorb another partial. Associative, commutative, and fine with empties.
    pub fn merge(&mut self, other: Aggregate) {
        self.total_hours += other.total_hours;
        self.entries += other.entries;
        merge_sums(&mut self.hours_by_employee, other.hours_by_employee);
        merge_sums(&mut self.hours_by_project, other.hours_by_project);
        for (day, employees) in other.hours_by_day {
            merge_sums(self.hours_by_day.entry(day).or_default(), employees);
        }
    }
}

fn merge_sums(into: &mut BTreeMap<String, f64>, from: BTreeMap<String, f64>) {
    for (key, hours) in from {
        *into.entry(key).or_default() += hours;
    }
}

/// 👥 The employee roster: a fixed set of names, each with cumulative hours.
///
/// Clones share the same totals. Membership never changes after construction, so
/// checking it needs no lock; crediting hours does.
#[derive(Debug, Clone)]
pub struct Roster {
    members: Arc<BTreeSet<String>>,
    hours: Arc<Mutex<BTreeMap<String, f64>>>,
}

impl Roster {
    /// 🌱 Every member starts at zero, so the report can show who did nothing.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let hours = members.iter().map(|name| (name.clone(), 0.0)).collect();
        Self {
            members: Arc::new(members),
            hours: Arc::new(Mutex::new(hours)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    /// ➕ Credit `hours` to `name`. Non-members are not credited; returns whether it landed.
    pub async fn credit(&self, name: &str, hours: f64) -> bool {
        if !self.contains(name) {
            return false;
        }
        let mut totals = self.hours.lock().await;
        *totals.entry(name.to_string()).or_default() += hours;
        true
    }

    /// 📸 The totals as they stand right now.
    pub async fn snapshot(&self) -> BTreeMap<String, f64> {
        self.hours.lock().await.clone()
    }
}

/// 🎯 Which entries make it into the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EmployeeFilter {
    /// everyone on the roster, nobody else
    #[default]
    Roster,
    /// exactly this one employee, roster or not
    Only(String),
}

impl From<Option<String>> for EmployeeFilter {
    fn from(name: Option<String>) -> Self {
        match name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => Self::Only(name),
            _ => Self::Roster,
        }
    }
}

impl EmployeeFilter {
    pub fn accepts(&self, employee: &str, roster: &Roster) -> bool {
        match self {
            Self::Roster => roster.contains(employee),
            Self::Only(name) => name == employee,
        }
    }

    pub fn employee(&self) -> Option<&str> {
        match self {
            Self::Roster => None,
            Self::Only(name) => Some(name),
        }
    }
}

/// 🧵 The page worker's whole job, minus the fetching.
///
/// Filters the page, folds what survives into a fresh partial, credits the roster, and
/// streams one detail record per accepted entry into `lines`. Always returns a partial,
/// even an empty one.
pub(crate) async fn aggregate_page(
    entries: Vec<TimesheetEntry>,
    filter: &EmployeeFilter,
    roster: &Roster,
    lines: &Sender<String>,
) -> Result<Aggregate> {
    let mut partial = Aggregate::default();
    for entry in entries {
        let employee = entry.employee_name();
        if !filter.accepts(employee, roster) {
            trace!("🚫 skipping an entry by '{employee}'");
            continue;
        }
        partial.record(&entry);
        roster.credit(employee, entry.hours).await;
        lines
            .send(render_entry(&entry))
            .await
            .context("💀 The report sink hung up while detail lines were still coming")?;
    }
    Ok(partial)
}

/// 🧾 A page that did not make it into the aggregate, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPage {
    pub offset: usize,
    pub reason: String,
}

/// 📦 The global aggregate plus the page bookkeeping of how it was built.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub aggregate: Aggregate,
    pub pages_planned: usize,
    pub pages_folded: usize,
    pub records_fetched: usize,
    /// sorted by offset
    pub skipped: Vec<SkippedPage>,
    pub cancelled: bool,
}
