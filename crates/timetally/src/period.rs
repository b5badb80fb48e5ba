//! 📅 Period — turning "daily", "2026-10-19" or "" into an actual range of days.
//!
//! Calendars: the original distributed consensus problem. We only need the easy part.

use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};

/// 🗓️ What the caller asked for, before we know what "today" is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFilter {
    /// `daily` — just today
    Today,
    /// `YYYY-MM-DD` — that one day, and only that day
    Day(NaiveDate),
    /// empty — the first of the month through today
    #[default]
    MonthToDate,
}

impl FromStr for DateFilter {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "" => Ok(Self::MonthToDate),
            "daily" => Ok(Self::Today),
            day => NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map(Self::Day)
                .with_context(|| {
                    format!("💀 Invalid date filter '{day}'. Expected 'daily', 'YYYY-MM-DD', or nothing at all.")
                }),
        }
    }
}

impl DateFilter {
    /// 🎯 Pin the filter to a concrete inclusive range, given what day it is.
    pub fn resolve(&self, today: NaiveDate) -> DateRange {
        match *self {
            Self::Today => DateRange::single(today),
            Self::Day(day) => DateRange::single(day),
            Self::MonthToDate => DateRange {
                // -- with_day(1) cannot fail, every month has a first. Even February.
                start: today.with_day(1).unwrap_or(today),
                end: today,
            },
        }
    }
}

/// 📏 An inclusive range of calendar days. `start <= end`, unless someone got creative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}
