//! 📊 progress.rs — "Are we there yet?" — every pipeline, every time, forever.
//!
//! 🚀 This module answers the age-old question: "how fast are the timesheets coming in?"
//! With cold hard numbers, a progress bar, and a table so comfy it has lumbar support.
//!
//! ⚠️  Warning: Watching this progress bar will not make the ERP go faster.
//! Neither will refreshing it. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000 entries" → "1,000,000 entries" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS for a timesheet report, somebody logged a LOT of hours.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📊 Tracks entries and pages as they land, and draws them on stderr.
///
/// Uses a sliding 5-second window for the rate so one slow page doesn't scare you.
/// Owned by exactly one task (the progress drain), so no locks in here.
///
/// # Ancient Proverb
/// "He who fetches without a progress bar, fetches alone and in darkness."
pub(crate) struct ProgressMetrics {
    /// 🏷️ what are we fetching? shown above the bar
    label: String,
    /// 📏 how many entries the ERP said match
    total_records: u64,
    total_pages: u64,
    records: u64,
    pages: u64,
    progress_bar: ProgressBar,
    /// 🔄 sliding window of (timestamp, records) for rate calculation
    rate_samples: VecDeque<(Instant, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("label", &self.label)
            .field("total_records", &self.total_records)
            .field("records", &self.records)
            .field("pages", &self.pages)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 Spin up a new ProgressMetrics. `visible = false` gets a hidden bar that still counts.
    pub(crate) fn new(label: String, total_records: u64, total_pages: u64, visible: bool) -> Self {
        let progress_bar = if visible {
            ProgressBar::new(total_pages)
        } else {
            ProgressBar::hidden()
        };
        // -- 🎨 cyan because it's classy. a broken template falls back to the plain default bar.
        let style = ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        progress_bar.set_style(style);

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64));

        Self {
            label,
            total_records,
            total_pages,
            records: 0,
            pages: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 One page landed with `records` entries in it (skipped pages count with zero).
    pub(crate) fn update(&mut self, records: u64) {
        self.records += records;
        self.pages += 1;

        let rate = self.records_per_sec();
        self.render(rate);
        self.progress_bar.set_position(self.pages);
    }

    pub(crate) fn records(&self) -> u64 {
        self.records
    }

    pub(crate) fn pages(&self) -> u64 {
        self.pages
    }

    /// ✅ Ring the bell. We made it.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    /// 📈 Entries per second over the last 5 seconds.
    fn records_per_sec(&mut self) -> f64 {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, self.records));

        match self.rate_samples.front() {
            Some(&(oldest_time, oldest_records)) => {
                let elapsed = now.duration_since(oldest_time).as_secs_f64();
                if elapsed > 0.0 {
                    self.records.saturating_sub(oldest_records) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// 🎨 Render the stats table as the progress bar message.
    ///
    /// ```text
    /// <label>
    ///   <entries/s>     <entries done / total>
    ///   <pages done / total>   <%>
    ///   <elapsed>       <remaining>
    /// | [=====>----------]
    /// ```
    fn render(&self, records_per_sec: f64) {
        let percent = if self.total_pages > 0 {
            (self.pages as f64 / self.total_pages as f64) * 100.0
        } else {
            0.0
        };

        let elapsed = self.start_time.elapsed();
        let remaining = if percent > 0.0 {
            // 🔮 linear extrapolation — assumes the next pages look like the last ones
            let total_estimated = elapsed.as_secs_f64() / (percent / 100.0);
            let remaining_secs = total_estimated - elapsed.as_secs_f64();
            if remaining_secs > 0.0 {
                format_duration(Duration::from_secs_f64(remaining_secs))
            } else {
                "--:--".to_string()
            }
        } else {
            "--:--".to_string()
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} Entries/s", format_number(records_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} / {} Entries",
                format_number(self.records),
                format_number(self.total_records)
            ))
            .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} / {} Pages", self.pages, self.total_pages))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", percent)).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} remaining", remaining)).set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("{}\n{}", self.label, table));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_big_numbers_get_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn the_one_where_an_hour_grows_an_extra_column() {
        assert_eq!(format_duration(Duration::from_secs(59)), "00:59");
        assert_eq!(format_duration(Duration::from_secs(61)), "01:01");
        assert_eq!(format_duration(Duration::from_secs(3_661)), "01:01:01");
    }

    #[test]
    fn the_one_where_a_hidden_bar_still_keeps_count() {
        let mut metrics = ProgressMetrics::new("timesheets".into(), 250, 3, false);
        metrics.update(100);
        metrics.update(0);
        metrics.update(50);
        metrics.finish();
        assert_eq!(metrics.records(), 150);
        assert_eq!(metrics.pages(), 3);
    }
}
