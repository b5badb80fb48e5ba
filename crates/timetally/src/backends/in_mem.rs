//! # Previously, on timetally...
//!
//! 🎬 The ERP was down for maintenance. Again. Someone had to pretend to be it.
//! Someone had to hand out pages of timesheets from a Vec, fail on cue, and keep
//! a diary of who asked for what. That someone was this module.
//!
//! `in_mem` provides an in-memory source and sink for tests:
//! - [`InMemorySource`] serves a fixed set of entries by offset, can be told to fail
//!   or dawdle at specific offsets, and counts how many fetches are in flight at once.
//! - [`InMemorySink`] collects every chunk behind an `Arc<Mutex<...>>` so the test can
//!   read the report back after the pipeline is done with it.
//!
//! 🦆
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please also deploy a therapist.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{Sink, TimesheetSource};
use crate::common::TimesheetEntry;
use crate::period::DateRange;

/// 📦 A pretend ERP. Clone it before handing it to the pipeline and keep the clone as a witness:
/// the fetch log and the in-flight counters are shared between clones.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySource {
    entries: Vec<TimesheetEntry>,
    failing_offsets: HashSet<usize>,
    delays: HashMap<usize, Duration>,
    fetch_log: Arc<Mutex<Vec<usize>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// 🧮 Decrements the in-flight counter however the fetch ends, timeouts included.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InMemorySource {
    pub(crate) fn new(entries: Vec<TimesheetEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    /// 💀 The page at `offset` fails, every time.
    pub(crate) fn failing_at(mut self, offset: usize) -> Self {
        self.failing_offsets.insert(offset);
        self
    }

    /// 🐌 The page at `offset` takes `delay` to arrive.
    pub(crate) fn slow_at(mut self, offset: usize, delay: Duration) -> Self {
        self.delays.insert(offset, delay);
        self
    }

    /// 📓 Every offset that was asked for, sorted, cancelled or not.
    pub(crate) async fn fetched_offsets(&self) -> Vec<usize> {
        let mut offsets = self.fetch_log.lock().await.clone();
        offsets.sort_unstable();
        offsets
    }

    /// 📈 The most fetches that were ever running at the same moment.
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn matching(&self, range: &DateRange) -> impl Iterator<Item = &TimesheetEntry> {
        self.entries.iter().filter(move |e| range.contains(e.date))
    }
}

#[async_trait]
impl TimesheetSource for InMemorySource {
    async fn count(&self, range: &DateRange) -> Result<usize> {
        Ok(self.matching(range).count())
    }

    async fn fetch_page(
        &self,
        range: &DateRange,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TimesheetEntry>> {
        self.fetch_log.lock().await.push(offset);

        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(self.in_flight.clone());
        self.peak_in_flight.fetch_max(now_running, Ordering::SeqCst);

        // -- 🎬 always yield once, so concurrent fetches actually overlap
        match self.delays.get(&offset) {
            Some(delay) => tokio::time::sleep(*delay).await,
            None => tokio::task::yield_now().await,
        }

        if self.failing_offsets.contains(&offset) {
            bail!("💀 simulated failure for the page at offset {offset}");
        }
        Ok(self
            .matching(range)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// 📦 A sink that never forgets. Clone-able so tests can peek inside after handing
/// `self` off to the pipeline. The `Arc` means everyone shares the same Vec.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    received: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl InMemorySink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 📜 Everything sent so far, glued together in arrival order.
    pub(crate) async fn contents(&self) -> String {
        self.received.lock().await.concat()
    }

    pub(crate) async fn chunks(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&mut self, payload: String) -> Result<()> {
        if self.is_closed() {
            bail!("💀 InMemorySink received a chunk after close. Ghost writes are not supported.");
        }
        self.received.lock().await.push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::fixtures::{day, entry};

    fn october() -> DateRange {
        DateRange {
            start: day("2026-10-01"),
            end: day("2026-10-31"),
        }
    }

    #[tokio::test]
    async fn the_one_where_pages_are_cut_from_the_matching_entries_only() -> Result<()> {
        let source = InMemorySource::new(vec![
            entry("2026-09-30", "Ada", "Engine", 1.0),
            entry("2026-10-01", "Ada", "Engine", 2.0),
            entry("2026-10-02", "Ada", "Engine", 3.0),
            entry("2026-10-03", "Ada", "Engine", 4.0),
        ]);
        assert_eq!(source.count(&october()).await?, 3);
        let second_page = source.fetch_page(&october(), 2, 2).await?;
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].hours, 4.0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_witness_sees_what_the_pipeline_did() {
        let source = InMemorySource::new(vec![]).failing_at(100);
        let witness = source.clone();
        assert!(source.fetch_page(&october(), 100, 100).await.is_err());
        assert!(source.fetch_page(&october(), 0, 100).await.is_ok());
        assert_eq!(witness.fetched_offsets().await, vec![0, 100]);
        assert_eq!(witness.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn the_one_where_the_sink_refuses_writes_after_close() -> Result<()> {
        let mut sink = InMemorySink::new();
        let witness = sink.clone();
        sink.send("Date range: ...\n".into()).await?;
        sink.close().await?;
        assert!(sink.send("late".into()).await.is_err());
        assert!(witness.is_closed());
        assert_eq!(witness.contents().await, "Date range: ...\n");
        Ok(())
    }
}
