//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 Sources pour timesheet pages, Sinks slurp up report text.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency. Need timesheets from the ERP over XML-RPC?
//! Need a pretend ERP living in RAM for tests? Need the report on the console AND in a
//! file at the same time? We've got a backend for that.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::TimesheetEntry;
use crate::period::DateRange;

#[cfg(test)]
pub(crate) mod in_mem;
pub(crate) mod odoo;
pub(crate) mod report_file;

// ===== Source Trait and Backend Enum =====

/// 🚰 A source of timesheet entries, addressed by page.
///
/// # Contract 📜
/// - `count` answers "how many entries match this range?" once, up front.
/// - `fetch_page` returns up to `limit` decoded entries starting at `offset`.
///   Same range, same offset, same answer (we're not animals).
/// - No retries in here. A failed page is the caller's problem, and the caller
///   has a policy for it (log, skip, carry on).
/// - `&self`, not `&mut self`: many workers read from one source at once.
#[async_trait]
pub(crate) trait TimesheetSource: std::fmt::Debug + Send + Sync {
    /// 🔢 How many entries fall inside `range`.
    async fn count(&self, range: &DateRange) -> Result<usize>;

    /// 📄 One page of entries inside `range`, starting at `offset`.
    async fn fetch_page(
        &self,
        range: &DateRange,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TimesheetEntry>>;
}

/// 🎭 The many faces of a Source — a polymorphic casting call for timesheet origins.
///
/// The enum dispatches via `impl TimesheetSource for SourceBackend`, so the supervisor
/// never needs to know whether it's reading from an ERP or from a Vec in a test.
/// The in-memory variants only exist in test builds.
#[derive(Debug)]
pub(crate) enum SourceBackend {
    Odoo(odoo::OdooSource),
    #[cfg(test)]
    InMemory(in_mem::InMemorySource),
}

#[async_trait]
impl TimesheetSource for SourceBackend {
    async fn count(&self, range: &DateRange) -> Result<usize> {
        match self {
            SourceBackend::Odoo(o) => o.count(range).await,
            #[cfg(test)]
            SourceBackend::InMemory(i) => i.count(range).await,
        }
    }

    async fn fetch_page(
        &self,
        range: &DateRange,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TimesheetEntry>> {
        match self {
            SourceBackend::Odoo(o) => o.fetch_page(range, offset, limit).await,
            #[cfg(test)]
            SourceBackend::InMemory(i) => i.fetch_page(range, offset, limit).await,
        }
    }
}

// ===== Sink Trait and Backend Enum =====

/// 🕳️ A sink for rendered report text — pure I/O, zero logic.
///
/// # Contract 📜
/// - `send` writes one chunk, whole. Chunks never interleave because exactly one
///   task (the SinkWorker) owns the sink. Everybody else sends over a channel.
/// - `close` flushes, finalizes, and bids the bytes a fond farewell. MUST be called.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    /// 📡 Write one rendered chunk to every destination.
    async fn send(&mut self, payload: String) -> Result<()>;
    /// 🗑️ Flush and release. Call this. Always. No exceptions. Not even on Fridays.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 Mirrors `SourceBackend` on the other end of the pipeline.
#[derive(Debug)]
pub(crate) enum SinkBackend {
    Report(report_file::ReportFileSink),
    #[cfg(test)]
    InMemory(in_mem::InMemorySink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn send(&mut self, payload: String) -> Result<()> {
        match self {
            SinkBackend::Report(sink) => sink.send(payload).await,
            #[cfg(test)]
            SinkBackend::InMemory(sink) => sink.send(payload).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::Report(sink) => sink.close().await,
            #[cfg(test)]
            SinkBackend::InMemory(sink) => sink.close().await,
        }
    }
}
