//! 📄 The PageWorker — one page, one permit, one report back to the supervisor.
//!
//! 🎬 *[a worker is spawned. it waits in line at the semaphore like it's the DMV.]*
//!
//! Life of a page:
//! 1. wait for a semaphore permit (or for cancellation, whichever comes first)
//! 2. fetch the page under a timeout, permit held only for the fetch
//! 3. fold the entries into a partial, streaming detail lines to the sink
//! 4. send exactly one [`PageReport`] to the supervisor, folded or skipped
//!
//! A failed, timed-out or cancelled page is not an error here. It is a `Skipped` report
//! with a reason. The only errors are the ones that mean the pipeline itself is broken.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Worker;
use crate::aggregate::{Aggregate, EmployeeFilter, Roster, aggregate_page};
use crate::backends::{SourceBackend, TimesheetSource};
use crate::period::DateRange;

/// 📬 What a page worker tells the supervisor. Exactly one per page.
#[derive(Debug)]
pub(crate) enum PageReport {
    Folded {
        offset: usize,
        fetched: usize,
        partial: Aggregate,
    },
    Skipped {
        offset: usize,
        reason: String,
    },
}

/// 🧵 Everything one page needs, cloned in from the supervisor.
#[derive(Debug)]
pub(crate) struct PageWorker {
    pub(crate) offset: usize,
    pub(crate) limit: usize,
    pub(crate) range: DateRange,
    pub(crate) fetch_timeout: Duration,
    pub(crate) source: Arc<SourceBackend>,
    pub(crate) filter: Arc<EmployeeFilter>,
    pub(crate) roster: Roster,
    pub(crate) permits: Arc<Semaphore>,
    pub(crate) cancel: CancellationToken,
    /// 📄 detail lines, on their way to the SinkWorker
    pub(crate) lines: Sender<String>,
    /// 📊 one record count per page, on its way to the progress bar
    pub(crate) progress: Sender<u64>,
    pub(crate) results: Sender<PageReport>,
}

impl PageWorker {
    fn skipped(&self, reason: impl Into<String>) -> PageReport {
        PageReport::Skipped {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    async fn run(&self) -> Result<PageReport> {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(self.skipped("cancelled before fetch")),
            permit = self.permits.clone().acquire_owned() => {
                permit.context("💀 the worker semaphore was closed under us")?
            }
        };

        let fetch = tokio::time::timeout(
            self.fetch_timeout,
            self.source.fetch_page(&self.range, self.offset, self.limit),
        );
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(self.skipped("cancelled during fetch")),
            fetched = fetch => fetched,
        };
        drop(permit);

        let entries = match fetched {
            Ok(Ok(entries)) => entries,
            Ok(Err(err)) => {
                warn!("⚠️ page at offset {} failed, skipping it: {err:#}", self.offset);
                return Ok(self.skipped(format!("{err:#}")));
            }
            Err(_elapsed) => {
                warn!(
                    "⚠️ page at offset {} timed out after {}s, skipping it",
                    self.offset,
                    self.fetch_timeout.as_secs()
                );
                return Ok(self.skipped(format!(
                    "timed out after {}s",
                    self.fetch_timeout.as_secs()
                )));
            }
        };

        let fetched = entries.len();
        debug!("📄 offset {}: fetched {fetched} entries", self.offset);
        let partial = aggregate_page(entries, &self.filter, &self.roster, &self.lines)
            .await
            .with_context(|| format!("💀 folding the page at offset {} failed", self.offset))?;

        Ok(PageReport::Folded {
            offset: self.offset,
            fetched,
            partial,
        })
    }
}

impl Worker for PageWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let report = self.run().await?;
            let fetched = match &report {
                PageReport::Folded { fetched, .. } => *fetched as u64,
                PageReport::Skipped { .. } => 0,
            };
            // -- 📊 the progress bar is a spectator; if it left early, the show goes on
            if self.progress.send(fetched).await.is_err() {
                debug!("📊 progress channel closed, offset {} not counted", self.offset);
            }
            self.results
                .send(report)
                .await
                .context("💀 the supervisor stopped listening before every page reported")?;
            Ok(())
        })
    }
}
