//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where timesheets arrive one page at a time..."
//! 🎬 "One supervisor dared to add them all up."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module — part middle manager, part accountant.
//!
//! It plans the page offsets, spawns one [`workers::PageWorker`] per page under a semaphore
//! ceiling, folds every partial aggregate that comes back over the results channel, and
//! keeps a tally of what got skipped. Progress counts go over a second channel to a
//! dedicated task that owns the progress bar.
//!
//! Both channels close on their own once every worker has dropped its sender, which is
//! how the fold loop knows it has seen every page.
//!
//! ⚠️ DO NOT MAKE THIS PUB EVER
//! 💀 WORKERS ARE SUPERVISORS PRIVATE LITTLE MINIONS WHOM THE WORLD FORGOT ABOUT

pub(crate) mod workers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Sender;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::{EmployeeFilter, PipelineSummary, Roster, SkippedPage};
use crate::app_config::RuntimeConfig;
use crate::backends::SourceBackend;
use crate::period::DateRange;
use crate::progress::ProgressMetrics;
use workers::{PageReport, PageWorker, Worker};

/// 📐 `0, page_size, 2 * page_size, ...` strictly below `total`.
pub(crate) fn page_offsets(total: usize, page_size: usize) -> Vec<usize> {
    (0..total).step_by(page_size.max(1)).collect()
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
#[derive(Debug)]
pub(crate) struct Supervisor {
    runtime: RuntimeConfig,
    source: Arc<SourceBackend>,
    cancel: CancellationToken,
}

impl Supervisor {
    pub(crate) fn new(runtime: RuntimeConfig, source: SourceBackend, cancel: CancellationToken) -> Self {
        Self {
            runtime,
            source: Arc::new(source),
            cancel,
        }
    }

    /// 🧵 Fetch and fold every page of `range`.
    ///
    /// `total` is the remote count for the range. Detail lines go to `lines`; the returned
    /// summary holds the merged aggregate and the page accounting. Page failures end up in
    /// `skipped`, not in the `Err` branch. `Err` means a worker could not talk to the
    /// sink or to us, and the report cannot be trusted.
    pub(crate) async fn fold_pages(
        &self,
        range: DateRange,
        total: usize,
        filter: EmployeeFilter,
        roster: Roster,
        lines: Sender<String>,
    ) -> Result<PipelineSummary> {
        let offsets = page_offsets(total, self.runtime.page_size);
        let mut summary = PipelineSummary {
            pages_planned: offsets.len(),
            ..PipelineSummary::default()
        };
        info!(
            "🚀 {total} entries in {range}: {} pages of {}, at most {} in flight",
            offsets.len(),
            self.runtime.page_size,
            self.runtime.max_workers
        );

        let permits = Arc::new(Semaphore::new(self.runtime.max_workers));
        let filter = Arc::new(filter);
        let (results_tx, results_rx) = async_channel::bounded(self.runtime.max_workers);
        let (progress_tx, progress_rx) = async_channel::bounded::<u64>(self.runtime.max_workers);

        let mut metrics = ProgressMetrics::new(
            format!("timesheets: {range}"),
            total as u64,
            offsets.len() as u64,
            self.runtime.show_progress,
        );
        let progress_handle = tokio::spawn(async move {
            while let Ok(records) = progress_rx.recv().await {
                metrics.update(records);
            }
            metrics.finish();
            debug!(
                "📊 progress drained: {} pages, {} entries",
                metrics.pages(),
                metrics.records()
            );
        });

        let handles: Vec<_> = offsets
            .iter()
            .map(|&offset| {
                PageWorker {
                    offset,
                    limit: self.runtime.page_size,
                    range,
                    fetch_timeout: Duration::from_secs(self.runtime.fetch_timeout_secs),
                    source: self.source.clone(),
                    filter: filter.clone(),
                    roster: roster.clone(),
                    permits: permits.clone(),
                    cancel: self.cancel.clone(),
                    lines: lines.clone(),
                    progress: progress_tx.clone(),
                    results: results_tx.clone(),
                }
                .start()
            })
            .collect();
        // -- 🔒 only the workers may hold senders now, or the fold loop below never ends
        drop(results_tx);
        drop(progress_tx);
        drop(lines);

        while let Ok(report) = results_rx.recv().await {
            match report {
                PageReport::Folded {
                    offset,
                    fetched,
                    partial,
                } => {
                    debug!("🔀 folding offset {offset}: {} accepted of {fetched}", partial.entries);
                    summary.aggregate.merge(partial);
                    summary.pages_folded += 1;
                    summary.records_fetched += fetched;
                }
                PageReport::Skipped { offset, reason } => {
                    summary.skipped.push(SkippedPage { offset, reason });
                }
            }
        }

        for joined in join_all(handles).await {
            joined.context("💀 a page worker panicked")??;
        }
        progress_handle
            .await
            .context("💀 the progress task panicked")?;

        summary.skipped.sort_by_key(|page| page.offset);
        summary.cancelled = self.cancel.is_cancelled();
        if !summary.skipped.is_empty() {
            warn!(
                "⚠️ {} of {} pages skipped, the report is incomplete",
                summary.skipped.len(),
                summary.pages_planned
            );
        }
        info!(
            "✅ folded {} pages, {} entries fetched, {:.2} hours accepted",
            summary.pages_folded, summary.records_fetched, summary.aggregate.total_hours
        );
        Ok(summary)
    }
}
