//! 🏃 The runner — one report, start to finish.
//!
//! 🎬 *[INT. TERMINAL — MORNING. Someone types `timetally --date daily` and reaches for coffee.]*
//!
//! Resolve the range, authenticate, count, fold every page through the supervisor,
//! write header + details + summary through the single sink, then (maybe) mail it.
//! The CLI, the bot's `/today` and `/month`, and the daily schedule all come through here.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aggregate::{EmployeeFilter, PipelineSummary, Roster};
use crate::app_config::AppConfig;
use crate::backends::odoo::OdooSource;
use crate::backends::report_file::ReportFileSink;
use crate::backends::{SinkBackend, SourceBackend, TimesheetSource};
use crate::dispatch::email;
use crate::period::{DateFilter, DateRange};
use crate::report::{render_chat_summary, render_header, render_summary};
use crate::supervisors::Supervisor;
use crate::supervisors::workers::{SinkWorker, Worker};

/// 🎯 What to report on. The CLI flags, more or less.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub date_filter: DateFilter,
    /// `None` or blank means every roster member
    pub employee: Option<String>,
    pub send_mail: bool,
}

/// 📦 What came out of one run.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub range: DateRange,
    pub summary: PipelineSummary,
    /// roster member → hours, zeros included
    pub roster: BTreeMap<String, f64>,
    pub report_path: PathBuf,
    /// the short Markdown version, for the chat
    pub chat_summary: String,
    pub mailed: bool,
}

/// 🚀 Produce one report against the configured ERP.
///
/// Fatal: an unusable config, bad credentials, an unreachable ERP, an unwritable report directory.
/// Not fatal: failed pages (noted in the report) and a failed mail (logged).
pub async fn generate_report(
    config: &AppConfig,
    request: &ReportRequest,
    cancel: CancellationToken,
) -> Result<ReportOutcome> {
    // -- `AppConfig` is public and buildable without load_config; zero capacity panics the channel
    config
        .validate()
        .context("💀 The configuration cannot drive a report")?;
    let now = Local::now().naive_local();
    let range = request.date_filter.resolve(now.date());
    let filter = EmployeeFilter::from(request.employee.clone());
    info!("📅 reporting on {range}");

    let source = OdooSource::connect(
        config.odoo.clone(),
        Duration::from_secs(config.runtime.fetch_timeout_secs),
    )
    .await
    .context("💀 Could not open a session with the ERP")?;
    let sink = ReportFileSink::create(&config.report.output_dir, now).await?;
    let report_path = sink.path().to_path_buf();

    let (summary, roster) = produce_report(
        config,
        filter.clone(),
        range,
        SourceBackend::Odoo(source),
        SinkBackend::Report(sink),
        cancel,
    )
    .await?;
    info!("📝 report written to '{}'", report_path.display());

    let mailed = if request.send_mail {
        email::mail_report(config.smtp.as_ref(), &report_path, now.date()).await
    } else {
        false
    };

    Ok(ReportOutcome {
        chat_summary: render_chat_summary(&range, &summary, filter.employee()),
        range,
        summary,
        roster,
        report_path,
        mailed,
    })
}

/// 🧵 Count, fold, render. Backend-agnostic, so the tests can run it against RAM.
///
/// The sink sees the header first and the summary last; detail lines land in between
/// in whatever order the pages finish.
pub(crate) async fn produce_report(
    config: &AppConfig,
    filter: EmployeeFilter,
    range: DateRange,
    source: SourceBackend,
    sink: SinkBackend,
    cancel: CancellationToken,
) -> Result<(PipelineSummary, BTreeMap<String, f64>)> {
    let total = source
        .count(&range)
        .await
        .with_context(|| format!("💀 Could not count the timesheet entries in {range}"))?;

    let (lines, lines_rx) = async_channel::bounded(config.runtime.sink_capacity);
    let sink_handle = SinkWorker::new(lines_rx, sink).start();
    lines
        .send(render_header(&range))
        .await
        .context("💀 The report sink hung up before the header")?;

    let roster = Roster::new(&config.report.roster);
    let employee = filter.employee().map(str::to_owned);
    let summary = Supervisor::new(config.runtime.clone(), source, cancel)
        .fold_pages(range, total, filter, roster.clone(), lines.clone())
        .await?;

    let roster_hours = roster.snapshot().await;
    lines
        .send(render_summary(
            &summary,
            employee.as_deref(),
            &roster_hours,
            config.report.min_work_hours,
        ))
        .await
        .context("💀 The report sink hung up before the summary")?;
    // -- 🏁 last sender gone: the sink worker drains, flushes, and exits
    drop(lines);
    sink_handle.await.context("💀 the sink worker panicked")??;

    Ok((summary, roster_hours))
}
