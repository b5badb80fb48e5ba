//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! - [`PageWorker`]: one per page. Waits for a permit, fetches, folds, reports back.
//! - [`SinkWorker`]: exactly one. Drains rendered text into the report sink.
//!
//! ⚠️ "If you're reading this, the code review went poorly." 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod page_worker;
mod sink_worker;

pub(crate) use page_worker::{PageReport, PageWorker};
pub(crate) use sink_worker::SinkWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" — Seinfeld, on Rust
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    fn start(self) -> JoinHandle<Result<()>>;
}
