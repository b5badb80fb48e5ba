//! 🎬 *[a channel fills with detail lines. somewhere, a sink waits.]*
//! *[the clock on the wall reads 17:59, Friday.]*
//!
//! 🗑️ The SinkWorker — patient, tireless, and deeply unbothered by the chaos upstream.
//! It receives text. It writes text. It asks no questions. It is the only task that
//! touches the report sink, which is why nothing ever interleaves mid-record.

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::backends::{Sink, SinkBackend};

/// 🗑️ Takes text from a channel, throws it into a backend. The plumber of this pipeline.
#[derive(Debug)]
pub(crate) struct SinkWorker {
    rx: Receiver<String>,
    sink: SinkBackend,
}

impl SinkWorker {
    pub(crate) fn new(rx: Receiver<String>, sink: SinkBackend) -> Self {
        Self { rx, sink }
    }
}

impl Worker for SinkWorker {
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker started draining channel...");
            let mut chunks = 0usize;
            // -- 🏁 recv errors only once the channel is empty AND every sender is gone
            while let Ok(chunk) = self.rx.recv().await {
                chunks += 1;
                self.sink
                    .send(chunk)
                    .await
                    .context("💀 SinkWorker failed to write a report chunk")?;
            }
            debug!("🏁 SinkWorker: channel closed after {chunks} chunks. Shutting down.");
            self.sink
                .close()
                .await
                .context("💀 SinkWorker failed to close sink")?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::in_mem::InMemorySink;

    #[tokio::test]
    async fn the_one_where_the_sink_is_closed_only_after_the_last_chunk() -> Result<()> {
        let sink = InMemorySink::new();
        let witness = sink.clone();
        let (tx, rx) = async_channel::bounded(2);

        let handle = SinkWorker::new(rx, SinkBackend::InMemory(sink)).start();
        for i in 0..5 {
            tx.send(format!("chunk {i}\n")).await?;
        }
        assert!(!witness.is_closed());
        drop(tx);
        handle.await??;

        assert!(witness.is_closed());
        assert_eq!(witness.chunks().await.len(), 5);
        assert!(witness.contents().await.ends_with("chunk 4\n"));
        Ok(())
    }
}
