use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{self, AsyncWriteExt},
};
use tracing::{debug, trace};

use crate::backends::Sink;

/// 🔢 How many `_N` suffixes we try before admitting the directory is full of twins.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// 🏷️ `result_2026-10-19_08-00-00.txt`, then `result_2026-10-19_08-00-00_1.txt` and up
/// for the runs that started in the same second. One file per run, sortable by name.
pub(crate) fn report_file_name(at: NaiveDateTime, attempt: u32) -> String {
    let stamp = at.format("%Y-%m-%d_%H-%M-%S");
    match attempt {
        0 => format!("result_{stamp}.txt"),
        n => format!("result_{stamp}_{n}.txt"),
    }
}

/// 🚰 ReportFileSink — every chunk goes to stdout AND to the report file. A tee with a job.
///
/// Same chunk, same order, both destinations. The SinkWorker is the only caller,
/// so nothing interleaves mid-chunk.
///
/// The file is always created fresh (`create_new`). Two runs that start in the same second,
/// say a `/today` at 08:00:00 next to the schedule, get `_1`, `_2`... instead of sharing one file.
#[derive(Debug)]
pub(crate) struct ReportFileSink {
    path: PathBuf,
    file_buf: io::BufWriter<File>,
    stdout: io::Stdout,
}

impl ReportFileSink {
    /// 🚀 Make sure `output_dir` exists, then create the timestamped report file inside it.
    pub(crate) async fn create(output_dir: &Path, at: NaiveDateTime) -> Result<Self> {
        fs::create_dir_all(output_dir).await.with_context(|| {
            format!(
                "💀 Could not create the report directory '{}'. Permissions, or a file squatting on the name.",
                output_dir.display()
            )
        })?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = output_dir.join(report_file_name(at, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file_handle) => {
                    debug!("📝 report file: {}", path.display());
                    return Ok(Self {
                        path,
                        file_buf: io::BufWriter::new(file_handle),
                        stdout: io::stdout(),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    trace!("📝 '{}' is taken, trying the next suffix", path.display());
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!(
                            "💀 The report file '{}' could not be conjured into existence.",
                            path.display()
                        )
                    });
                }
            }
        }
        bail!(
            "💀 {MAX_NAME_ATTEMPTS} reports already exist for {} in '{}'. That is a lot of reports for one second.",
            at,
            output_dir.display()
        )
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for ReportFileSink {
    async fn send(&mut self, payload: String) -> Result<()> {
        trace!("📬 {} bytes walked into the report sink", payload.len());
        self.stdout
            .write_all(payload.as_bytes())
            .await
            .context("💀 stdout refused the report. Is the pipe closed?")?;
        self.file_buf
            .write_all(payload.as_bytes())
            .await
            .with_context(|| format!("💀 Failed writing to '{}'", self.path.display()))?;
        Ok(())
    }

    /// 🗑️ Flush both ends. async Drop is not a thing, so this has to be explicit.
    async fn close(&mut self) -> Result<()> {
        self.stdout.flush().await.context("💀 Error flushing stdout")?;
        self.file_buf.flush().await.with_context(|| {
            format!(
                "💀 Error flushing '{}'. The data was in the buffer, so close to the disk.",
                self.path.display()
            )
        })?;
        Ok(())
    }
}
