//! Folder ingestion entry point.

use std::path::Path;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use recall_core::folder::list_regular_files;
use recall_core::Result;

use crate::cancel::CancelSignal;
use crate::outcome::IngestReport;
use crate::pipeline::IngestionPipeline;

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({percent}%) {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

impl IngestionPipeline {
    /// Ingests every regular file directly inside `dir` into bucket `task`,
    /// at most `workers` images at a time. A single image's failure never
    /// aborts the run; only an unreadable folder or failed collection setup does.
    pub async fn ingest_folder(&self, dir: &Path, task: &str, workers: usize, cancel: &CancelSignal) -> Result<IngestReport> {
        let files = list_regular_files(dir)?;
        tracing::info!(dir = %dir.display(), task, files = files.len(), workers, "starting folder ingestion");
        self.ensure_collections().await?;

        let pb = progress_bar(files.len());
        let mut outcomes = Vec::with_capacity(files.len());
        let mut stream = futures::stream::iter(files)
            .map(|path| async move { self.process_image(&path, task, cancel).await })
            .buffer_unordered(workers.max(1));
        while let Some(outcome) = stream.next().await {
            pb.set_message(outcome.path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());
            pb.inc(1);
            outcomes.push(outcome);
        }
        pb.finish_with_message(if cancel.is_cancelled() { "cancelled" } else { "done" });

        outcomes.sort_by(|a, b| a.path.cmp(&b.path));
        let report = IngestReport { outcomes };
        tracing::info!(
            committed = report.committed(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            partial = report.partial(),
            objects = report.objects(),
            "folder ingestion finished"
        );
        Ok(report)
    }
}
