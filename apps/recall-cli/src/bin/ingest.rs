use std::path::PathBuf;

use clap::Parser;
use recall_cli::{build_pipeline, cancel_on_ctrl_c, init_tracing, load_settings};
use recall_pipeline::CancelSignal;

/// Ingest every image in a folder: upload, embed, label and record it.
#[derive(Parser, Debug)]
#[command(name = "recall-ingest", version)]
struct Args {
    /// Folder of images; subdirectories are ignored
    dir: PathBuf,
    /// Task name, also used as the storage bucket (defaults to the folder name)
    #[arg(short, long)]
    task: Option<String>,
    /// Images processed concurrently (overrides pipeline.workers)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;
    let task = match args.task {
        Some(t) => t,
        None => args
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("cannot derive a task name from {}; pass --task", args.dir.display()))?,
    };
    let workers = args.workers.unwrap_or(settings.pipeline.workers);

    let pipeline = build_pipeline(&settings).await?;
    let cancel = CancelSignal::new();
    cancel_on_ctrl_c(cancel.clone());
    let report = pipeline.ingest_folder(&args.dir, &task, workers, &cancel).await?;

    println!(
        "committed {} images ({} objects), skipped {}, failed {}, cancelled {}, partial {}",
        report.committed(),
        report.objects(),
        report.skipped(),
        report.failed(),
        report.cancelled(),
        report.partial()
    );
    Ok(())
}
