use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use recall_audit::{publish_candidates, AuditDirs, JsonlPublisher, LabelQualityAuditor, WebhookPublisher};
use recall_cli::{init_tracing, load_settings};
use recall_core::config::expand_path;
use recall_core::traits::ReviewPublisher;

/// Compare ground-truth labels against predictions and publish images that need review.
#[derive(Parser, Debug)]
#[command(name = "recall-audit", version)]
struct Args {
    #[arg(long)]
    labels: PathBuf,
    #[arg(long)]
    predictions: PathBuf,
    #[arg(long)]
    images: PathBuf,
    /// Images scoring below this are flagged (overrides audit.threshold)
    #[arg(long)]
    threshold: Option<f32>,
    /// Review topic (overrides audit.topic)
    #[arg(long)]
    topic: Option<String>,
    /// Print flagged images without publishing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;
    let threshold = args.threshold.unwrap_or(settings.audit.threshold);
    let topic = args.topic.unwrap_or_else(|| settings.audit.topic.clone());

    let dirs = AuditDirs { labels: args.labels, predictions: args.predictions, images: args.images };
    let report = tokio::task::spawn_blocking(move || LabelQualityAuditor::new(threshold).run(&dirs)).await??;
    let candidates = report.candidates();
    for c in &candidates {
        println!("{}\t{}\t{}", c.image_path, c.label_path, c.predict_path);
    }
    if args.dry_run || candidates.is_empty() {
        println!("flagged {} of {} images", report.flagged(), report.scores.len());
        return Ok(());
    }

    let publisher: Box<dyn ReviewPublisher> = match &settings.audit.webhook {
        Some(url) => Box::new(WebhookPublisher::new(url, Duration::from_secs(settings.labelers.timeout_secs))?),
        None => Box::new(JsonlPublisher::new(expand_path(&settings.audit.spool_dir))),
    };
    let delivered = publish_candidates(publisher.as_ref(), &topic, &candidates).await;
    println!("flagged {} of {} images, published {} to '{}'", report.flagged(), report.scores.len(), delivered, topic);
    Ok(())
}
