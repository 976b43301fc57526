//! Wiring shared by the command-line binaries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use recall_core::config::{expand_path, Config, RecallSettings};
use recall_core::traits::Labeler;
use recall_core::Error;
use recall_embed::get_default_embedder;
use recall_labeler::HttpLabeler;
use recall_pipeline::{CancelSignal, IngestionPipeline, PipelineOptions, PipelinePorts};
use recall_records::SqliteRecordStore;
use recall_storage::LocalObjectStore;
use recall_vector::LanceVectorStore;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

pub fn load_settings() -> Result<RecallSettings> {
    let config = Config::load()?;
    Ok(config.settings()?)
}

pub async fn open_vector_store(settings: &RecallSettings) -> Result<LanceVectorStore> {
    LanceVectorStore::open(&expand_path(&settings.vector.uri).to_string_lossy()).await
}

fn http_labelers(settings: &RecallSettings) -> Result<(Vec<Arc<dyn Labeler>>, Option<Arc<dyn Labeler>>)> {
    let timeout = Duration::from_secs(settings.labelers.timeout_secs);
    let mut labelers: Vec<Arc<dyn Labeler>> = Vec::new();
    for (i, url) in settings.labelers.endpoints.iter().enumerate() {
        labelers.push(Arc::new(HttpLabeler::new(format!("labeler-{i}"), url, timeout)?));
    }
    let describer = match &settings.labelers.describer {
        Some(url) => Some(Arc::new(HttpLabeler::new("describer", url, timeout)?) as Arc<dyn Labeler>),
        None => None,
    };
    Ok((labelers, describer))
}

/// Builds every collaborator from settings. Configuration problems surface
/// here, before any image is read.
pub async fn build_pipeline(settings: &RecallSettings) -> Result<IngestionPipeline> {
    let (labelers, describer) = http_labelers(settings)?;
    if labelers.is_empty() {
        return Err(Error::InvalidConfig("labelers.endpoints must name at least one labeler".into()).into());
    }
    let embedder = get_default_embedder(&settings.embedding)?;
    if embedder.dim() != settings.vector.dim {
        return Err(Error::InvalidConfig(format!("embedder dimension {} does not match vector.dim {}", embedder.dim(), settings.vector.dim)).into());
    }
    let object_store = LocalObjectStore::new(expand_path(&settings.storage.object_root), settings.storage.public_endpoint.clone());
    let vector_store = open_vector_store(settings).await?;
    let record_store = SqliteRecordStore::open(expand_path(&settings.records.path)).await?;

    let ports = PipelinePorts {
        object_store: Arc::new(object_store),
        vector_store: Arc::new(vector_store),
        record_store: Arc::new(record_store),
        embedder,
        labelers,
        describer,
    };
    Ok(IngestionPipeline::new(ports, PipelineOptions::from_settings(&settings.pipeline, &settings.labelers))?)
}

/// Cancels `signal` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(signal: CancelSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight stages");
            signal.cancel();
        }
    });
}
