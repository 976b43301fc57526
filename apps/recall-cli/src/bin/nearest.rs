use std::path::PathBuf;

use clap::Parser;
use recall_cli::{init_tracing, load_settings, open_vector_store};
use recall_core::types::Collection;
use recall_embed::get_default_embedder;

/// Find the stored vectors closest to an image.
#[derive(Parser, Debug)]
#[command(name = "recall-nearest", version)]
struct Args {
    image: PathBuf,
    /// object | image | object_description
    #[arg(short, long, default_value = "image")]
    collection: String,
    #[arg(short, default_value_t = 5)]
    k: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    if !Collection::ALL.iter().any(|c| c.name() == args.collection) {
        anyhow::bail!("unknown collection '{}'", args.collection);
    }
    let settings = load_settings()?;
    let embedder = get_default_embedder(&settings.embedding)?;
    let image = image::open(&args.image)?;
    let vector = embedder.embed_image(&image)?;
    let store = open_vector_store(&settings).await?;
    for hit in store.nearest(&args.collection, &vector, args.k).await? {
        println!("{:.4}\t{}\timage={}\tobject={}", hit.distance, hit.id, hit.payload.image_id, hit.payload.object_id.as_deref().unwrap_or("-"));
    }
    Ok(())
}
