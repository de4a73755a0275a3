//! CLI `build-index` command: re-embed the whole catalog into a fresh index.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::sync::Arc;

use barkeep::catalog::{builder, Catalog};
use barkeep::config::BarkeepConfig;
use barkeep::embedding::{self, EmbeddingProvider};

pub async fn build_index(config: &BarkeepConfig) -> Result<()> {
    let catalog_path = config.resolved_catalog_path();
    let index_path = config.resolved_catalog_index_path();
    let batch_size = config.retrieval.build_batch_size;

    let catalog = Catalog::load(&catalog_path).context("failed to load catalog")?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::from(
        embedding::create_provider(&config.embedding)
            .context("failed to create embedding provider")?,
    );

    println!(
        "Embedding {} cocktails with model '{}'...",
        catalog.len(),
        config.embedding.model
    );

    let pb = ProgressBar::new(catalog.len() as u64);
    pb.set_style(super::progress_style("  {bar:40.cyan/blue} {pos}/{len} ({eta})"));

    let bar = pb.clone();
    let path = index_path.clone();
    let index = tokio::task::spawn_blocking(move || {
        builder::rebuild(&catalog, provider.as_ref(), batch_size, &path, |n| {
            bar.inc(n as u64)
        })
    })
    .await?
    .context("index build failed")?;

    pb.finish_and_clear();
    println!("Indexed {} cocktails into {}", index.size(), index_path.display());
    Ok(())
}
