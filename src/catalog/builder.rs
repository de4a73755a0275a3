//! Catalog index builder: embeds every record and writes a fresh index.

use std::path::Path;

use crate::catalog::Catalog;
use crate::embedding::EmbeddingProvider;
use crate::error::{AdvisorError, Result};
use crate::index::FlatIndex;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Embed every catalog record in row order and return a new index keyed by
/// record id. `on_batch` is called with the number of records embedded after
/// each batch.
///
/// The result always replaces any previous index; it never grows an existing one.
pub fn build_index(
    catalog: &Catalog,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
    mut on_batch: impl FnMut(usize),
) -> Result<FlatIndex> {
    if catalog.is_empty() {
        return Err(AdvisorError::EmptyCatalog);
    }

    let mut index = FlatIndex::new(embedder.dimensions())?;
    for chunk in catalog.records().chunks(batch_size.max(1)) {
        let texts: Vec<String> = chunk.iter().map(|r| r.embedding_text()).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = embedder
            .embed_batch(&text_refs)
            .map_err(AdvisorError::Embedding)?;

        if embeddings.len() != chunk.len() {
            return Err(AdvisorError::Embedding(anyhow::anyhow!(
                "embedder returned {} vectors for {} records",
                embeddings.len(),
                chunk.len()
            )));
        }

        index.insert_batch(chunk.iter().map(|r| r.id.as_str()).zip(embeddings))?;
        on_batch(chunk.len());
    }

    tracing::info!(records = index.size(), "catalog index built");
    Ok(index)
}

/// [`build_index`] followed by persisting the result to `path`.
pub fn rebuild(
    catalog: &Catalog,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
    path: &Path,
    on_batch: impl FnMut(usize),
) -> Result<FlatIndex> {
    let index = build_index(catalog, embedder, batch_size, on_batch)?;
    index.persist(path)?;
    tracing::info!(path = %path.display(), "catalog index written");
    Ok(index)
}
