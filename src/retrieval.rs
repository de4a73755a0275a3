//! Free-text catalog search: embed the query, scan the catalog index, and join
//! the hits back to their records by id.

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{Catalog, CatalogRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{AdvisorError, Result};
use crate::index::FlatIndex;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: CatalogRecord,
    pub distance: f32,
}

pub struct CatalogSearch {
    catalog: Arc<Catalog>,
    index: FlatIndex,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl CatalogSearch {
    pub fn new(catalog: Arc<Catalog>, index: FlatIndex, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            catalog,
            index,
            embedder,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn is_ready(&self) -> bool {
        !self.index.is_empty()
    }

    /// Swap in a freshly built index.
    pub fn replace_index(&mut self, index: FlatIndex) {
        self.index = index;
    }

    /// The `top_k` catalog records closest to `query`, nearest first.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if !self.is_ready() {
            return Err(AdvisorError::IndexNotReady);
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).map_err(AdvisorError::Embedding)?;
        let neighbors = self.index.query(&vector, top_k)?;

        let hits = neighbors
            .into_iter()
            .filter_map(|n| match self.catalog.get(&n.key) {
                Some(record) => Some(SearchHit {
                    record: record.clone(),
                    distance: n.distance,
                }),
                None => {
                    tracing::warn!(key = %n.key, "index entry has no catalog record, skipping");
                    None
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(query, top_k, hits = hits.len(), "catalog search");
        Ok(hits)
    }
}
