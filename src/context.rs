//! Process-wide state, constructed once and shared behind an `Arc`.
//!
//! [`AdvisorContext`] owns the embedding provider, the catalog search facade
//! and the preference store. Merges are serialized by a writer mutex that is
//! only ever taken on the blocking pool; the store itself sits behind an
//! `RwLock` whose write side is held just long enough to apply a prepared
//! merge and snapshot it. Embedding and file writes happen outside it, so
//! readers on the async runtime never wait on inference or disk.
//! Call [`AdvisorContext::shutdown`] before exit to flush the store.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use anyhow::Context as _;
use serde::Serialize;

use crate::catalog::{builder, Catalog};
use crate::chat::PreferenceUpdate;
use crate::config::BarkeepConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{AdvisorError, Result};
use crate::index::FlatIndex;
use crate::preferences::{MergeOutcome, PreferenceStore, UserPreferences};
use crate::retrieval::{CatalogSearch, SearchHit};

/// Counts reported by `/health` and `barkeep doctor`.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub catalog_records: usize,
    pub catalog_index_size: usize,
    pub preference_users: usize,
    pub preference_index_size: usize,
}

pub struct AdvisorContext {
    config: BarkeepConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    search: CatalogSearch,
    preferences: RwLock<PreferenceStore>,
    /// Held for the whole of a merge, so merges never interleave.
    writer: Mutex<()>,
}

impl AdvisorContext {
    /// Load the embedding model from config, then everything else.
    pub fn open(config: BarkeepConfig) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::from(embedding::create_provider(&config.embedding)?);
        tracing::info!("embedding provider ready");
        Self::open_with_embedder(config, embedder)
    }

    /// Load the catalog, its index (building it when missing, empty, or out
    /// of date), and the preference store.
    pub fn open_with_embedder(
        config: BarkeepConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let catalog = Arc::new(Catalog::load(&config.resolved_catalog_path())?);

        let index_path = config.resolved_catalog_index_path();
        let index = match load_catalog_index(&index_path, &catalog, embedder.dimensions()) {
            Some(index) => index,
            None => {
                tracing::info!("catalog index is missing or stale, building it now");
                match builder::rebuild(
                    &catalog,
                    embedder.as_ref(),
                    config.retrieval.build_batch_size,
                    &index_path,
                    |_| {},
                ) {
                    Ok(index) => index,
                    // searches report IndexNotReady until the catalog has rows
                    Err(AdvisorError::EmptyCatalog) => {
                        tracing::warn!("catalog is empty, search is unavailable");
                        FlatIndex::new(embedder.dimensions())?
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let mut preferences = PreferenceStore::open(
            config.resolved_preferences_index_path(),
            embedder.dimensions(),
            config.preferences.history_policy,
        )?;
        preferences.reconcile(embedder.as_ref())?;

        Ok(Self {
            search: CatalogSearch::new(catalog, index, Arc::clone(&embedder)),
            config,
            embedder,
            preferences: RwLock::new(preferences),
            writer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &BarkeepConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn catalog_search(&self) -> &CatalogSearch {
        &self.search
    }

    /// Shared read access to the preference store. Never blocked by an
    /// in-flight embedding or file write.
    pub fn read_preferences(&self) -> RwLockReadGuard<'_, PreferenceStore> {
        // every mutation is applied whole, so a poisoned store is still usable
        self.preferences
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn preferences_for(&self, user_id: &str) -> UserPreferences {
        self.read_preferences().get(user_id)
    }

    /// Merge an update into the user's preferences on the blocking pool.
    pub async fn merge_preferences(
        self: &Arc<Self>,
        user_id: String,
        update: PreferenceUpdate,
    ) -> anyhow::Result<MergeOutcome> {
        let ctx = Arc::clone(self);
        let outcome = tokio::task::spawn_blocking(move || ctx.merge_blocking(&user_id, update))
            .await
            .context("preference task failed")??;
        Ok(outcome)
    }

    fn merge_blocking(&self, user_id: &str, update: PreferenceUpdate) -> Result<MergeOutcome> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let pending = self.read_preferences().prepare_merge(
            user_id,
            &update.ingredients,
            &update.cocktails,
            self.embedder.as_ref(),
        )?;

        let (outcome, snapshot) = {
            let mut store = self
                .preferences
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let outcome = store.apply(pending)?;
            (outcome, store.snapshot()?)
        };

        snapshot.write()?;
        Ok(outcome)
    }

    /// Catalog search on the blocking pool.
    pub async fn search(self: &Arc<Self>, query: String, top_k: usize) -> anyhow::Result<Vec<SearchHit>> {
        let ctx = Arc::clone(self);
        let hits = tokio::task::spawn_blocking(move || ctx.search.search(&query, top_k))
            .await
            .context("search task failed")??;
        Ok(hits)
    }

    pub fn health(&self) -> Health {
        let store = self.read_preferences();
        Health {
            catalog_records: self.search.catalog().len(),
            catalog_index_size: self.search.index().size(),
            preference_users: store.len(),
            preference_index_size: store.index().size(),
        }
    }

    /// Flush the preference store. The context should not be used afterwards.
    pub fn shutdown(&self) -> Result<()> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let (snapshot, users) = {
            let store = self.read_preferences();
            (store.snapshot()?, store.len())
        };
        snapshot.write()?;
        tracing::info!(users, "preference store flushed");
        Ok(())
    }
}

/// The persisted catalog index, if it is usable for `catalog`: present,
/// readable, of the embedder's dimension, and keyed exactly by the catalog's
/// record ids in order.
fn load_catalog_index(path: &Path, catalog: &Catalog, dimension: usize) -> Option<FlatIndex> {
    if !path.exists() {
        return None;
    }

    let index = match FlatIndex::load(path) {
        Ok(index) => index,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "catalog index unreadable");
            return None;
        }
    };

    let in_sync = index.dimension() == dimension && catalog.matches_keys(index.keys());

    if !in_sync {
        tracing::warn!(
            path = %path.display(),
            index_rows = index.size(),
            catalog_rows = catalog.len(),
            "catalog index does not match the catalog"
        );
        return None;
    }

    tracing::info!(path = %path.display(), rows = index.size(), "catalog index loaded");
    Some(index)
}

