//! Per-user taste preferences.
//!
//! [`PreferenceStore`] maps a user id to the union of every ingredient and
//! cocktail the user has said they like. Each merge re-embeds the user's full
//! summary into a companion [`FlatIndex`], and both the JSON mapping and the
//! index are written back to disk.
//!
//! The [`HistoryPolicy`] decides what happens to the previous embedding: the
//! default [`HistoryPolicy::Replace`] keeps one row per user and overwrites it,
//! [`HistoryPolicy::Append`] keeps every historical summary.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::{AdvisorError, Result};
use crate::index::FlatIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// One embedding per user, updated in place on every merge.
    #[default]
    Replace,
    /// A new embedding per merge; older summaries stay in the index.
    Append,
}

impl std::fmt::Display for HistoryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::Append => "append",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Lower-cased ingredient names.
    #[serde(default)]
    pub ingredients: BTreeSet<String>,
    #[serde(default)]
    pub cocktails: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPreferences {
    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty() && self.cocktails.is_empty()
    }

    /// Text embedded for this user: `"Ingredients: a, b. Cocktails: c."`
    pub fn summary_text(&self) -> String {
        format!(
            "Ingredients: {}. Cocktails: {}.",
            join(&self.ingredients),
            join(&self.cocktails)
        )
    }

    /// Union `ingredients` and `cocktails` into this entry. Returns `true` if
    /// anything new was added.
    fn absorb<I, C>(&mut self, ingredients: I, cocktails: C) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let mut changed = false;
        for name in ingredients {
            let name = name.as_ref().trim();
            if !name.is_empty() {
                changed |= self.ingredients.insert(name.to_lowercase());
            }
        }
        for name in cocktails {
            let name = name.as_ref().trim();
            if !name.is_empty() {
                changed |= self.cocktails.insert(name.to_string());
            }
        }
        changed
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Result of a [`PreferenceStore::merge`].
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub preferences: UserPreferences,
    /// Whether the merge added anything new.
    pub changed: bool,
    /// Position of the user's embedding in the preference index.
    pub position: usize,
}

/// A merged entry and its embedding, not yet written to the store.
#[derive(Debug, Clone)]
pub struct PendingMerge {
    user_id: String,
    preferences: UserPreferences,
    changed: bool,
    vector: Vec<f32>,
}

/// Bytes of the preference index and JSON mapping at one point in time.
pub struct Snapshot {
    index_path: PathBuf,
    index_bytes: Vec<u8>,
    json: Vec<u8>,
}

impl Snapshot {
    /// Write the index, then the mapping, each via atomic write-replace.
    pub fn write(&self) -> Result<()> {
        crate::storage::write_atomic(&self.index_path, |w| w.write_all(&self.index_bytes))?;
        crate::storage::write_atomic(&json_path_for(&self.index_path), |w| {
            w.write_all(&self.json)
        })?;
        Ok(())
    }
}

/// Findings of [`PreferenceStore::check_consistency`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    /// Users with no embedding in the index.
    pub missing_vectors: Vec<String>,
    /// Index keys with no matching user.
    pub orphan_vectors: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_vectors.is_empty() && self.orphan_vectors.is_empty()
    }
}

/// A user similar to the requester, by preference embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarUser {
    pub user_id: String,
    pub distance: f32,
}

pub struct PreferenceStore {
    entries: BTreeMap<String, UserPreferences>,
    index: FlatIndex,
    policy: HistoryPolicy,
    index_path: PathBuf,
}

impl PreferenceStore {
    /// Empty store writing its index to `index_path` and the mapping to
    /// `<index_path>.json`.
    pub fn new(index_path: impl Into<PathBuf>, dimension: usize, policy: HistoryPolicy) -> Result<Self> {
        Ok(Self {
            entries: BTreeMap::new(),
            index: FlatIndex::new(dimension)?,
            policy,
            index_path: index_path.into(),
        })
    }

    /// Load the index and JSON mapping if present, otherwise start empty.
    ///
    /// A stored index of a different dimension than the embedder is dropped
    /// and rebuilt by [`reconcile`](Self::reconcile).
    pub fn open(index_path: impl Into<PathBuf>, dimension: usize, policy: HistoryPolicy) -> Result<Self> {
        let mut store = Self::new(index_path, dimension, policy)?;

        let json_path = store.json_path();
        if json_path.exists() {
            let contents = std::fs::read_to_string(&json_path)?;
            store.entries = serde_json::from_str(&contents)?;
        }

        if store.index_path.exists() {
            let index = FlatIndex::load(&store.index_path)?;
            if index.dimension() == dimension {
                store.index = index;
            } else {
                tracing::warn!(
                    stored = index.dimension(),
                    expected = dimension,
                    "preference index dimension changed, discarding stored vectors"
                );
            }
        }

        tracing::info!(
            users = store.entries.len(),
            vectors = store.index.size(),
            policy = %policy,
            "preference store opened"
        );
        Ok(store)
    }

    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn json_path(&self) -> PathBuf {
        json_path_for(&self.index_path)
    }

    /// Preferences for `user_id`; empty sets for unknown users.
    pub fn get(&self, user_id: &str) -> UserPreferences {
        self.entries.get(user_id).cloned().unwrap_or_default()
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union new preferences into the user's entry, re-embed the full summary,
    /// write it to the index per the history policy, and persist.
    ///
    /// The embedding is computed before anything is mutated, so a failed
    /// embed leaves the store untouched.
    pub fn merge<I, C>(
        &mut self,
        user_id: &str,
        ingredients: I,
        cocktails: C,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<MergeOutcome>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let pending = self.prepare_merge(user_id, ingredients, cocktails, embedder)?;
        let outcome = self.apply(pending)?;
        self.persist()?;
        Ok(outcome)
    }

    /// First half of [`merge`](Self::merge): the merged entry and its
    /// embedding, computed without touching the store.
    pub fn prepare_merge<I, C>(
        &self,
        user_id: &str,
        ingredients: I,
        cocktails: C,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<PendingMerge>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let mut merged = self.get(user_id);
        let changed = merged.absorb(ingredients, cocktails);
        merged.updated_at = Some(Utc::now());

        let vector = embedder
            .embed(&merged.summary_text())
            .map_err(AdvisorError::Embedding)?;

        Ok(PendingMerge {
            user_id: user_id.to_string(),
            preferences: merged,
            changed,
            vector,
        })
    }

    /// Second half of [`merge`](Self::merge): write the prepared entry and
    /// vector into memory. Does not persist.
    ///
    /// The entry replaces whatever the user has now, so callers must not let
    /// another merge for the same user land between prepare and apply.
    pub fn apply(&mut self, pending: PendingMerge) -> Result<MergeOutcome> {
        let PendingMerge {
            user_id,
            preferences,
            changed,
            vector,
        } = pending;

        let position = match self.policy {
            HistoryPolicy::Replace => self.index.upsert(&user_id, &vector)?,
            HistoryPolicy::Append => self.index.insert(user_id.as_str(), &vector)?,
        };
        self.entries.insert(user_id.clone(), preferences.clone());

        tracing::info!(
            user_id = %user_id,
            changed,
            ingredients = preferences.ingredients.len(),
            cocktails = preferences.cocktails.len(),
            vectors = self.index.size(),
            "preferences merged"
        );

        Ok(MergeOutcome {
            preferences,
            changed,
            position,
        })
    }

    /// Write the index, then the JSON mapping, each via atomic write-replace.
    pub fn persist(&self) -> Result<()> {
        self.snapshot()?.write()
    }

    /// Serialized copy of the store, to be written after any lock on the
    /// store has been released.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            index_path: self.index_path.clone(),
            index_bytes: self.index.to_bytes(),
            json: serde_json::to_vec_pretty(&self.entries)?,
        })
    }

    /// Compare the mapping against the index keys.
    pub fn check_consistency(&self) -> ConsistencyReport {
        let keys: HashSet<&str> = self.index.keys().iter().map(String::as_str).collect();

        let missing_vectors = self
            .entries
            .keys()
            .filter(|user| !keys.contains(user.as_str()))
            .cloned()
            .collect();

        let mut orphan_vectors: Vec<String> = keys
            .into_iter()
            .filter(|key| !self.entries.contains_key(*key))
            .map(str::to_string)
            .collect();
        orphan_vectors.sort();

        ConsistencyReport {
            missing_vectors,
            orphan_vectors,
        }
    }

    /// Repair a mapping and index that drifted apart (e.g. after a crash
    /// between the two writes): embed users lacking a vector, drop vectors
    /// lacking a user. Persists only if something changed.
    pub fn reconcile(&mut self, embedder: &dyn EmbeddingProvider) -> Result<ConsistencyReport> {
        let report = self.check_consistency();
        if report.is_consistent() {
            return Ok(report);
        }

        for key in &report.orphan_vectors {
            self.index.remove(key);
        }

        if !report.missing_vectors.is_empty() {
            let texts: Vec<String> = report
                .missing_vectors
                .iter()
                .map(|user| self.entries[user].summary_text())
                .collect();
            let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let vectors = embedder
                .embed_batch(&text_refs)
                .map_err(AdvisorError::Embedding)?;
            self.index
                .insert_batch(report.missing_vectors.iter().map(String::as_str).zip(vectors))?;
        }

        tracing::warn!(
            missing = report.missing_vectors.len(),
            orphans = report.orphan_vectors.len(),
            "preference store reconciled"
        );
        self.persist()?;
        Ok(report)
    }

    /// Users whose latest preference embedding is closest to `user_id`'s.
    /// Empty if the user has no embedding.
    pub fn similar_users(&self, user_id: &str, k: usize) -> Result<Vec<SimilarUser>> {
        // the last row for a user is its most recent summary
        let Some(position) = self.index.keys().iter().rposition(|key| key == user_id) else {
            return Ok(Vec::new());
        };
        let Some(target) = self.index.vector(position) else {
            return Ok(Vec::new());
        };

        let neighbors = self.index.query(target, self.index.size())?;
        let mut seen = HashSet::from([user_id]);
        Ok(neighbors
            .iter()
            .filter(|n| seen.insert(n.key.as_str()))
            .take(k)
            .map(|n| SimilarUser {
                user_id: n.key.clone(),
                distance: n.distance,
            })
            .collect())
    }
}

/// Companion JSON path: the index path with `.json` appended.
pub fn json_path_for(index_path: &Path) -> PathBuf {
    let mut name = index_path.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}
