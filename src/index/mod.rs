//! Flat (exhaustive scan) similarity index.
//!
//! [`FlatIndex`] stores fixed-dimension vectors in insertion order, each paired
//! with a stable string key. Queries compute squared Euclidean distance to every
//! row and return the closest `k`, ties broken by lower position. There is no
//! acceleration structure; the scan is O(n·d) per query.

mod serialize;

use std::path::Path;

use serde::Serialize;

use crate::error::{AdvisorError, Result};

/// Largest dimension an index accepts, on construction and when loading.
pub const MAX_DIMENSION: usize = 65_536;

/// One query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    /// Squared Euclidean distance to the query vector.
    pub distance: f32,
    /// Row position at query time.
    pub position: usize,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    keys: Vec<String>,
    /// Row-major, `keys.len() * dimension` values.
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Fails with [`AdvisorError::InvalidDimension`] unless
    /// `1 <= dimension <= MAX_DIMENSION`.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 || dimension > MAX_DIMENSION {
            return Err(AdvisorError::InvalidDimension(dimension));
        }
        Ok(Self {
            dimension,
            keys: Vec::new(),
            vectors: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        (position < self.size())
            .then(|| &self.vectors[position * self.dimension..(position + 1) * self.dimension])
    }

    /// Append a vector, returning its position (the previous size).
    pub fn insert(&mut self, key: impl Into<String>, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;
        let position = self.size();
        self.keys.push(key.into());
        self.vectors.extend_from_slice(vector);
        Ok(position)
    }

    /// Append every item in order. Nothing is appended if any vector has the
    /// wrong dimension.
    pub fn insert_batch<K, V>(&mut self, items: impl IntoIterator<Item = (K, V)>) -> Result<usize>
    where
        K: Into<String>,
        V: AsRef<[f32]>,
    {
        let items: Vec<(K, V)> = items.into_iter().collect();
        for (_, vector) in &items {
            self.check_dimension(vector.as_ref())?;
        }

        let count = items.len();
        self.keys.reserve(count);
        self.vectors.reserve(count * self.dimension);
        for (key, vector) in items {
            self.keys.push(key.into());
            self.vectors.extend_from_slice(vector.as_ref());
        }
        Ok(count)
    }

    /// Replace the vector of the first row keyed `key`, or append a new row.
    /// Returns the row's position.
    pub fn upsert(&mut self, key: &str, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;
        match self.position_of(key) {
            Some(position) => {
                let start = position * self.dimension;
                self.vectors[start..start + self.dimension].copy_from_slice(vector);
                Ok(position)
            }
            None => self.insert(key, vector),
        }
    }

    /// Remove every row keyed `key`. Later rows shift down keeping their
    /// relative order. Returns the number of rows removed.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.size();
        let dimension = self.dimension;
        let mut kept_keys = Vec::with_capacity(before);
        let mut kept_vectors = Vec::with_capacity(self.vectors.len());

        for (k, row) in self.keys.drain(..).zip(self.vectors.chunks_exact(dimension)) {
            if k != key {
                kept_keys.push(k);
                kept_vectors.extend_from_slice(row);
            }
        }

        self.keys = kept_keys;
        self.vectors = kept_vectors;
        before - self.size()
    }

    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position_of(key).is_some()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.vectors.clear();
    }

    /// The `k` nearest rows to `vector`, ascending by squared Euclidean
    /// distance, ties broken by lower position.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() {
            return Err(AdvisorError::EmptyIndex);
        }
        self.check_dimension(vector)?;

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(vector, row))
            .enumerate()
            .map(|(position, distance)| (distance, position))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, position)| Neighbor {
                distance,
                position,
                key: self.keys[position].clone(),
            })
            .collect())
    }

    /// Write the whole index to `path` (atomic write-replace).
    pub fn persist(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes();
        crate::storage::write_atomic(path, |w| std::io::Write::write_all(w, &bytes))?;
        tracing::debug!(path = %path.display(), rows = self.size(), "index persisted");
        Ok(())
    }

    /// Read an index previously written by [`persist`](Self::persist).
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let index = Self::from_bytes(&data).map_err(|reason| AdvisorError::CorruptIndex {
            path: path.to_path_buf(),
            reason,
        })?;
        tracing::debug!(path = %path.display(), rows = index.size(), "index loaded");
        Ok(index)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AdvisorError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
