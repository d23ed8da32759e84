//! In-memory similarity index.
//!
//! The index is a flat list of vectors searched exhaustively by cosine
//! similarity. It is rebuilt wholesale from the persisted files whenever
//! they change; there is no incremental insert or delete protocol.


pub mod staleness;

use std::cmp::Ordering;
use tracing::debug;

use crate::database::{EmbeddingStore, EmbeddingsFile, MetadataFile, MetadataRecord};
use crate::{EmbeddingFailure, RagError, Result};

#[derive(Debug, Clone)]
struct IndexEntry {
    vector: Vec<f32>,
    metadata: MetadataRecord,
}

#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// One ranked match
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// 1-based position in the result list
    pub rank: usize,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
    /// `score` mapped onto `[0, 1]`
    pub relevance: f32,
    pub metadata: MetadataRecord,
}

impl SearchHit {
    #[inline]
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

impl SimilarityIndex {
    #[inline]
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
            entries: Vec::new(),
        }
    }

    /// Build an index from a loaded file pair, keeping file order
    #[inline]
    pub fn from_files(embeddings: EmbeddingsFile, metadata: MetadataFile) -> Result<Self> {
        let mut index = Self::new(embeddings.model, embeddings.dimension);
        for (record, meta) in embeddings.records.into_iter().zip(metadata.records) {
            if record.id != meta.id {
                return Err(RagError::MalformedDocument {
                    path: meta.source_path,
                    reason: format!(
                        "embedding '{}' paired with metadata '{}'",
                        record.id, meta.id
                    ),
                });
            }
            index.insert(record.vector, meta)?;
        }
        debug!(
            "Built index with {} entries ({} dimensions, model {})",
            index.len(),
            index.dimension,
            index.model
        );
        Ok(index)
    }

    #[inline]
    pub fn load(store: &EmbeddingStore) -> Result<Self> {
        let (embeddings, metadata) = store.load()?;
        Self::from_files(embeddings, metadata)
    }

    /// Append an entry; its position is its tie-break order
    #[inline]
    pub fn insert(&mut self, vector: Vec<f32>, metadata: MetadataRecord) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(RagError::MalformedDocument {
                path: metadata.source_path,
                reason: format!("vector for '{}' has non-finite values", metadata.id),
            });
        }
        self.entries.push(IndexEntry { vector, metadata });
        Ok(())
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order. An empty index or `k == 0`
    /// yields no hits regardless of the query.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if query.iter().any(|value| !value.is_finite()) {
            return Err(EmbeddingFailure::InvalidResponse(
                "query vector has non-finite values".to_string(),
            )
            .into());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query, &entry.vector)))
            .collect();

        // Scores are finite here; `sort_by` is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        let hits = scored
            .into_iter()
            .enumerate()
            .map(|(rank, (position, score))| SearchHit {
                rank: rank + 1,
                score,
                relevance: relevance(score),
                metadata: self.entries[position].metadata.clone(),
            })
            .collect();

        Ok(hits)
    }
}

/// Cosine similarity of two equal-length vectors, accumulated in `f64`.
/// Returns `0.0` when either vector has zero norm.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Map a cosine score onto `[0, 1]`
#[inline]
pub fn relevance(score: f32) -> f32 {
    (score + 1.0) / 2.0
}
