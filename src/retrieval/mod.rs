//! Query interface over a [`SimilarityIndex`].
//!
//! A [`Retriever`] pairs an index with the embedder that produced it, so a
//! free-text query is embedded by the same model as the stored documents.


use tracing::{debug, info, warn};

use crate::embeddings::Embedder;
use crate::index::{SearchHit, SimilarityIndex};
use crate::{EmbeddingFailure, Result};

pub struct Retriever<E: Embedder> {
    index: SimilarityIndex,
    embedder: E,
}

impl<E: Embedder> Retriever<E> {
    #[inline]
    pub fn new(index: SimilarityIndex, embedder: E) -> Self {
        if index.model() != embedder.model_id() {
            warn!(
                "Index was built with model '{}' but queries use '{}'; rerun embedding generation",
                index.model(),
                embedder.model_id()
            );
        }
        Self { index, embedder }
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Return the `top_k` documents most similar to `query`.
    ///
    /// A blank query or an empty index returns no hits without contacting
    /// the embedding service.
    #[inline]
    pub fn query(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() || self.index.is_empty() || top_k == 0 {
            debug!("Nothing to search for; returning no results");
            return Ok(Vec::new());
        }

        if self.index.model() != self.embedder.model_id() {
            return Err(EmbeddingFailure::ModelMismatch {
                index: self.index.model().to_string(),
                query: self.embedder.model_id().to_string(),
            }
            .into());
        }

        let vector = self.embedder.embed(query)?;
        let hits = self.index.search(&vector, top_k)?;

        info!(
            "Query matched {} of {} documents (top_k {})",
            hits.len(),
            self.index.len(),
            top_k
        );
        Ok(hits)
    }

    /// Run `query` and render the hits with [`format_results`]
    #[inline]
    pub fn query_text(&self, query: &str, top_k: usize) -> Result<String> {
        self.query(query, top_k).map(|hits| format_results(&hits))
    }
}

/// Render hits as score-and-text blocks separated by `---` lines
#[inline]
pub fn format_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("Score: {:.4}\n{}\n", hit.score, hit.metadata.text))
        .collect::<Vec<_>>()
        .join("\n---\n")
}
