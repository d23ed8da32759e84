// Embeddings module
// Embedding service client and the corpus embedding generator

pub mod generator;
pub mod ollama;
#[cfg(test)]
pub(crate) mod testing;

pub use generator::{EmbeddingGenerator, GenerationSummary};
pub use ollama::OllamaClient;

use crate::Result;

/// A model that turns text into fixed-length vectors.
///
/// Documents and queries must be embedded by the same model for their
/// vectors to be comparable, so both the generator and the query interface
/// take an `Embedder` rather than a concrete client.
pub trait Embedder {
    /// Identifier of the model, recorded alongside persisted vectors
    fn model_id(&self) -> &str;

    /// Output dimensionality every vector must have
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    #[inline]
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    #[inline]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }
}

impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    #[inline]
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    #[inline]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }
}
