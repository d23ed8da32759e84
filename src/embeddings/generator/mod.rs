// Corpus embedding generator
// Embeds every document once, in load order, and persists the file pair.

#[cfg(test)]
mod tests;

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::Embedder;
use crate::corpus::{Document, load_corpus};
use crate::database::{EmbeddingRecord, EmbeddingStore, EmbeddingsFile, MetadataFile, MetadataRecord};
use crate::{EmbeddingFailure, Result};

/// Turns a corpus into the persisted embeddings and metadata files
pub struct EmbeddingGenerator<E: Embedder> {
    embedder: E,
    show_progress: bool,
}

/// Outcome of a completed generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub documents: usize,
    pub model: String,
    pub dimension: usize,
    pub embeddings_path: PathBuf,
    pub metadata_path: PathBuf,
    pub duration: Duration,
}

impl<E: Embedder> EmbeddingGenerator<E> {
    /// Progress is drawn only when a human is watching stderr
    #[inline]
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            show_progress: console::user_attended_stderr(),
        }
    }

    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Embed every document, in order.
    ///
    /// The first failure aborts the whole run; nothing partial is returned.
    #[inline]
    pub fn generate(&self, documents: &[Document]) -> Result<(EmbeddingsFile, MetadataFile)> {
        let model = self.embedder.model_id().to_string();
        let dimension = self.embedder.dimension();
        info!(
            "Generating embeddings for {} documents with model {}",
            documents.len(),
            model
        );

        let bar = self.progress_bar(documents.len());
        let mut embeddings = EmbeddingsFile {
            model,
            dimension,
            records: Vec::with_capacity(documents.len()),
        };
        let mut metadata = MetadataFile {
            records: Vec::with_capacity(documents.len()),
        };

        for document in documents {
            bar.set_message(document.id.clone());
            debug!("Embedding document {}", document.id);

            let vector = self.embedder.embed(&document.text).map_err(|e| {
                error!("Embedding failed for document {}: {}", document.id, e);
                bar.abandon();
                e
            })?;

            if vector.len() != dimension {
                bar.abandon();
                return Err(EmbeddingFailure::InvalidResponse(format!(
                    "document '{}' embedded to {} dimensions, expected {}",
                    document.id,
                    vector.len(),
                    dimension
                ))
                .into());
            }

            if vector.iter().any(|value| !value.is_finite()) {
                bar.abandon();
                return Err(EmbeddingFailure::InvalidResponse(format!(
                    "document '{}' embedded to a vector with non-finite values",
                    document.id
                ))
                .into());
            }

            embeddings.records.push(EmbeddingRecord {
                id: document.id.clone(),
                vector,
            });
            metadata.records.push(MetadataRecord::from(document));
            bar.inc(1);
        }

        bar.finish_and_clear();
        Ok((embeddings, metadata))
    }

    /// Load the corpus at `corpus_path`, embed it, and persist the result
    #[inline]
    pub fn run(&self, corpus_path: &Path, store: &EmbeddingStore) -> Result<GenerationSummary> {
        let started = Instant::now();
        let documents = load_corpus(corpus_path)?;
        let (embeddings, metadata) = self.generate(&documents)?;
        store.save(&embeddings, &metadata)?;

        let summary = GenerationSummary {
            documents: documents.len(),
            model: embeddings.model,
            dimension: embeddings.dimension,
            embeddings_path: store.embeddings_path().to_path_buf(),
            metadata_path: store.metadata_path().to_path_buf(),
            duration: started.elapsed(),
        };
        info!(
            "Embedded {} documents in {:.2}s",
            summary.documents,
            summary.duration.as_secs_f64()
        );
        Ok(summary)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len as u64).with_style(style)
    }
}
