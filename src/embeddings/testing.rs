// Deterministic embedders for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};

use super::Embedder;
use crate::{EmbeddingFailure, Result};

/// Bag-of-words embedder: each lowercase alphanumeric token adds 1.0 to an
/// FNV-1a hashed bucket. Identical texts always produce identical vectors.
pub(crate) struct HashEmbedder {
    model: String,
    dimension: usize,
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl HashEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            model: "hash-embedder".to_string(),
            dimension,
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    pub(crate) fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Make the `n`th call (1-based) fail with a quota error
    pub(crate) fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn bucket(token: &str, dimension: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % dimension as u64) as usize
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(EmbeddingFailure::Quota.into());
        }

        let mut vector = vec![0.0; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            vector[bucket(&token.to_lowercase(), self.dimension)] += 1.0;
        }
        Ok(vector)
    }
}
