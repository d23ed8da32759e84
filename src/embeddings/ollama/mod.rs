
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::{EmbeddingFailure, RagError, Result};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    dimension: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .embedding_url()
            .map_err(|e| RagError::Config(format!("Failed to build embedding URL: {}", e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            dimension: config.embedding_dimension as usize,
            agent,
        })
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test connection to the embedding server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for embedding server at {}", self.base_url);

        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            info!(
                "Health check passed for {} with model {}",
                self.base_url, self.model
            );
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(RagError::Config(format!(
                "Model '{}' is not available. Available models: {:?}",
                self.model, available_models
            )))
        }
    }

    /// List all models the server offers
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(classify_error)?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingFailure::InvalidResponse(e.to_string()))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate the embedding for a single text.
    ///
    /// Exactly one request is made. Failures are classified and returned
    /// without retrying.
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.endpoint("/api/embed")?;
        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: text,
        })
        .map_err(|e| RagError::Other(e.into()))?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| {
                let failure = classify_error(e);
                error!("Embedding request to {} failed: {}", url, failure);
                failure
            })?;

        let embedding = parse_embedding(&response_text)?;

        debug!("Generated embedding with {} dimensions", embedding.len());

        Ok(embedding)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagError::Config(format!("Failed to build URL for {}: {}", path, e)))
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn model_id(&self) -> &str {
        &self.model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.generate_embedding(text)?;
        if embedding.len() != self.dimension {
            return Err(EmbeddingFailure::InvalidResponse(format!(
                "expected {} dimensions from model '{}', got {}",
                self.dimension,
                self.model,
                embedding.len()
            ))
            .into());
        }
        Ok(embedding)
    }
}

fn parse_embedding(response_text: &str) -> std::result::Result<Vec<f32>, EmbeddingFailure> {
    let response: EmbedResponse = serde_json::from_str(response_text)
        .map_err(|e| EmbeddingFailure::InvalidResponse(format!("unparsable body: {}", e)))?;

    response
        .embeddings
        .and_then(|embeddings| embeddings.into_iter().next())
        .or(response.embedding)
        .filter(|embedding| !embedding.is_empty())
        .ok_or_else(|| {
            EmbeddingFailure::InvalidResponse("No embedding found in the response".to_string())
        })
        .and_then(|embedding| {
            match embedding.iter().position(|value| !value.is_finite()) {
                Some(position) => Err(EmbeddingFailure::InvalidResponse(format!(
                    "non-finite value at position {} of the embedding",
                    position
                ))),
                None => Ok(embedding),
            }
        })
}

fn classify_error(error: ureq::Error) -> EmbeddingFailure {
    match error {
        ureq::Error::StatusCode(status @ (401 | 403)) => EmbeddingFailure::Auth(status),
        ureq::Error::StatusCode(429) => EmbeddingFailure::Quota,
        ureq::Error::StatusCode(status) => EmbeddingFailure::Service(status),
        other => EmbeddingFailure::Network(other.to_string()),
    }
}
