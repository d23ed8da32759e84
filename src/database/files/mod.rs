// Persisted embedding and metadata files
// Both files list records in the same order; they are written as a pair

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::{Document, DocumentMetadata};
use crate::{RagError, Result};

/// One document's vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
}

/// Contents of the embeddings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsFile {
    /// Model that produced every vector in `records`
    pub model: String,
    pub dimension: usize,
    pub records: Vec<EmbeddingRecord>,
}

/// Metadata for one embedded document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: String,
    pub source_path: PathBuf,
    pub project_name: String,
    pub filename: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Contents of the metadata file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFile {
    pub records: Vec<MetadataRecord>,
}

impl From<&Document> for MetadataRecord {
    #[inline]
    fn from(document: &Document) -> Self {
        let DocumentMetadata {
            project_name,
            filename,
            extra,
        } = &document.metadata;

        Self {
            id: document.id.clone(),
            source_path: document.source_path.clone(),
            project_name: project_name.clone(),
            filename: filename.clone(),
            text: document.text.clone(),
            extra: extra.clone(),
        }
    }
}

/// Reads and writes the embeddings/metadata file pair
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    embeddings_path: PathBuf,
    metadata_path: PathBuf,
}

impl EmbeddingStore {
    #[inline]
    pub fn new(embeddings_path: PathBuf, metadata_path: PathBuf) -> Self {
        Self {
            embeddings_path,
            metadata_path,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.embeddings_file(), config.metadata_file())
    }

    #[inline]
    pub fn embeddings_path(&self) -> &Path {
        &self.embeddings_path
    }

    #[inline]
    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Whether both files are present
    #[inline]
    pub fn exists(&self) -> bool {
        self.embeddings_path.is_file() && self.metadata_path.is_file()
    }

    /// Write both files, or neither.
    ///
    /// Each file is staged next to its destination and renamed into place
    /// only once both have been written. If the second rename fails, the
    /// previous embeddings file is restored.
    #[inline]
    pub fn save(&self, embeddings: &EmbeddingsFile, metadata: &MetadataFile) -> Result<()> {
        check_pair(embeddings, metadata).map_err(|reason| RagError::MalformedDocument {
            path: self.embeddings_path.clone(),
            reason,
        })?;

        let embeddings_json =
            serde_json::to_string(embeddings).map_err(|e| RagError::Other(e.into()))?;
        let metadata_json =
            serde_json::to_string_pretty(metadata).map_err(|e| RagError::Other(e.into()))?;

        let staged_embeddings = staging_path(&self.embeddings_path);
        let staged_metadata = staging_path(&self.metadata_path);

        let staged = stage(&self.embeddings_path, &staged_embeddings, &embeddings_json)
            .and_then(|()| stage(&self.metadata_path, &staged_metadata, &metadata_json));
        if let Err(e) = staged {
            remove_quietly(&staged_embeddings);
            remove_quietly(&staged_metadata);
            return Err(e);
        }

        let backup = backup_path(&self.embeddings_path);
        let had_previous = self.embeddings_path.is_file();
        if had_previous {
            fs::rename(&self.embeddings_path, &backup).inspect_err(|_| {
                remove_quietly(&staged_embeddings);
                remove_quietly(&staged_metadata);
            })?;
        }

        let committed = fs::rename(&staged_embeddings, &self.embeddings_path)
            .and_then(|()| fs::rename(&staged_metadata, &self.metadata_path));

        if let Err(e) = committed {
            warn!("Failed to commit embedding files, restoring previous state: {}", e);
            remove_quietly(&staged_embeddings);
            remove_quietly(&staged_metadata);
            if had_previous {
                if let Err(restore) = fs::rename(&backup, &self.embeddings_path) {
                    warn!("Failed to restore previous embeddings file: {}", restore);
                }
            } else {
                remove_quietly(&self.embeddings_path);
            }
            return Err(e.into());
        }

        if had_previous {
            remove_quietly(&backup);
        }

        info!(
            "Saved {} embeddings to {} and metadata to {}",
            embeddings.records.len(),
            self.embeddings_path.display(),
            self.metadata_path.display()
        );
        Ok(())
    }

    /// Load and cross-check both files
    #[inline]
    pub fn load(&self) -> Result<(EmbeddingsFile, MetadataFile)> {
        let embeddings: EmbeddingsFile = read_json(&self.embeddings_path)?;
        let metadata: MetadataFile = read_json(&self.metadata_path)?;

        check_pair(&embeddings, &metadata).map_err(|reason| RagError::MalformedDocument {
            path: self.embeddings_path.clone(),
            reason,
        })?;

        debug!(
            "Loaded {} embeddings ({} dimensions, model {})",
            embeddings.records.len(),
            embeddings.dimension,
            embeddings.model
        );
        Ok((embeddings, metadata))
    }
}

fn check_pair(
    embeddings: &EmbeddingsFile,
    metadata: &MetadataFile,
) -> std::result::Result<(), String> {
    if embeddings.records.len() != metadata.records.len() {
        return Err(format!(
            "{} embeddings but {} metadata records",
            embeddings.records.len(),
            metadata.records.len()
        ));
    }

    for (position, (record, meta)) in embeddings
        .records
        .iter()
        .zip(metadata.records.iter())
        .enumerate()
    {
        if record.id != meta.id {
            return Err(format!(
                "record {} is '{}' in embeddings but '{}' in metadata",
                position, record.id, meta.id
            ));
        }
        if record.vector.len() != embeddings.dimension {
            return Err(format!(
                "record '{}' has {} dimensions, expected {}",
                record.id,
                record.vector.len(),
                embeddings.dimension
            ));
        }
        if record.vector.iter().any(|value| !value.is_finite()) {
            return Err(format!("record '{}' has non-finite values", record.id));
        }
    }

    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(RagError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| RagError::MalformedDocument {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn stage(destination: &Path, staged: &Path, content: &str) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(staged, content)?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "bak")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
