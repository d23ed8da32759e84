// Retrieval tools: semantic search over the embedded corpus and read-only
// access to the project files under the data directory.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{Capability, ToolHandler, optional_str, optional_usize, required_str};
use crate::database::EmbeddingStore;
use crate::embeddings::Embedder;
use crate::index::SimilarityIndex;
use crate::mcp::protocol::Tool;
use crate::retrieval::Retriever;
use crate::{RagError, Result};

/// Semantic search over the persisted embeddings.
///
/// The index is loaded on first use and kept for the life of the tool.
pub struct VectorSearchTool<E: Embedder> {
    store: EmbeddingStore,
    embedder: Arc<E>,
    default_top_k: usize,
    retriever: OnceCell<Arc<Retriever<Arc<E>>>>,
}

impl<E> VectorSearchTool<E>
where
    E: Embedder + Send + Sync + 'static,
{
    #[inline]
    pub fn new(store: EmbeddingStore, embedder: Arc<E>, default_top_k: usize) -> Self {
        Self {
            store,
            embedder,
            default_top_k,
            retriever: OnceCell::new(),
        }
    }

    async fn retriever(&self) -> Result<Arc<Retriever<Arc<E>>>> {
        self.retriever
            .get_or_try_init(|| async {
                let store = self.store.clone();
                let embedder = Arc::clone(&self.embedder);
                let index = tokio::task::spawn_blocking(move || SimilarityIndex::load(&store))
                    .await
                    .map_err(|e| RagError::Other(e.into()))??;
                info!("Loaded search index with {} documents", index.len());
                Ok::<_, RagError>(Arc::new(Retriever::new(index, embedder)))
            })
            .await
            .map(Arc::clone)
    }
}

#[async_trait]
impl<E> ToolHandler for VectorSearchTool<E>
where
    E: Embedder + Send + Sync + 'static,
{
    #[inline]
    fn capability(&self) -> Capability {
        Capability::Retrieval
    }

    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "vector_search".to_string(),
            description: Some(
                "Search project documents by semantic similarity to a natural language query"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural language search query"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": format!("Number of results to return (default: {})", self.default_top_k)
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn handle(&self, arguments: &Map<String, Value>) -> Result<String> {
        let query = required_str(arguments, "query")?.to_string();
        let top_k = optional_usize(arguments, "top_k")?.unwrap_or(self.default_top_k);
        debug!("Vector search: query='{}', top_k={}", query, top_k);

        let retriever = self.retriever().await?;
        // Embedding calls block on HTTP
        tokio::task::spawn_blocking(move || retriever.query_text(&query, top_k))
            .await
            .map_err(|e| RagError::Other(e.into()))?
    }
}

/// Reads one file below the data directory
pub struct ReadFileTool {
    data_dir: PathBuf,
}

impl ReadFileTool {
    #[inline]
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

#[async_trait]
impl ToolHandler for ReadFileTool {
    #[inline]
    fn capability(&self) -> Capability {
        Capability::Retrieval
    }

    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "read_file".to_string(),
            description: Some("Read the contents of a file".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Relative path to the file within the data directory"
                    }
                },
                "required": ["file_path"],
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn handle(&self, arguments: &Map<String, Value>) -> Result<String> {
        let file_path = required_str(arguments, "file_path")?;
        let full_path = resolve_within(&self.data_dir, file_path)?;

        if !full_path.is_file() {
            return Err(RagError::Tool(format!("File not found: {}", file_path)));
        }

        debug!("Reading {}", full_path.display());
        tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| RagError::Tool(format!("Error reading file: {}", e)))
    }
}

/// Lists files below a directory of the data directory, recursively
pub struct ListFilesTool {
    data_dir: PathBuf,
}

impl ListFilesTool {
    #[inline]
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Sorted paths, relative to the data directory, of every file under `directory`
    #[inline]
    pub fn list(&self, directory: &str) -> Result<Vec<String>> {
        let dir_path = resolve_within(&self.data_dir, directory)?;
        if !dir_path.is_dir() {
            return Err(RagError::Tool(format!("Directory not found: {}", directory)));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir_path).follow_links(false) {
            let entry = entry.map_err(|e| RagError::Tool(format!("Error listing files: {}", e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.data_dir) {
                files.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl ToolHandler for ListFilesTool {
    #[inline]
    fn capability(&self) -> Capability {
        Capability::Retrieval
    }

    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "list_files".to_string(),
            description: Some("List all files in a directory".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Relative path to directory (default: current directory)"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn handle(&self, arguments: &Map<String, Value>) -> Result<String> {
        let directory = optional_str(arguments, "directory")?.unwrap_or(".");
        let files = self.list(directory)?;
        debug!("Listed {} files under {}", files.len(), directory);
        Ok(files.join("\n"))
    }
}

/// Join `relative` onto `base`, refusing anything that could leave `base`
fn resolve_within(base: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = Path::new(relative);
    let escapes = candidate.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(RagError::Tool(format!(
            "Path must stay within the data directory: {}",
            relative
        )));
    }

    let joined = base.join(candidate);
    // Symlinks may still point outside
    if let (Ok(real_base), Ok(real_path)) = (base.canonicalize(), joined.canonicalize()) {
        if !real_path.starts_with(&real_base) {
            return Err(RagError::Tool(format!(
                "Path must stay within the data directory: {}",
                relative
            )));
        }
    }
    Ok(joined)
}
