//! Capability tools exposed to an agent runtime.
//!
//! Every tool belongs to exactly one [`Capability`]. The [`ToolRegistry`]
//! keeps tools in registration order and routes calls by name; a failing
//! tool produces an error result for the caller instead of a protocol
//! failure.


pub mod reasoning;
pub mod retrieval;
pub mod structured_query;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::EmbeddingStore;
use crate::embeddings::{Embedder, OllamaClient};
use crate::mcp::protocol::{CallToolResult, Tool};
use crate::{RagError, Result};

pub use reasoning::CurrentTimeTool;
pub use retrieval::{ListFilesTool, ReadFileTool, VectorSearchTool};
pub use structured_query::{GetSchemaTool, RunSqlTool, SqlSource};

/// The closed set of things a tool can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// General reasoning helpers that touch no stored data
    Reasoning,
    /// Document search and file access
    Retrieval,
    /// Read-only queries against the relational store
    StructuredQuery,
}

impl Capability {
    pub const ALL: [Self; 3] = [Self::Reasoning, Self::Retrieval, Self::StructuredQuery];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Retrieval => "retrieval",
            Self::StructuredQuery => "structured_query",
        }
    }
}

impl fmt::Display for Capability {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn capability(&self) -> Capability;

    fn definition(&self) -> Tool;

    /// Run the tool. An `Err` becomes an error result, not a protocol error.
    async fn handle(&self, arguments: &Map<String, Value>) -> Result<String>;
}

#[derive(Default)]
pub struct ToolRegistry {
    handlers: Vec<Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every tool, backed by the configured embedding service,
    /// data directory and database
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = Arc::new(OllamaClient::new(&config.embedding)?);
        Self::with_embedder(config, embedder)
    }

    /// As [`from_config`](Self::from_config), with a caller supplied embedder
    #[inline]
    pub fn with_embedder<E>(config: &Config, embedder: Arc<E>) -> Result<Self>
    where
        E: Embedder + Send + Sync + 'static,
    {
        let sql = SqlSource::new(config.database_path());
        let mut registry = Self::new();

        registry.register(CurrentTimeTool::new())?;
        registry.register(VectorSearchTool::new(
            EmbeddingStore::from_config(config),
            embedder,
            config.search.top_k,
        ))?;
        registry.register(ReadFileTool::new(config.data_dir()))?;
        registry.register(ListFilesTool::new(config.data_dir()))?;
        registry.register(GetSchemaTool::new(sql.clone()))?;
        registry.register(RunSqlTool::new(sql))?;

        info!("Registered {} tools", registry.len());
        Ok(registry)
    }

    /// Add a tool; names must be unique
    #[inline]
    pub fn register<H>(&mut self, handler: H) -> Result<()>
    where
        H: ToolHandler + 'static,
    {
        let name = handler.definition().name;
        if self.get(&name).is_some() {
            return Err(RagError::Tool(format!("Tool already registered: {}", name)));
        }
        debug!("Registered tool: {} ({})", name, handler.capability());
        self.handlers.push(Box::new(handler));
        Ok(())
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.definition().name == name)
            .map(|handler| handler.as_ref())
    }

    /// Tool definitions in registration order
    #[inline]
    pub fn definitions(&self) -> Vec<Tool> {
        self.handlers.iter().map(|handler| handler.definition()).collect()
    }

    /// Definitions grouped by capability; empty groups are omitted
    #[inline]
    pub fn by_capability(&self) -> Vec<(Capability, Vec<Tool>)> {
        Capability::ALL
            .into_iter()
            .filter_map(|capability| {
                let tools: Vec<Tool> = self
                    .handlers
                    .iter()
                    .filter(|handler| handler.capability() == capability)
                    .map(|handler| handler.definition())
                    .collect();
                (!tools.is_empty()).then_some((capability, tools))
            })
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the tool called `name`.
    ///
    /// Only an unknown name is an `Err`; failures inside the tool are
    /// returned as an error result carrying the message.
    #[inline]
    pub async fn call(&self, name: &str, arguments: &Map<String, Value>) -> Result<CallToolResult> {
        let handler = self
            .get(name)
            .ok_or_else(|| RagError::Tool(format!("Unknown tool: {}", name)))?;

        debug!("Calling tool {} with {} argument(s)", name, arguments.len());
        match handler.handle(arguments).await {
            Ok(text) => Ok(CallToolResult::text(text)),
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                Ok(CallToolResult::error(tool_error_message(&e)))
            }
        }
    }
}

fn tool_error_message(error: &RagError) -> String {
    match error {
        RagError::Tool(message) => message.clone(),
        other => other.to_string(),
    }
}

/// A required string argument
pub(crate) fn required_str<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RagError::Tool(format!("Missing required parameter: {}", key)))
}

/// An optional string argument; a present non-string value is an error
pub(crate) fn optional_str<'a>(
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(RagError::Tool(format!("Parameter {} must be a string", key))),
    }
}

/// An optional non-negative integer argument
pub(crate) fn optional_usize(arguments: &Map<String, Value>, key: &str) -> Result<Option<usize>> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                RagError::Tool(format!("Parameter {} must be a non-negative integer", key))
            }),
    }
}
