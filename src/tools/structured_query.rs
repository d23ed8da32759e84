// Structured query tools over the read-only SQLite database

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{Capability, ToolHandler, required_str};
use crate::database::sqlite::Database;
use crate::mcp::protocol::Tool;
use crate::{RagError, Result};

/// Sample rows shown per table by `get_schema`
const SCHEMA_SAMPLE_ROWS: usize = 3;

/// Lazily opened database shared by the SQL tools.
///
/// A missing database only fails the calls that need it.
#[derive(Debug, Clone)]
pub struct SqlSource {
    path: PathBuf,
    database: Arc<OnceCell<Database>>,
}

impl SqlSource {
    #[inline]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            database: Arc::new(OnceCell::new()),
        }
    }

    #[inline]
    pub async fn database(&self) -> Result<&Database> {
        self.database
            .get_or_try_init(|| Database::open_read_only(&self.path))
            .await
    }
}

pub struct GetSchemaTool {
    source: SqlSource,
}

impl GetSchemaTool {
    #[inline]
    pub fn new(source: SqlSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ToolHandler for GetSchemaTool {
    #[inline]
    fn capability(&self) -> Capability {
        Capability::StructuredQuery
    }

    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "get_schema".to_string(),
            description: Some(
                "Get database schema information for available tables and columns".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn handle(&self, _arguments: &Map<String, Value>) -> Result<String> {
        let database = self.source.database().await?;
        database
            .table_info(SCHEMA_SAMPLE_ROWS)
            .await
            .map_err(|e| RagError::Tool(format!("Error getting schema: {}", e)))
    }
}

pub struct RunSqlTool {
    source: SqlSource,
}

impl RunSqlTool {
    #[inline]
    pub fn new(source: SqlSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ToolHandler for RunSqlTool {
    #[inline]
    fn capability(&self) -> Capability {
        Capability::StructuredQuery
    }

    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "run_sql".to_string(),
            description: Some(
                "Execute a SQL query against the SQLite database and return raw text results"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "SQL query to execute"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn handle(&self, arguments: &Map<String, Value>) -> Result<String> {
        let query = required_str(arguments, "query")?;
        debug!("Running SQL: {}", query);

        let database = self.source.database().await?;
        database
            .run(query)
            .await
            .map(|output| output.to_string())
            .map_err(|e| RagError::Tool(format!("Error executing SQL: {}", e)))
    }
}
