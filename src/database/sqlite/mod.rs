use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Pool, Row, Sqlite, TypeInfo, ValueRef};
use std::fmt::{self, Write as _};
use std::path::Path;
use tracing::{debug, info};

use crate::{RagError, Result};


pub type DbPool = Pool<Sqlite>;

/// Read-only handle on the relational store queried by the SQL tools
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

/// A single SQLite value, rendered the way a Python tuple would show it
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Result set of an ad-hoc query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl Database {
    /// Open an existing database file without write access
    #[inline]
    pub async fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RagError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        info!("Opened database {} (read-only)", path.display());
        Ok(Self { pool })
    }

    /// `CREATE` statement of every user table, each followed by up to
    /// `sample_rows` example rows
    #[inline]
    pub async fn table_info(&self, sample_rows: usize) -> Result<String> {
        let tables: Vec<(String, String)> = sqlx::query_as(
            "SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RagError::Database(format!("Failed to read schema: {}", e)))?;

        let mut sections = Vec::with_capacity(tables.len());
        for (name, create_sql) in tables {
            let mut section = create_sql.trim().to_string();

            if sample_rows > 0 {
                let sample = self
                    .run(&format!(
                        "SELECT * FROM \"{}\" LIMIT {}",
                        name.replace('"', "\"\""),
                        sample_rows
                    ))
                    .await?;

                let _ = write!(
                    section,
                    "\n\n/*\n{} rows from {} table:\n{}\n*/",
                    sample.rows.len(),
                    name,
                    sample.tabular()
                );
            }

            sections.push(section);
        }

        debug!("Described {} tables", sections.len());
        Ok(sections.join("\n\n"))
    }

    /// Execute `query` and collect every row
    #[inline]
    pub async fn run(&self, query: &str) -> Result<QueryOutput> {
        debug!("Running query: {}", query);

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RagError::Database(e.to_string()))?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryOutput { columns, rows })
    }
}

fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    (0..row.len())
        .map(|index| {
            let raw = row
                .try_get_raw(index)
                .map_err(|e| RagError::Database(e.to_string()))?;

            if raw.is_null() {
                return Ok(SqlValue::Null);
            }

            let type_name = raw.type_info().name().to_string();
            let value = match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(index).map(SqlValue::Integer),
                "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(index).map(SqlValue::Real),
                "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(SqlValue::Blob),
                _ => row.try_get_unchecked::<String, _>(index).map(SqlValue::Text),
            };

            value.map_err(|e| RagError::Database(e.to_string()))
        })
        .collect()
}

impl fmt::Display for SqlValue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Real(value) => write!(f, "{:?}", value),
            Self::Text(value) => f.write_str(&quote_text(value)),
            Self::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Quote `text` the way Python's `repr` quotes a `str`: single quotes unless
/// the text holds a single quote and no double quote
fn quote_text(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c == quote => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push(quote);
    quoted
}

impl QueryOutput {
    /// Tab-separated header and rows, used for schema samples
    #[inline]
    pub fn tabular(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(self.columns.join("\t"));
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|value| match value {
                    SqlValue::Text(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect();
            lines.push(cells.join("\t"));
        }
        lines.join("\n")
    }
}

/// Renders rows as a list of tuples, e.g. `[('A1', 3), ('B2', 5)]`
impl fmt::Display for QueryOutput {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "(")?;
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            if row.len() == 1 {
                write!(f, ",")?;
            }
            write!(f, ")")?;
        }
        write!(f, "]")
    }
}
