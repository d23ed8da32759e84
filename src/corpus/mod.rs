//! Corpus loading.
//!
//! A corpus is a JSON file, or a directory of JSON files, each holding one
//! project object or an array of them:
//!
//! ```json
//! [{ "project_name": "Churn Model", "md": [{ "README.md": "..." }], "owner": "ds" }]
//! ```
//!
//! Every `md` entry becomes one [`Document`].


use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{RagError, Result};

/// A single loaded document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub source_path: PathBuf,
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub project_name: String,
    pub filename: String,
    /// Remaining scalar keys of the project object, stringified
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    project_name: String,
    /// File name to markdown content, in source order
    #[serde(default)]
    md: Vec<Map<String, Value>>,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

impl Document {
    /// Identifier for the `filename` entry of `project_name`
    #[inline]
    pub fn make_id(project_name: &str, filename: &str) -> String {
        format!("{}/{}", project_name, filename)
    }

    /// Text handed to the embedding model, prefixed with the project name
    #[inline]
    pub fn compose_text(project_name: &str, content: &str) -> String {
        format!("Project Name: {}\n{}", project_name, content)
    }
}

/// Load every document under `path`, in file order then entry order.
#[inline]
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RagError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    let files = if path.is_dir() {
        collect_json_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut documents = Vec::new();
    let mut seen = HashSet::new();

    for file in &files {
        for document in load_file(file)? {
            if !seen.insert(document.id.clone()) {
                return Err(RagError::MalformedDocument {
                    path: file.clone(),
                    reason: format!("duplicate document id '{}'", document.id),
                });
            }
            documents.push(document);
        }
    }

    info!(
        "Loaded {} documents from {} corpus file(s) at {}",
        documents.len(),
        files.len(),
        path.display()
    );
    Ok(documents)
}

fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if path.is_file() && is_json {
            files.push(path);
        }
    }
    files.sort();
    debug!("Found {} JSON files in {}", files.len(), dir.display());
    Ok(files)
}

fn load_file(path: &Path) -> Result<Vec<Document>> {
    let malformed = |reason: String| RagError::MalformedDocument {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;

    let projects = match parsed {
        Value::Array(entries) => entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                serde_json::from_value::<ProjectEntry>(entry)
                    .map_err(|e| malformed(format!("project {}: {}", position, e)))
            })
            .collect::<Result<Vec<_>>>()?,
        entry @ Value::Object(_) => vec![
            serde_json::from_value::<ProjectEntry>(entry).map_err(|e| malformed(e.to_string()))?,
        ],
        other => {
            return Err(malformed(format!(
                "expected a project object or an array of them, found {}",
                json_kind(&other)
            )));
        }
    };

    let mut documents = Vec::new();
    for project in projects {
        if project.project_name.trim().is_empty() {
            return Err(malformed("project_name cannot be empty".to_string()));
        }

        let extra = scalar_metadata(&project.rest);
        debug!(
            "Project '{}' has {} markdown entries",
            project.project_name,
            project.md.iter().map(Map::len).sum::<usize>()
        );

        for md_file in &project.md {
            for (filename, content) in md_file {
                let Some(content) = content.as_str() else {
                    return Err(malformed(format!(
                        "content of '{}' in project '{}' must be a string, found {}",
                        filename,
                        project.project_name,
                        json_kind(content)
                    )));
                };
                documents.push(Document {
                    id: Document::make_id(&project.project_name, filename),
                    source_path: path.to_path_buf(),
                    text: Document::compose_text(&project.project_name, content),
                    metadata: DocumentMetadata {
                        project_name: project.project_name.clone(),
                        filename: filename.clone(),
                        extra: extra.clone(),
                    },
                });
            }
        }
    }

    Ok(documents)
}

fn scalar_metadata(rest: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    rest.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
