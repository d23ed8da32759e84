// Staleness detection between the corpus and the persisted embedding files.
// Findings are reported only; nothing here regenerates or deletes records.


use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use tracing::{debug, info, warn};

use crate::corpus::Document;
use crate::database::{EmbeddingsFile, MetadataFile};

/// Differences between the current corpus and the persisted files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessReport {
    /// Number of documents in the corpus
    pub corpus_documents: usize,
    /// Number of persisted embedding records
    pub persisted_records: usize,
    /// Ids present in the corpus but never embedded
    pub missing: Vec<String>,
    /// Ids persisted but no longer in the corpus
    pub orphaned: Vec<String>,
    /// Ids whose composed text differs from the persisted text
    pub changed: Vec<String>,
    /// Persisted model, when it differs from the configured one
    pub model_changed: Option<ModelChange>,
    /// Projects with at least one finding
    pub stale_projects: Vec<ProjectStaleness>,
    pub is_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChange {
    pub persisted: String,
    pub configured: String,
}

/// Findings for a single project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStaleness {
    pub project_name: String,
    pub missing: usize,
    pub orphaned: usize,
    pub changed: usize,
}

impl StalenessReport {
    /// Compare the corpus against a loaded file pair.
    ///
    /// All id lists are sorted so reports are stable across runs.
    #[inline]
    pub fn compute(
        corpus: &[Document],
        embeddings: &EmbeddingsFile,
        metadata: &MetadataFile,
        configured_model: &str,
    ) -> Self {
        debug!(
            "Checking {} corpus documents against {} persisted records",
            corpus.len(),
            metadata.records.len()
        );

        let current: HashMap<&str, &Document> =
            corpus.iter().map(|doc| (doc.id.as_str(), doc)).collect();
        let persisted: HashMap<&str, (&str, &str)> = metadata
            .records
            .iter()
            .map(|record| {
                (
                    record.id.as_str(),
                    (record.text.as_str(), record.project_name.as_str()),
                )
            })
            .collect();

        let mut per_project: BTreeMap<String, ProjectStaleness> = BTreeMap::new();
        let mut tally = |project: &str, update: fn(&mut ProjectStaleness)| {
            let entry = per_project
                .entry(project.to_string())
                .or_insert_with(|| ProjectStaleness {
                    project_name: project.to_string(),
                    missing: 0,
                    orphaned: 0,
                    changed: 0,
                });
            update(entry);
        };

        let mut missing = BTreeSet::new();
        let mut changed = BTreeSet::new();
        for (id, doc) in &current {
            match persisted.get(id) {
                None => {
                    missing.insert(id.to_string());
                    tally(&doc.metadata.project_name, |p| p.missing += 1);
                }
                Some((text, _)) if *text != doc.text => {
                    changed.insert(id.to_string());
                    tally(&doc.metadata.project_name, |p| p.changed += 1);
                }
                Some(_) => {}
            }
        }

        let mut orphaned = BTreeSet::new();
        for (id, (_, project)) in &persisted {
            if !current.contains_key(id) {
                orphaned.insert(id.to_string());
                tally(*project, |p| p.orphaned += 1);
            }
        }

        let model_changed = (embeddings.model != configured_model).then(|| ModelChange {
            persisted: embeddings.model.clone(),
            configured: configured_model.to_string(),
        });

        let is_stale = !missing.is_empty()
            || !orphaned.is_empty()
            || !changed.is_empty()
            || model_changed.is_some();

        let report = Self {
            corpus_documents: corpus.len(),
            persisted_records: embeddings.records.len(),
            missing: missing.into_iter().collect(),
            orphaned: orphaned.into_iter().collect(),
            changed: changed.into_iter().collect(),
            model_changed,
            stale_projects: per_project.into_values().collect(),
            is_stale,
        };

        if report.is_stale {
            report.log_findings();
        } else {
            info!("Embeddings are up to date with the corpus");
        }

        report
    }

    /// One-line human readable summary
    #[inline]
    pub fn summary(&self) -> String {
        if !self.is_stale {
            return format!(
                "Embeddings are up to date: {} documents, {} persisted records",
                self.corpus_documents, self.persisted_records
            );
        }

        let mut summary = format!(
            "Embeddings are stale: {} missing, {} orphaned, {} changed",
            self.missing.len(),
            self.orphaned.len(),
            self.changed.len()
        );
        if let Some(change) = &self.model_changed {
            let _ = write!(
                summary,
                "; model changed from '{}' to '{}'",
                change.persisted, change.configured
            );
        }
        summary
    }

    /// Number of document-level findings; a model change is not counted
    #[inline]
    pub fn total_issues(&self) -> usize {
        self.missing.len() + self.orphaned.len() + self.changed.len()
    }

    fn log_findings(&self) {
        if !self.missing.is_empty() {
            warn!("{} corpus documents have no embedding", self.missing.len());
        }
        if !self.orphaned.is_empty() {
            warn!(
                "{} persisted records are no longer in the corpus",
                self.orphaned.len()
            );
        }
        if !self.changed.is_empty() {
            warn!("{} documents changed since embedding", self.changed.len());
        }
        if let Some(change) = &self.model_changed {
            warn!(
                "Embeddings were generated with '{}' but '{}' is configured",
                change.persisted, change.configured
            );
        }
        for project in &self.stale_projects {
            debug!(
                "Project {}: {} missing, {} orphaned, {} changed",
                project.project_name, project.missing, project.orphaned, project.changed
            );
        }
    }
}
