// Database module
// Flat JSON files for embeddings and their metadata, and the SQLite store
// behind the structured-query tools

pub mod files;
pub mod sqlite;

pub use files::{EmbeddingRecord, EmbeddingStore, EmbeddingsFile, MetadataFile, MetadataRecord};
