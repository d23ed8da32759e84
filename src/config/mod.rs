// Configuration management module
// TOML settings for the embedding endpoint, data files, search and logging

pub mod settings;


pub use settings::{Config, ConfigError, DataConfig, EmbeddingConfig, LoggingConfig, SearchConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Print the effective configuration to stdout
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration directory: {}", config.get_base_dir().display());
    println!();
    println!("Embedding service:");
    println!("  URL: {}", config.embedding.embedding_url()?);
    println!("  Model: {}", config.embedding.model);
    println!("  Dimension: {}", config.embedding.embedding_dimension);
    println!("  Timeout: {}s", config.embedding.timeout_seconds);
    println!();
    println!("Data:");
    println!("  Corpus: {}", config.corpus_path().display());
    println!("  Embeddings file: {}", config.embeddings_file().display());
    println!("  Metadata file: {}", config.metadata_file().display());
    println!("  Data directory: {}", config.data_dir().display());
    println!("  Database: {}", config.database_path().display());
    println!();
    println!("Search:");
    println!("  Top k: {}", config.search.top_k);
    println!();
    println!("Logging:");
    println!("  Level: {}", config.logging.level);
    match config.log_directory() {
        Some(dir) => println!("  Directory: {}", dir.display()),
        None => println!("  Directory: (stderr only)"),
    }
    Ok(())
}
