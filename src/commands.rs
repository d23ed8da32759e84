use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::corpus::load_corpus;
use crate::database::EmbeddingStore;
use crate::embeddings::{EmbeddingGenerator, OllamaClient};
use crate::index::SimilarityIndex;
use crate::index::staleness::StalenessReport;
use crate::mcp::McpServer;
use crate::retrieval::Retriever;
use crate::tools::ToolRegistry;

/// Characters of document text shown per search hit
const PREVIEW_CHARS: usize = 160;

/// Embed the corpus and persist the embeddings and metadata files
#[inline]
pub fn embed(config: &Config, corpus: Option<PathBuf>) -> Result<()> {
    let corpus_path = corpus.unwrap_or_else(|| config.corpus_path());
    let store = EmbeddingStore::from_config(config);

    let client = OllamaClient::new(&config.embedding).context("Failed to create embedding client")?;
    client
        .health_check()
        .context("Embedding service is not ready")?;

    let summary = EmbeddingGenerator::new(client)
        .run(&corpus_path, &store)
        .with_context(|| format!("Failed to embed corpus {}", corpus_path.display()))?;

    println!(
        "Embedded {} documents with {} ({} dimensions) in {:.1}s",
        summary.documents,
        summary.model,
        summary.dimension,
        summary.duration.as_secs_f64()
    );
    println!("  Embeddings: {}", summary.embeddings_path.display());
    println!("  Metadata:   {}", summary.metadata_path.display());
    Ok(())
}

/// Print the documents most similar to `query`
#[inline]
pub fn search(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(config.search.top_k);
    let store = EmbeddingStore::from_config(config);
    let index = SimilarityIndex::load(&store)
        .context("Failed to load embeddings; run 'project-rag embed' first")?;

    let client = OllamaClient::new(&config.embedding).context("Failed to create embedding client")?;
    let retriever = Retriever::new(index, client);
    let hits = retriever.query(query, top_k)?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for hit in &hits {
        println!(
            "{}. {} (score {:.4}, relevance {:.4})",
            hit.rank,
            hit.id(),
            hit.score,
            hit.relevance
        );
        println!("   {}", preview(&hit.metadata.text));
    }
    Ok(())
}

/// Report configuration, service health, file presence and staleness
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("Project RAG Status");
    println!("{}", "=".repeat(40));

    println!("Embedding service:");
    match OllamaClient::new(&config.embedding) {
        Ok(client) => match client.health_check() {
            Ok(()) => println!(
                "  OK: {} serving {}",
                client.base_url(),
                config.embedding.model
            ),
            Err(e) => println!("  Unavailable: {}", e),
        },
        Err(e) => println!("  Misconfigured: {}", e),
    }

    println!("Files:");
    let store = EmbeddingStore::from_config(config);
    for (label, path) in [
        ("Corpus", config.corpus_path()),
        ("Embeddings", store.embeddings_path().to_path_buf()),
        ("Metadata", store.metadata_path().to_path_buf()),
        ("Data directory", config.data_dir()),
        ("Database", config.database_path()),
    ] {
        let state = if path.exists() { "present" } else { "missing" };
        println!("  {}: {} ({})", label, path.display(), state);
    }

    println!("Staleness:");
    if !store.exists() {
        println!("  No embeddings yet; run 'project-rag embed'");
        return Ok(());
    }
    let (embeddings, metadata) = store.load()?;
    match load_corpus(config.corpus_path()) {
        Ok(documents) => {
            let report =
                StalenessReport::compute(&documents, &embeddings, &metadata, &config.embedding.model);
            println!("  {}", report.summary());
            for project in &report.stale_projects {
                println!(
                    "    {}: {} missing, {} orphaned, {} changed",
                    project.project_name, project.missing, project.orphaned, project.changed
                );
            }
            if report.is_stale {
                println!(
                    "  {} document issue(s); rerun 'project-rag embed' to regenerate",
                    report.total_issues()
                );
            }
        }
        Err(e) => {
            warn!("Could not load corpus for staleness check: {}", e);
            println!("  Corpus unavailable: {}", e);
        }
    }
    Ok(())
}

/// Print every registered tool grouped by capability
#[inline]
pub fn list_tools(config: &Config) -> Result<()> {
    let registry = ToolRegistry::from_config(config)?;
    for (capability, tools) in registry.by_capability() {
        println!("{}:", capability);
        for tool in tools {
            println!(
                "  {} - {}",
                tool.name,
                tool.description.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}

/// Invoke one tool with a JSON object of arguments
#[inline]
pub async fn call_tool(config: &Config, name: &str, arguments: Option<&str>) -> Result<()> {
    let arguments: Map<String, Value> = match arguments {
        None => Map::new(),
        Some(raw) => match serde_json::from_str(raw).context("Tool arguments must be JSON")? {
            Value::Object(map) => map,
            other => bail!("Tool arguments must be a JSON object, got {}", other),
        },
    };

    let registry = ToolRegistry::from_config(config)?;
    let result = registry.call(name, &arguments).await?;
    let text = result.text_content();
    if result.is_error {
        return Err(anyhow!("Tool {} failed: {}", name, text));
    }
    println!("{}", text);
    Ok(())
}

/// Serve the tools over MCP on stdio until the client disconnects
#[inline]
pub async fn serve_mcp(config: &Config) -> Result<()> {
    let registry = ToolRegistry::from_config(config)?;
    let names: Vec<String> = registry.definitions().into_iter().map(|t| t.name).collect();
    let server = Arc::new(McpServer::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        registry,
    ));

    // stdout carries the protocol
    eprintln!("MCP server initialized with tools: {}", names.join(", "));
    eprintln!("Serving on stdio; press Ctrl+C to stop");

    tokio::select! {
        result = Arc::clone(&server).serve_stdio() => {
            result.context("MCP server failed")?;
            info!("MCP server stopped normally");
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Received interrupt signal, shutting down");
        }
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut)
}
