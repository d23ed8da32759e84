use anyhow::Context;
use clap::{Parser, Subcommand};
use project_rag::commands::{call_tool, embed, list_tools, search, serve_mcp, show_status};
use project_rag::config::{Config, get_config_dir, show_config};
use project_rag::telemetry::Telemetry;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "project-rag")]
#[command(about = "Semantic retrieval over project documentation with capability tools")]
#[command(version)]
struct Cli {
    /// Configuration directory (default: ~/.project-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate embeddings for the corpus and persist them
    Embed {
        /// Corpus JSON file or directory, overriding the configured path
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Search the embedded corpus
    Search {
        /// Free-text query
        query: String,
        /// Number of results (default from config)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show service health, data files and staleness
    Status,
    /// List the registered tools by capability
    Tools,
    /// Invoke a single tool
    Call {
        /// Tool name, e.g. "vector_search"
        tool: String,
        /// Arguments as a JSON object, e.g. '{"query": "churn"}'
        arguments: Option<String>,
    },
    /// Start the MCP tool server on stdio
    Serve,
    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let config = Config::load(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;

    let telemetry = Telemetry::init(&config.logging, config.log_directory().as_deref())?;

    let result = match cli.command {
        Commands::Embed { corpus } => embed(&config, corpus),
        Commands::Search { query, top_k } => search(&config, &query, top_k),
        Commands::Status => show_status(&config),
        Commands::Tools => list_tools(&config),
        Commands::Call { tool, arguments } => call_tool(&config, &tool, arguments.as_deref()).await,
        Commands::Serve => serve_mcp(&config).await,
        Commands::Config { show } => {
            if show {
                show_config(&config)
            } else {
                println!("Edit {} to change settings", config.config_file_path().display());
                println!("Use 'project-rag config --show' to print the effective configuration");
                Ok(())
            }
        }
    };

    telemetry.shutdown();
    result
}
