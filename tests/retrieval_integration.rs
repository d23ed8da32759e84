#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end retrieval against a mocked embedding service: corpus on disk,
// embeddings generated and persisted, then queried through the tools.

use project_rag::config::Config;
use project_rag::corpus::load_corpus;
use project_rag::database::EmbeddingStore;
use project_rag::embeddings::{EmbeddingGenerator, OllamaClient};
use project_rag::index::SimilarityIndex;
use project_rag::index::staleness::StalenessReport;
use project_rag::retrieval::Retriever;
use project_rag::tools::ToolRegistry;
use project_rag::{EmbeddingFailure, RagError};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "test-embed";

const CORPUS: &str = r#"[
    {
        "project_name": "Churn Model",
        "owner": "data-science",
        "md": [
            { "README.md": "Gradient boosted trees predict churn." }
        ]
    },
    {
        "project_name": "Claims Triage",
        "md": [
            { "README.md": "A BERT classifier routes incoming claims." },
            { "deploy.md": "Served behind a batch scoring job." }
        ]
    }
]"#;

/// Composed document texts and the vectors the mock service returns for them
fn document_vectors() -> Vec<(&'static str, [f32; 3])> {
    vec![
        (
            "Project Name: Churn Model\nGradient boosted trees predict churn.",
            [1.0, 0.0, 0.0],
        ),
        (
            "Project Name: Claims Triage\nA BERT classifier routes incoming claims.",
            [0.0, 1.0, 0.0],
        ),
        (
            "Project Name: Claims Triage\nServed behind a batch scoring job.",
            [0.0, 0.0, 1.0],
        ),
    ]
}

async fn mount_embedding(server: &MockServer, input: &str, vector: [f32; 3]) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": MODEL, "input": input })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": MODEL,
            "embeddings": [vector]
        })))
        .mount(server)
        .await;
}

async fn mock_service() -> MockServer {
    let server = MockServer::start().await;
    for (text, vector) in document_vectors() {
        mount_embedding(&server, text, vector).await;
    }
    mount_embedding(&server, "which project predicts churn", [0.9, 0.3, 0.1]).await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": MODEL }]
        })))
        .mount(&server)
        .await;
    server
}

fn test_config(dir: &TempDir, server: &MockServer) -> Config {
    let mut config = Config::load(dir.path()).expect("defaults load");
    config.embedding.host = server.address().ip().to_string();
    config.embedding.port = server.address().port();
    config.embedding.model = MODEL.to_string();
    config.embedding.embedding_dimension = 3;
    config.data.corpus_path = PathBuf::from("projects.json");
    fs::write(config.corpus_path(), CORPUS).expect("should write corpus");
    config
}

fn embed_corpus(config: &Config) -> EmbeddingStore {
    let client = OllamaClient::new(&config.embedding).expect("client builds");
    client.health_check().expect("mock serves the model");

    let store = EmbeddingStore::from_config(config);
    let summary = EmbeddingGenerator::new(client)
        .with_progress(false)
        .run(&config.corpus_path(), &store)
        .expect("generation succeeds");
    assert_eq!(summary.documents, 3);
    assert_eq!(summary.model, MODEL);
    assert_eq!(summary.dimension, 3);
    store
}

#[tokio::test]
async fn embed_then_query_ranks_documents() {
    let server = mock_service().await;
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = test_config(&temp_dir, &server);

    let store = embed_corpus(&config);
    assert!(store.exists());

    let index = SimilarityIndex::load(&store).expect("index loads");
    assert_eq!(index.len(), 3);
    assert_eq!(index.model(), MODEL);

    let client = OllamaClient::new(&config.embedding).expect("client builds");
    let retriever = Retriever::new(index, client);
    let hits = retriever
        .query("which project predicts churn", 2)
        .expect("query succeeds");

    let ids: Vec<&str> = hits.iter().map(|hit| hit.id()).collect();
    assert_eq!(ids, vec!["Churn Model/README.md", "Claims Triage/README.md"]);
    assert_eq!(hits[0].rank, 1);
    assert_eq!(hits[1].rank, 2);
    assert!(hits[0].score > hits[1].score);
    assert!(hits[0].relevance > 0.5 && hits[0].relevance <= 1.0);
    assert_eq!(
        hits[0].metadata.extra.get("owner").map(String::as_str),
        Some("data-science")
    );
}

#[tokio::test]
async fn unchanged_corpus_is_not_stale_until_edited() {
    let server = mock_service().await;
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = test_config(&temp_dir, &server);
    let store = embed_corpus(&config);
    let (embeddings, metadata) = store.load().expect("files load");

    let documents = load_corpus(config.corpus_path()).expect("corpus loads");
    let report = StalenessReport::compute(&documents, &embeddings, &metadata, MODEL);
    assert!(!report.is_stale);

    let edited = CORPUS.replace("batch scoring job", "streaming endpoint");
    fs::write(config.corpus_path(), edited).expect("should rewrite corpus");
    let documents = load_corpus(config.corpus_path()).expect("corpus loads");
    let report = StalenessReport::compute(&documents, &embeddings, &metadata, MODEL);
    assert!(report.is_stale);
    assert_eq!(report.changed, vec!["Claims Triage/deploy.md".to_string()]);
    assert_eq!(report.stale_projects.len(), 1);
    assert_eq!(report.stale_projects[0].project_name, "Claims Triage");
}

#[tokio::test]
async fn querying_with_a_different_model_is_refused() {
    let server = mock_service().await;
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = test_config(&temp_dir, &server);
    let store = embed_corpus(&config);

    config.embedding.model = "other-model".to_string();
    let index = SimilarityIndex::load(&store).expect("index loads");
    let client = OllamaClient::new(&config.embedding).expect("client builds");
    let err = Retriever::new(index, client)
        .query("which project predicts churn", 1)
        .expect_err("model mismatch");

    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingFailure::ModelMismatch { .. })
    ));
}

#[tokio::test]
async fn vector_search_tool_uses_persisted_embeddings() {
    let server = mock_service().await;
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = test_config(&temp_dir, &server);
    embed_corpus(&config);

    let registry = ToolRegistry::from_config(&config).expect("registry builds");
    let mut arguments = Map::new();
    arguments.insert(
        "query".to_string(),
        Value::String("which project predicts churn".to_string()),
    );
    arguments.insert("top_k".to_string(), json!(1));

    let result = registry
        .call("vector_search", &arguments)
        .await
        .expect("tool exists");

    assert!(!result.is_error, "{}", result.text_content());
    let text = result.text_content();
    assert!(text.starts_with("Score: "));
    assert!(text.contains("Gradient boosted trees predict churn."));
    assert!(!text.contains("BERT"));
}

#[tokio::test]
async fn failed_generation_leaves_no_files() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = test_config(&temp_dir, &server);

    let client = OllamaClient::new(&config.embedding).expect("client builds");
    let store = EmbeddingStore::from_config(&config);
    let err = EmbeddingGenerator::new(client)
        .with_progress(false)
        .run(&config.corpus_path(), &store)
        .expect_err("quota failure aborts the run");

    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingFailure::Quota)
    ));
    assert!(!store.exists());
}
