use super::*;
use crate::RagError;
use crate::embeddings::testing::HashEmbedder;
use std::fs;
use tempfile::TempDir;

const CORPUS: &str = r#"[
    {
        "project_name": "Churn",
        "md": [{ "README.md": "XGBoost churn model" }, { "USAGE.md": "run the notebook" }],
        "owner": "data-science"
    },
    {
        "project_name": "Claims",
        "md": [{ "README.md": "BERT claims classifier" }]
    }
]"#;

fn write_corpus(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("projects.json");
    fs::write(&path, content).expect("should write corpus");
    path
}

fn store_in(dir: &Path) -> EmbeddingStore {
    EmbeddingStore::new(dir.join("text_embeddings.json"), dir.join("metadata.json"))
}

#[test]
fn every_vector_has_the_model_dimension() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let documents = load_corpus(write_corpus(temp_dir.path(), CORPUS)).expect("corpus loads");

    let generator = EmbeddingGenerator::new(HashEmbedder::new(256)).with_progress(false);
    let (embeddings, metadata) = generator.generate(&documents).expect("generation succeeds");

    assert_eq!(embeddings.model, "hash-embedder");
    assert_eq!(embeddings.dimension, 256);
    assert_eq!(embeddings.records.len(), 3);
    assert!(embeddings.records.iter().all(|r| r.vector.len() == 256));

    let ids: Vec<&str> = metadata.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["Churn/README.md", "Churn/USAGE.md", "Claims/README.md"]);
    assert_eq!(metadata.records[0].text, "Project Name: Churn\nXGBoost churn model");
    assert_eq!(generator.embedder().calls(), 3);
}

#[test]
fn first_failure_aborts_without_partial_output() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let corpus = write_corpus(temp_dir.path(), CORPUS);
    let store = store_in(temp_dir.path());

    let generator =
        EmbeddingGenerator::new(HashEmbedder::new(256).failing_on(2)).with_progress(false);
    let err = generator
        .run(&corpus, &store)
        .expect_err("second call fails");

    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingFailure::Quota)
    ));
    // No retry and no further documents after the failure
    assert_eq!(generator.embedder().calls(), 2);
    assert!(!store.embeddings_path().exists());
    assert!(!store.metadata_path().exists());
}

#[test]
fn wrong_dimension_is_an_embedding_failure() {
    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn model_id(&self) -> &str {
            "short"
        }

        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 2.0])
        }
    }

    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let documents = load_corpus(write_corpus(temp_dir.path(), CORPUS)).expect("corpus loads");

    let err = EmbeddingGenerator::new(ShortEmbedder)
        .with_progress(false)
        .generate(&documents)
        .expect_err("short vector should fail");
    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingFailure::InvalidResponse(_))
    ));
}

#[test]
fn non_finite_vector_is_an_embedding_failure() {
    struct OverflowEmbedder;

    impl Embedder for OverflowEmbedder {
        fn model_id(&self) -> &str {
            "overflow"
        }

        fn dimension(&self) -> usize {
            3
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![f32::INFINITY, 0.0, 0.0])
        }
    }

    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());

    let err = EmbeddingGenerator::new(OverflowEmbedder)
        .with_progress(false)
        .run(&write_corpus(temp_dir.path(), CORPUS), &store)
        .expect_err("infinite component should fail");
    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingFailure::InvalidResponse(_))
    ));
    assert!(!store.exists());
}

#[test]
fn rerun_on_unchanged_corpus_is_idempotent() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let corpus = write_corpus(temp_dir.path(), CORPUS);
    let store = store_in(temp_dir.path());
    let generator = EmbeddingGenerator::new(HashEmbedder::new(256)).with_progress(false);

    let first = generator.run(&corpus, &store).expect("first run succeeds");
    let first_files = store.load().expect("files load");
    let first_bytes = fs::read(store.embeddings_path()).expect("embeddings readable");

    let second = generator.run(&corpus, &store).expect("second run succeeds");
    let second_files = store.load().expect("files load");

    assert_eq!(first.documents, 3);
    assert_eq!(first.documents, second.documents);
    assert_eq!(first_files, second_files);
    assert_eq!(
        first_bytes,
        fs::read(store.embeddings_path()).expect("embeddings readable")
    );
}

#[test]
fn empty_corpus_writes_empty_files() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let corpus = write_corpus(temp_dir.path(), "[]");
    let store = store_in(temp_dir.path());

    let summary = EmbeddingGenerator::new(HashEmbedder::new(8))
        .with_progress(false)
        .run(&corpus, &store)
        .expect("empty corpus is fine");

    assert_eq!(summary.documents, 0);
    assert_eq!(summary.embeddings_path, store.embeddings_path());
    let (embeddings, metadata) = store.load().expect("files load");
    assert!(embeddings.records.is_empty());
    assert!(metadata.records.is_empty());
    assert_eq!(embeddings.dimension, 8);
}

#[test]
fn missing_corpus_is_input_not_found() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());

    let err = EmbeddingGenerator::new(HashEmbedder::new(8))
        .with_progress(false)
        .run(&temp_dir.path().join("nope.json"), &store)
        .expect_err("missing corpus fails");
    assert!(matches!(err, RagError::InputNotFound { .. }));
}
