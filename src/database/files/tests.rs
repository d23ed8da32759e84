use super::*;
use tempfile::TempDir;

fn sample_pair() -> (EmbeddingsFile, MetadataFile) {
    let embeddings = EmbeddingsFile {
        model: "test-model".to_string(),
        dimension: 3,
        records: vec![
            EmbeddingRecord {
                id: "Churn/README.md".to_string(),
                vector: vec![0.1, 0.2, 0.3],
            },
            EmbeddingRecord {
                id: "Claims/README.md".to_string(),
                vector: vec![0.3, 0.2, 0.1],
            },
        ],
    };
    let metadata = MetadataFile {
        records: vec![
            metadata_record("Churn/README.md", "Churn", "Project Name: Churn\nXGBoost"),
            metadata_record("Claims/README.md", "Claims", "Project Name: Claims\nBERT"),
        ],
    };
    (embeddings, metadata)
}

fn metadata_record(id: &str, project: &str, text: &str) -> MetadataRecord {
    MetadataRecord {
        id: id.to_string(),
        source_path: PathBuf::from("projects.json"),
        project_name: project.to_string(),
        filename: "README.md".to_string(),
        text: text.to_string(),
        extra: BTreeMap::new(),
    }
}

fn store_in(dir: &Path) -> EmbeddingStore {
    EmbeddingStore::new(
        dir.join("data/text_embeddings.json"),
        dir.join("data/metadata.json"),
    )
}

fn leftover_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .expect("should read dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp") || name.ends_with(".bak"))
        .collect()
}

#[test]
fn save_then_load_preserves_order_and_values() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());
    let (embeddings, metadata) = sample_pair();

    assert!(!store.exists());
    store.save(&embeddings, &metadata).expect("should save pair");
    assert!(store.exists());

    let (loaded_embeddings, loaded_metadata) = store.load().expect("should load pair");
    assert_eq!(loaded_embeddings, embeddings);
    assert_eq!(loaded_metadata, metadata);
    assert!(leftover_files(&temp_dir.path().join("data")).is_empty());
}

#[test]
fn metadata_file_is_key_value_json() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());
    let (embeddings, metadata) = sample_pair();
    store.save(&embeddings, &metadata).expect("should save pair");

    let raw = fs::read_to_string(store.metadata_path()).expect("should read metadata");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("metadata is json");
    assert_eq!(value["records"][0]["id"], "Churn/README.md");
    assert_eq!(value["records"][0]["project_name"], "Churn");
    assert!(value["records"][0].get("extra").is_none());

    let raw = fs::read_to_string(store.embeddings_path()).expect("should read embeddings");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("embeddings are json");
    assert_eq!(value["model"], "test-model");
    assert_eq!(value["dimension"], 3);
    assert_eq!(value["records"][1]["id"], "Claims/README.md");
}

#[test]
fn mismatched_pair_is_not_written() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());
    let (mut embeddings, metadata) = sample_pair();
    embeddings.records[1].vector.push(0.9);

    let err = store
        .save(&embeddings, &metadata)
        .expect_err("bad dimension should fail");
    assert!(matches!(err, RagError::MalformedDocument { .. }));
    assert!(!store.embeddings_path().exists());
    assert!(!store.metadata_path().exists());
}

#[test]
fn non_finite_vectors_are_not_written() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());
    let (mut embeddings, metadata) = sample_pair();
    embeddings.records[0].vector[1] = f32::INFINITY;

    let err = store
        .save(&embeddings, &metadata)
        .expect_err("infinite component should fail");
    assert!(matches!(
        err,
        RagError::MalformedDocument { reason, .. } if reason.contains("non-finite")
    ));
    assert!(!store.embeddings_path().exists());
}

#[test]
fn failed_commit_keeps_previous_files() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).expect("should create data dir");

    let store = store_in(temp_dir.path());
    fs::write(store.embeddings_path(), "previous").expect("should write old embeddings");
    // A directory in the metadata slot makes the second rename fail
    fs::create_dir_all(store.metadata_path().join("blocker")).expect("should create blocker");

    let (embeddings, metadata) = sample_pair();
    assert!(store.save(&embeddings, &metadata).is_err());

    let kept = fs::read_to_string(store.embeddings_path()).expect("old file should remain");
    assert_eq!(kept, "previous");
    assert!(leftover_files(&data_dir).is_empty());
}

#[test]
fn missing_files_are_input_not_found() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());

    let err = store.load().expect_err("missing files should fail");
    assert!(matches!(err, RagError::InputNotFound { path } if path == store.embeddings_path()));
}

#[test]
fn corrupt_file_is_malformed() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());
    let (embeddings, metadata) = sample_pair();
    store.save(&embeddings, &metadata).expect("should save pair");

    fs::write(store.metadata_path(), "{ not json").expect("should corrupt metadata");

    assert!(matches!(
        store.load(),
        Err(RagError::MalformedDocument { .. })
    ));
}

#[test]
fn reordered_metadata_is_rejected_on_load() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let store = store_in(temp_dir.path());
    let (embeddings, mut metadata) = sample_pair();
    store.save(&embeddings, &metadata).expect("should save pair");

    metadata.records.reverse();
    let json = serde_json::to_string(&metadata).expect("should serialize metadata");
    fs::write(store.metadata_path(), json).expect("should overwrite metadata");

    let err = store.load().expect_err("out-of-order metadata should fail");
    match err {
        RagError::MalformedDocument { reason, .. } => assert!(reason.contains("record 0")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn metadata_record_from_document() {
    let mut extra = BTreeMap::new();
    extra.insert("owner".to_string(), "ds".to_string());
    let document = Document {
        id: "P/README.md".to_string(),
        source_path: PathBuf::from("corpus/p.json"),
        text: "Project Name: P\nbody".to_string(),
        metadata: DocumentMetadata {
            project_name: "P".to_string(),
            filename: "README.md".to_string(),
            extra,
        },
    };

    let record = MetadataRecord::from(&document);
    assert_eq!(record.id, "P/README.md");
    assert_eq!(record.source_path, PathBuf::from("corpus/p.json"));
    assert_eq!(record.text, "Project Name: P\nbody");
    assert_eq!(record.extra.get("owner").map(String::as_str), Some("ds"));
}
