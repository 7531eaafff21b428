//! End-to-end tests: load → index → retrieve → generate, with deterministic providers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FailingEmbedder, KeywordEmbedder, ScriptedModel, ShortBatchEmbedder, StalledModel};
use docrag::document::{CHUNK_INDEX_KEY, FILE_TYPE_KEY, SOURCE_KEY};
use docrag::{
    Document, EmbeddingProvider, GroundedGenerator, IdStrategy, InMemoryVectorStore, Indexer,
    LoaderRegistry, LocalVectorStore, RagError, RecursiveChunker, Retriever, Role, Session,
    VectorStore,
};

const FRUIT: [&str; 5] = ["apple", "banana", "cherry", "damson", "elder"];
const COLLECTION: &str = "document_embeddings";

fn indexer(
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    id_strategy: IdStrategy,
) -> Indexer {
    Indexer::builder()
        .embedding_provider(embedder)
        .vector_store(store)
        .chunker(Arc::new(RecursiveChunker::new(1000, 200).unwrap()))
        .collection(COLLECTION)
        .id_strategy(id_strategy)
        .build()
        .unwrap()
}

fn fruit_documents(words: &[&str]) -> Vec<Document> {
    words
        .iter()
        .map(|word| Document::new(format!("{word}.txt"), format!("All about the {word}.")))
        .collect()
}

#[tokio::test]
async fn single_record_is_returned_at_k1() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    indexer(embedder.clone(), store.clone(), IdStrategy::ContentHash)
        .index_documents(&fruit_documents(&["apple"]))
        .await
        .unwrap();

    let retriever = Retriever::open(embedder, store, COLLECTION).await.unwrap().with_top_k(1);
    let results = retriever.retrieve("anything at all").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "All about the apple.");
}

#[tokio::test]
async fn closest_chunk_ranks_first() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    indexer(embedder.clone(), store.clone(), IdStrategy::ContentHash)
        .index_documents(&fruit_documents(&["apple", "banana", "cherry"]))
        .await
        .unwrap();

    let retriever = Retriever::open(embedder, store, COLLECTION).await.unwrap();
    let results = retriever.retrieve("tell me about banana").await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].source(), Some("banana.txt"));
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn top_k_bounds_result_count() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    let report = indexer(embedder.clone(), store.clone(), IdStrategy::ContentHash)
        .index_documents(&fruit_documents(&FRUIT))
        .await
        .unwrap();
    assert_eq!(report.records_written, 5);

    let retriever = Retriever::open(embedder, store, COLLECTION).await.unwrap().with_top_k(2);
    assert_eq!(retriever.retrieve("elder").await.unwrap().len(), 2);
    let context = retriever.retrieve_context("elder").await.unwrap();
    assert!(context.starts_with("All about the elder.\n"));
}

#[tokio::test]
async fn uninitialised_index_is_unavailable() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    let retriever = Retriever::open(embedder, store, COLLECTION).await.unwrap();
    let result = retriever.retrieve("apple").await;
    assert!(matches!(result, Err(RagError::IndexUnavailable { .. })));
}

#[tokio::test]
async fn invalid_queries_are_rejected_before_embedding() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    let retriever = Retriever::new(embedder.clone(), store, COLLECTION);

    assert!(matches!(retriever.retrieve("   ").await, Err(RagError::EmptyInput(_))));
    assert!(matches!(
        retriever.retrieve_top_k("apple", 0).await,
        Err(RagError::InvalidConfiguration(_))
    ));
    assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_mismatch_is_rejected_at_open_and_at_index_time() {
    let store = Arc::new(InMemoryVectorStore::new());
    let original = Arc::new(KeywordEmbedder::with_model(&FRUIT, "model-a"));
    indexer(original, store.clone(), IdStrategy::ContentHash)
        .index_documents(&fruit_documents(&["apple"]))
        .await
        .unwrap();

    let other = Arc::new(KeywordEmbedder::with_model(&FRUIT, "model-b"));
    let opened = Retriever::open(other.clone(), store.clone(), COLLECTION).await;
    assert!(matches!(opened, Err(RagError::EmbeddingModelMismatch { .. })));

    let indexed = indexer(other, store.clone(), IdStrategy::ContentHash)
        .index_documents(&fruit_documents(&["banana"]))
        .await;
    assert!(matches!(indexed, Err(RagError::EmbeddingModelMismatch { .. })));
    assert_eq!(store.count(COLLECTION).await.unwrap(), 1);
}

#[tokio::test]
async fn content_hash_reindex_skips_existing_records() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    let indexer = indexer(embedder, store.clone(), IdStrategy::ContentHash);
    let documents = fruit_documents(&["apple", "banana"]);

    let first = indexer.index_documents(&documents).await.unwrap();
    assert_eq!((first.records_written, first.records_skipped), (2, 0));

    let second = indexer.index_documents(&documents).await.unwrap();
    assert_eq!((second.records_written, second.records_skipped), (0, 2));
    assert_eq!(store.count(COLLECTION).await.unwrap(), 2);
}

#[tokio::test]
async fn sequence_reindex_appends_duplicates() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    let indexer = indexer(embedder.clone(), store.clone(), IdStrategy::Sequence);
    let documents = fruit_documents(&["apple", "banana"]);

    indexer.index_documents(&documents).await.unwrap();
    let second = indexer.index_documents(&documents).await.unwrap();
    assert_eq!(second.records_written, 2);

    let ids: Vec<String> =
        store.records(COLLECTION).await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["doc_0", "doc_1", "doc_2", "doc_3"]);

    let retriever = Retriever::open(embedder, store, COLLECTION).await.unwrap();
    let results = retriever.retrieve("apple").await.unwrap();
    assert_eq!(results[0].text, results[1].text);
}

#[tokio::test]
async fn embedding_failure_aborts_before_any_write() {
    let embedder =
        Arc::new(FailingEmbedder { inner: KeywordEmbedder::new(&FRUIT), trigger: "cherry" });
    let store = Arc::new(InMemoryVectorStore::new());
    let result = indexer(embedder, store.clone(), IdStrategy::ContentHash)
        .index_documents(&fruit_documents(&["apple", "banana", "cherry", "damson"]))
        .await;

    assert!(matches!(result, Err(RagError::EmbeddingProvider { .. })));
    assert!(store.collection_info(COLLECTION).await.unwrap().is_none());
    assert_eq!(store.count(COLLECTION).await.unwrap(), 0);
}

#[tokio::test]
async fn short_embedding_batch_is_an_error() {
    let embedder = Arc::new(ShortBatchEmbedder(KeywordEmbedder::new(&FRUIT)));
    let store = Arc::new(InMemoryVectorStore::new());
    let result = indexer(embedder, store.clone(), IdStrategy::ContentHash)
        .index_documents(&fruit_documents(&["apple", "banana"]))
        .await;
    assert!(matches!(result, Err(RagError::EmbeddingProvider { .. })));
    assert_eq!(store.count(COLLECTION).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_documents_are_skipped_and_metadata_is_attached() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    let documents = vec![
        Document::new("blank.txt", "  \n "),
        Document::new("notes/apple.md", "Apple notes."),
    ];
    let report = indexer(embedder, store.clone(), IdStrategy::ContentHash)
        .index_documents(&documents)
        .await
        .unwrap();

    assert_eq!(report.documents_seen, 2);
    assert_eq!(report.documents_skipped, 1);
    assert_eq!(report.chunks_produced, 1);

    let record = &store.records(COLLECTION).await.unwrap()[0];
    assert_eq!(record.metadata[SOURCE_KEY], "notes/apple.md");
    assert_eq!(record.metadata[FILE_TYPE_KEY], "md");
    assert_eq!(record.metadata[CHUNK_INDEX_KEY], "0");
    assert_eq!(record.id.len(), 32);
}

#[tokio::test]
async fn local_index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let docs_dir = dir.path().join("documents");
    std::fs::create_dir(&docs_dir).unwrap();
    std::fs::write(docs_dir.join("apple.txt"), "The apple orchard opens in May.").unwrap();
    std::fs::write(docs_dir.join("cherry.md"), "Cherry picking starts in June.").unwrap();
    let store_dir = dir.path().join("store");

    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    {
        let documents = LoaderRegistry::with_defaults().load_dir(&docs_dir).await.unwrap();
        let store = Arc::new(LocalVectorStore::open(&store_dir).await.unwrap());
        let report = indexer(embedder.clone(), store, IdStrategy::ContentHash)
            .index_documents(&documents)
            .await
            .unwrap();
        assert_eq!(report.records_written, 2);
    }

    let store = Arc::new(LocalVectorStore::open(&store_dir).await.unwrap());
    let retriever = Retriever::open(embedder, store, COLLECTION).await.unwrap().with_top_k(1);
    let results = retriever.retrieve("when does cherry picking start?").await.unwrap();
    assert_eq!(results[0].text, "Cherry picking starts in June.");
}

#[tokio::test]
async fn generator_sends_system_then_user_and_trims() {
    let model = Arc::new(ScriptedModel::new("  The orchard opens in May.\n"));
    let generator = GroundedGenerator::new(model.clone());
    let answer = generator.generate_with_context("apple facts", "When?").await.unwrap();
    assert_eq!(answer, "The orchard opens in May.");

    let requests = model.requests.lock().unwrap();
    let roles: Vec<Role> = requests[0].iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::System, Role::User]);
    assert_eq!(requests[0][1].content, "Context: apple facts\n\nQuestion: When?");
}

#[tokio::test(start_paused = true)]
async fn generator_timeout_is_a_generation_error() {
    let generator =
        GroundedGenerator::new(Arc::new(StalledModel)).with_timeout(Some(Duration::from_secs(5)));
    let result = generator.generate_with_context("ctx", "q").await;
    assert!(matches!(result, Err(RagError::Generation { .. })));
}

#[tokio::test]
async fn session_reports_errors_and_keeps_going() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    indexer(embedder.clone(), store.clone(), IdStrategy::ContentHash)
        .index_documents(&fruit_documents(&["apple", "banana"]))
        .await
        .unwrap();

    let mut model = ScriptedModel::new("It is a fruit.");
    model.fail_on = Some("explode");
    let model = Arc::new(model);
    let retriever = Retriever::open(embedder, store, COLLECTION).await.unwrap();
    let session = Session::new(retriever, GroundedGenerator::new(model.clone()));

    let input = "what is an apple?\nexplode please\n\nwhat is a banana?\nQUIT\nnever asked\n";
    let mut output = Vec::new();
    session.run(input.as_bytes(), &mut output).await.unwrap();
    let output = String::from_utf8(output).unwrap();

    assert_eq!(output.matches("Assistant: It is a fruit.").count(), 2);
    assert_eq!(output.matches("An error occurred: ").count(), 1);
    assert_eq!(model.requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn session_on_empty_index_reports_unavailable() {
    let embedder = Arc::new(KeywordEmbedder::new(&FRUIT));
    let store = Arc::new(InMemoryVectorStore::new());
    let retriever = Retriever::open(embedder, store, COLLECTION).await.unwrap();
    let session =
        Session::new(retriever, GroundedGenerator::new(Arc::new(ScriptedModel::new("unused"))));

    let mut output = Vec::new();
    session.run("apple?\n".as_bytes(), &mut output).await.unwrap();
    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("An error occurred: Index unavailable"));
}
