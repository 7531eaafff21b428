//! Subcommand implementations.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use docrag::{
    ChunkStrategy, ChunkingConfig, EmbeddingProvider, Encoding, GroundedGenerator, Indexer,
    LoaderRegistry, LocalVectorStore, OllamaChatModel, OllamaEmbeddingProvider, RagConfig,
    Retriever, Session, SessionInput, UnknownExtensionPolicy, VectorStore,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::info;

use crate::cli::{ChatArgs, ChunksArgs, IndexArgs, TokensArgs};

const SNIPPET_CHARS: usize = 200;

pub async fn chunks(config: &RagConfig, args: ChunksArgs) -> Result<()> {
    let mut chunking = config.chunking.clone();
    if let Some(method) = args.method {
        chunking.strategy = method.into();
    }
    if let Some(size) = args.chunk_size {
        chunking.chunk_size = size;
    }
    if let Some(overlap) = args.chunk_overlap {
        chunking.chunk_overlap = overlap;
    }
    if let Some(encoding) = args.encoding {
        chunking.encoding = encoding.into();
    }
    let chunker = chunking.build_chunker()?;

    let registry = LoaderRegistry::with_defaults().with_policy(UnknownExtensionPolicy::PlainText);
    let document = registry.load(&args.file).await?;
    let chunks = chunker.split_text(&document.text)?;

    let unit = if chunking.strategy == ChunkStrategy::Token { "tokens" } else { "characters" };
    println!(
        "\nChunking method: {} ({} {unit}, {} overlap)",
        chunking.strategy, chunking.chunk_size, chunking.chunk_overlap
    );
    println!("Total number of chunks: {}", chunks.len());
    println!("{}", "-".repeat(80));
    for (i, chunk) in chunks.iter().enumerate() {
        println!("\nChunk {} (length: {} characters):", i + 1, chunk.chars().count());
        println!("{}", "=".repeat(40));
        println!("{}", chunk.trim());
        println!("{}", "=".repeat(40));
    }
    Ok(())
}

pub fn tokens(args: TokensArgs) -> Result<()> {
    let encoding = Encoding::from(args.encoding);
    let bpe = args.tokenizer.is_none();
    let chunking = ChunkingConfig {
        encoding,
        tokenizer_path: args.tokenizer,
        ..ChunkingConfig::default()
    };
    let tokenizer = chunking.tokenizer()?;
    let text = args.text.join(" ");
    let tokens = tokenizer.tokenize(&text)?;

    println!("\nInput text: {text}");
    if bpe {
        println!("Encoding: {encoding}");
    } else {
        println!("Tokenizer: {}", tokenizer.name());
    }
    println!("\nTokens:");
    for (i, token) in tokens.iter().enumerate() {
        let span = format!("bytes {}..{}", token.span.start, token.span.end);
        match token.id {
            Some(id) => println!("{:3}: {:?} (ID: {id}, {span})", i + 1, token.text(&text)),
            None => println!("{:3}: {:?} ({span})", i + 1, token.text(&text)),
        }
    }
    println!("\nTotal tokens: {}", tokens.len());
    if bpe {
        println!("\nThis encoding is used by: {}", encoding.used_by());
    }
    Ok(())
}

async fn embedding_provider(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = OllamaEmbeddingProvider::connect(&config.ollama_url, config.embedding_model.as_str())
        .await
        .with_context(|| {
            format!(
                "cannot reach embedding model '{}' at {}; is Ollama running and the model pulled?",
                config.embedding_model, config.ollama_url
            )
        })?;
    Ok(Arc::new(provider))
}

async fn open_store(config: &RagConfig) -> Result<Arc<dyn VectorStore>> {
    let store = LocalVectorStore::open(&config.store_path)
        .await
        .with_context(|| format!("cannot open vector store at {}", config.store_path.display()))?;
    Ok(Arc::new(store))
}

pub async fn index(config: &RagConfig, args: IndexArgs) -> Result<()> {
    let policy = if args.plain_text_fallback {
        UnknownExtensionPolicy::PlainText
    } else {
        UnknownExtensionPolicy::Fail
    };
    let registry = LoaderRegistry::with_defaults().with_policy(policy);
    let documents = registry
        .load_dir(&args.dir)
        .await
        .with_context(|| format!("cannot load documents from {}", args.dir.display()))?;

    #[cfg(feature = "openai")]
    let embedder: Arc<dyn EmbeddingProvider> = if args.openai {
        Arc::new(docrag::OpenAIEmbeddingProvider::from_env()?)
    } else {
        embedding_provider(config).await?
    };
    #[cfg(not(feature = "openai"))]
    let embedder = embedding_provider(config).await?;

    let indexer = Indexer::builder()
        .embedding_provider(embedder)
        .vector_store(open_store(config).await?)
        .chunker(Arc::from(config.chunking.build_chunker()?))
        .collection(config.collection.clone())
        .id_strategy(args.ids.map_or(config.id_strategy, Into::into))
        .build()?;

    let report = indexer.index_documents(&documents).await?;
    println!("Indexed {report}.");
    println!(
        "Successfully added {} embeddings to collection '{}' in {}.",
        report.records_written,
        config.collection,
        config.store_path.display()
    );
    Ok(())
}

pub async fn inspect(config: &RagConfig) -> Result<()> {
    let store = open_store(config).await?;
    let info = store.collection_info(&config.collection).await?.with_context(|| {
        format!(
            "collection '{}' not found in {}; run `docrag index` first",
            config.collection,
            config.store_path.display()
        )
    })?;
    let records = store.records(&config.collection).await?;

    println!("Collection: {info}");
    println!("Total documents in collection: {}", records.len());
    println!("\nDocuments and their metadata:");
    for (i, record) in records.iter().enumerate() {
        let snippet: String = record.text.chars().take(SNIPPET_CHARS).collect();
        let metadata: BTreeMap<_, _> = record.metadata.iter().collect();
        println!("\nDocument {} (ID: {}):", i + 1, record.id);
        println!("Text snippet: {snippet}...");
        println!("Metadata: {}", serde_json::to_string(&metadata)?);
    }
    Ok(())
}

pub async fn chat(config: &RagConfig, args: ChatArgs) -> Result<()> {
    let model_name = args.model.unwrap_or_else(|| config.chat_model.clone());
    let embedder = embedding_provider(config).await?;
    let retriever = Retriever::open(embedder, open_store(config).await?, config.collection.as_str())
        .await?
        .with_top_k(config.top_k);
    let model = Arc::new(OllamaChatModel::new(&config.ollama_url, model_name.as_str()));
    let generator = GroundedGenerator::new(model).with_timeout(config.generation_timeout());
    let session = Session::new(retriever, generator);

    println!("Chat initialized with {model_name}. Type 'quit' to exit.");
    println!("Ask a question about your documents:");

    if !std::io::stdin().is_terminal() {
        let stdin = std::io::stdin();
        session.run(stdin.lock(), std::io::stdout()).await?;
        return Ok(());
    }

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("\nYou: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        match SessionInput::parse(&line) {
            SessionInput::Exit => break,
            SessionInput::Skip => continue,
            SessionInput::Query(query) => {
                editor.add_history_entry(query.as_str())?;
                match session.answer(&query).await {
                    Ok(response) => println!("\nAssistant: {response}"),
                    Err(e) => println!("An error occurred: {e}"),
                }
                std::io::stdout().flush()?;
            }
        }
    }
    info!("chat ended");
    Ok(())
}
