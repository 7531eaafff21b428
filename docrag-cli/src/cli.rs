//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use docrag::{ChunkStrategy, Encoding, IdStrategy, RagConfig};

use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "docrag", version, about = "Chunk, index and chat with your documents")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand. Flags override the config file.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of the local vector store.
    #[arg(long, global = true, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Collection name.
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Ollama server URL.
    #[arg(long, global = true, value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Embedding model; must match the one the index was built with.
    #[arg(long, global = true, value_name = "MODEL")]
    pub embedding_model: Option<String>,

    /// Number of chunks retrieved per question.
    #[arg(long, global = true)]
    pub top_k: Option<usize>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split a file into chunks and print them.
    Chunks(ChunksArgs),
    /// Tokenize text and print each token.
    Tokens(TokensArgs),
    /// Load, chunk, embed and store every document in a directory.
    Index(IndexArgs),
    /// Print the records stored in a collection.
    Inspect,
    /// Ask questions about the indexed documents.
    Chat(ChatArgs),
}

/// Chunking method names as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    Recursive,
    Character,
    Token,
}

impl From<Method> for ChunkStrategy {
    fn from(method: Method) -> Self {
        match method {
            Method::Recursive => ChunkStrategy::Recursive,
            Method::Character => ChunkStrategy::FixedWidth,
            Method::Token => ChunkStrategy::Token,
        }
    }
}

/// Byte-pair encodings as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncodingName {
    #[value(name = "cl100k_base")]
    Cl100kBase,
    #[value(name = "p50k_base")]
    P50kBase,
    #[value(name = "r50k_base")]
    R50kBase,
}

impl From<EncodingName> for Encoding {
    fn from(name: EncodingName) -> Self {
        match name {
            EncodingName::Cl100kBase => Encoding::Cl100kBase,
            EncodingName::P50kBase => Encoding::P50kBase,
            EncodingName::R50kBase => Encoding::R50kBase,
        }
    }
}

#[derive(Debug, Args)]
pub struct ChunksArgs {
    /// File to chunk.
    pub file: PathBuf,

    /// Chunking method.
    #[arg(long, value_enum)]
    pub method: Option<Method>,

    /// Maximum chunk size (characters, or tokens for `token`).
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Overlap between consecutive chunks.
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Encoding used to count tokens for `--method token`.
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingName>,
}

#[derive(Debug, Args)]
pub struct TokensArgs {
    /// Text to tokenize; multiple words are joined with spaces.
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Byte-pair encoding to tokenize with.
    #[arg(long, value_enum, default_value = "cl100k_base")]
    pub encoding: EncodingName,

    /// `tokenizer.json` to use instead of a byte-pair encoding.
    #[arg(long, value_name = "FILE", conflicts_with = "encoding")]
    pub tokenizer: Option<PathBuf>,
}

/// Id policy names as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IdMode {
    ContentHash,
    Sequence,
}

impl From<IdMode> for IdStrategy {
    fn from(mode: IdMode) -> Self {
        match mode {
            IdMode::ContentHash => IdStrategy::ContentHash,
            IdMode::Sequence => IdStrategy::Sequence,
        }
    }
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Directory to index recursively.
    #[arg(long, default_value = "documents", value_name = "DIR")]
    pub dir: PathBuf,

    /// How record ids are assigned.
    #[arg(long, value_enum)]
    pub ids: Option<IdMode>,

    /// Read files with unknown extensions as plain text instead of skipping them.
    #[arg(long)]
    pub plain_text_fallback: bool,

    /// Embed through the OpenAI API (`OPENAI_API_KEY`) instead of Ollama.
    #[cfg(feature = "openai")]
    #[arg(long)]
    pub openai: bool,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Chat model served by Ollama.
    pub model: Option<String>,
}

impl GlobalArgs {
    /// Load the config file (or defaults) and apply flag overrides.
    pub fn resolve_config(&self) -> anyhow::Result<RagConfig> {
        let mut config = match &self.config {
            Some(path) => RagConfig::from_toml_file(path)?,
            None => RagConfig::default(),
        };
        if let Some(store) = &self.store {
            config.store_path = store.clone();
        }
        if let Some(collection) = &self.collection {
            config.collection = collection.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.ollama_url = url.clone();
        }
        if let Some(model) = &self.embedding_model {
            config.embedding_model = model.clone();
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        config.validate()?;
        Ok(config)
    }
}
