//! Document loaders: turn files on disk into [`Document`]s.
//!
//! A [`LoaderRegistry`] maps lowercase file extensions to [`DocumentLoader`]
//! implementations and walks directories to find loadable files. Files whose
//! extension has no registered loader are handled according to the
//! registry's [`UnknownExtensionPolicy`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::{Document, FILE_TYPE_KEY, PAGES_KEY};
use crate::error::{RagError, Result};

/// Files larger than this are rejected by the built-in loaders (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Reads one file into a [`Document`].
///
/// Implementations must set `source` to the file path and add the
/// [`FILE_TYPE_KEY`] metadata entry.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the file at `path`.
    async fn load(&self, path: &Path) -> Result<Document>;

    /// Lowercase extensions this loader handles, without the leading dot.
    fn extensions(&self) -> &[&str];
}

/// Lowercase extension of `path`, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).unwrap_or_default()
}

fn load_error(path: &Path, message: impl Into<String>) -> RagError {
    RagError::Load { path: path.to_path_buf(), message: message.into() }
}

async fn check_size(path: &Path, max_file_size: u64) -> Result<()> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| load_error(path, e.to_string()))?;
    if meta.len() > max_file_size {
        return Err(load_error(
            path,
            format!("file is {} bytes, limit is {max_file_size}", meta.len()),
        ));
    }
    Ok(())
}

fn document_for(path: &Path, text: String) -> Document {
    Document::new(path.display().to_string(), text).with_metadata(FILE_TYPE_KEY, extension_of(path))
}

/// One document for all pages, separated by blank lines, with the page count.
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn paged_document(path: &Path, pages: &[String]) -> Document {
    let text = pages.iter().map(|page| page.trim_end()).collect::<Vec<_>>().join("\n\n");
    document_for(path, text).with_metadata(PAGES_KEY, pages.len().to_string())
}

/// Loads UTF-8 text files.
#[derive(Debug, Clone)]
pub struct TextLoader {
    /// Maximum accepted file size in bytes.
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self { max_file_size: DEFAULT_MAX_FILE_SIZE }
    }
}

#[async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, path: &Path) -> Result<Document> {
        check_size(path, self.max_file_size).await?;
        let text =
            tokio::fs::read_to_string(path).await.map_err(|e| load_error(path, e.to_string()))?;
        debug!(path = %path.display(), bytes = text.len(), "loaded text file");
        Ok(document_for(path, text))
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "md", "markdown", "rst", "text"]
    }
}

/// Extracts text from PDF files with `pdf-extract`.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone)]
pub struct PdfLoader {
    /// Maximum accepted file size in bytes.
    pub max_file_size: u64,
}

#[cfg(feature = "pdf")]
impl Default for PdfLoader {
    fn default() -> Self {
        Self { max_file_size: DEFAULT_MAX_FILE_SIZE }
    }
}

#[cfg(feature = "pdf")]
#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, path: &Path) -> Result<Document> {
        check_size(path, self.max_file_size).await?;
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf_extract::extract_text_by_pages(&owned))
            .await
            .map_err(|e| load_error(path, format!("extraction task failed: {e}")))?
            .map_err(|e| load_error(path, e.to_string()))?;
        debug!(path = %path.display(), page_count = pages.len(), "extracted pdf text");
        Ok(paged_document(path, &pages))
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

/// What to do with a file whose extension has no registered loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownExtensionPolicy {
    /// Loading fails with [`RagError::UnsupportedFormat`]; discovery skips the file.
    #[default]
    Fail,
    /// The file is read as UTF-8 plain text.
    PlainText,
}

/// Dispatches files to loaders by extension.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::LoaderRegistry;
///
/// let registry = LoaderRegistry::with_defaults();
/// let documents = registry.load_dir("documents").await?;
/// ```
pub struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn DocumentLoader>>,
    policy: UnknownExtensionPolicy,
    fallback: TextLoader,
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<&String> = self.loaders.keys().collect();
        extensions.sort();
        f.debug_struct("LoaderRegistry")
            .field("extensions", &extensions)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LoaderRegistry {
    /// A registry with no loaders.
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
            policy: UnknownExtensionPolicy::default(),
            fallback: TextLoader::default(),
        }
    }

    /// A registry with the text loader and, with the `pdf` feature, the PDF loader.
    pub fn with_defaults() -> Self {
        let registry = Self::empty().register(Arc::new(TextLoader::default()));
        #[cfg(feature = "pdf")]
        let registry = registry.register(Arc::new(PdfLoader::default()));
        registry
    }

    /// Register a loader for all of its extensions, replacing earlier ones.
    pub fn register(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        for ext in loader.extensions() {
            self.loaders.insert(ext.to_ascii_lowercase(), Arc::clone(&loader));
        }
        self
    }

    /// Set the policy for unknown extensions.
    pub fn with_policy(mut self, policy: UnknownExtensionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The unknown-extension policy in effect.
    pub fn policy(&self) -> UnknownExtensionPolicy {
        self.policy
    }

    /// Whether a file would be accepted by [`load`](Self::load).
    pub fn supports(&self, path: &Path) -> bool {
        self.policy == UnknownExtensionPolicy::PlainText
            || self.loaders.contains_key(&extension_of(path))
    }

    /// Load a single file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFormat`] for an unknown extension under
    /// [`UnknownExtensionPolicy::Fail`] and [`RagError::Load`] when reading fails.
    pub async fn load(&self, path: &Path) -> Result<Document> {
        let extension = extension_of(path);
        match (self.loaders.get(&extension), self.policy) {
            (Some(loader), _) => loader.load(path).await,
            (None, UnknownExtensionPolicy::PlainText) => self.fallback.load(path).await,
            (None, UnknownExtensionPolicy::Fail) => {
                Err(RagError::UnsupportedFormat { path: path.to_path_buf(), extension })
            }
        }
    }

    /// Recursively list loadable files under `dir`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] if `dir` is missing or cannot be walked.
    pub fn discover(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(load_error(dir, "directory does not exist"));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| load_error(dir, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if self.supports(&path) {
                files.push(path);
            } else {
                debug!(path = %path.display(), "skipping file without a loader");
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load every file found by [`discover`](Self::discover).
    pub async fn load_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<Document>> {
        let dir = dir.as_ref();
        let files = self.discover(dir)?;
        if files.is_empty() {
            warn!(dir = %dir.display(), "no loadable documents found");
        }

        let mut documents = Vec::with_capacity(files.len());
        for path in &files {
            documents.push(self.load(path).await?);
        }
        info!(dir = %dir.display(), document_count = documents.len(), "loaded documents");
        Ok(documents)
    }
}
