//! Knowledge-base source: a flat directory of `*.txt` documents.

use fieldrag_core::memory::Document;
use fieldrag_core::MemoryError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix of documents ingested at runtime.
pub const RUNTIME_DOC_PREFIX: &str = "runtime_doc_";

/// A directory of plain-text documents.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    dir: PathBuf,
}

impl KnowledgeBase {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it does not exist.
    pub fn ensure_dir(&self) -> Result<(), MemoryError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            MemoryError::Storage(format!(
                "cannot create knowledge-base directory {}: {e}",
                self.dir.display()
            ))
        })
    }

    /// Paths of every `*.txt` file, sorted by file name. Not recursive.
    pub fn document_paths(&self) -> Result<Vec<PathBuf>, MemoryError> {
        self.ensure_dir()?;

        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            MemoryError::Storage(format!("cannot list {}: {e}", self.dir.display()))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }

    /// Load every document. Files that are not valid UTF-8 are skipped.
    pub fn load_documents(&self) -> Result<Vec<Document>, MemoryError> {
        let mut documents = Vec::new();

        for path in self.document_paths()? {
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = std::fs::read(&path)
                .map_err(|e| MemoryError::Storage(format!("cannot read {}: {e}", path.display())))?;

            match String::from_utf8(bytes) {
                Ok(content) => documents.push(Document::new(content).with_source(source)),
                Err(_) => warn!(file = %path.display(), "Skipping document that is not valid UTF-8"),
            }
        }

        debug!(dir = %self.dir.display(), count = documents.len(), "Knowledge base loaded");
        Ok(documents)
    }

    /// Write `content` to a new `runtime_doc_<unix_secs>[_n].txt` file.
    pub fn write_document(&self, content: &str) -> Result<PathBuf, MemoryError> {
        self.ensure_dir()?;

        let stamp = chrono::Utc::now().timestamp();
        let path = (0u32..)
            .map(|n| {
                let name = if n == 0 {
                    format!("{RUNTIME_DOC_PREFIX}{stamp}.txt")
                } else {
                    format!("{RUNTIME_DOC_PREFIX}{stamp}_{n}.txt")
                };
                self.dir.join(name)
            })
            .find(|p| !p.exists())
            .ok_or_else(|| MemoryError::Storage("no free document name".into()))?;

        std::fs::write(&path, content)
            .map_err(|e| MemoryError::Storage(format!("cannot write {}: {e}", path.display())))?;
        debug!(file = %path.display(), bytes = content.len(), "Document written");
        Ok(path)
    }
}
