//! Filesystem-backed [`DocumentStore`]: a vault is a directory of markdown notes and their
//! attachments.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::contract::{Document, DocumentStore, Lookup, StoreError};
use crate::path_resolver::DOCUMENT_EXTENSION;

pub struct VaultStore {
    root: PathBuf,
}

impl VaultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a vault-relative path. Paths escaping the vault resolve to `None`.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        canonical_path(relative).map(|canonical| self.root.join(canonical))
    }

    fn io_error(document: &Document, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: document.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl DocumentStore for VaultStore {
    async fn lookup(&self, path: &str) -> Lookup {
        let Some(canonical) = canonical_path(path) else {
            debug!(path, "Path escapes the vault");
            return Lookup::NotFound;
        };
        match tokio::fs::metadata(self.root.join(&canonical)).await {
            Ok(meta) if meta.is_file() => Lookup::Found(Document::from_path(&canonical)),
            Ok(_) => Lookup::NotFound,
            Err(e) => {
                debug!(path, error = %e, "No file at path");
                Lookup::NotFound
            }
        }
    }

    async fn read_text(&self, document: &Document) -> Result<String, StoreError> {
        let absolute = self
            .resolve(&document.path)
            .ok_or_else(|| Self::io_error(document, std::io::ErrorKind::NotFound.into()))?;
        tokio::fs::read_to_string(&absolute)
            .await
            .map_err(|e| Self::io_error(document, e))
    }

    async fn read_binary(&self, document: &Document) -> Result<Vec<u8>, StoreError> {
        let absolute = self
            .resolve(&document.path)
            .ok_or_else(|| Self::io_error(document, std::io::ErrorKind::NotFound.into()))?;
        tokio::fs::read(&absolute)
            .await
            .map_err(|e| Self::io_error(document, e))
    }

    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));
        for entry in walker {
            let entry = entry.map_err(|e| StoreError::Walk(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let Some(relative) = vault_relative(relative) else {
                warn!(path = %entry.path().display(), "Skipping non UTF-8 path");
                continue;
            };
            let document = Document::from_path(&relative);
            if document.extension == DOCUMENT_EXTENSION {
                documents.push(document);
            }
        }
        info!(root = %self.root.display(), count = documents.len(), "Enumerated vault notes");
        Ok(documents)
    }
}

/// `./Notes//Idea.md` -> `Notes/Idea.md`. `None` for paths that are empty, absolute or climb
/// out with `..`.
fn canonical_path(relative: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}

fn vault_relative(path: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = path
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect();
    parts.map(|parts| parts.join("/"))
}
