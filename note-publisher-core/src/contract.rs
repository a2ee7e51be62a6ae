//! # contract: the two seams of the publisher
//!
//! The reconciliation engine talks to the outside world through exactly two traits:
//!
//! - [`DocumentStore`]: the local vault that owns the notes and their images.
//! - [`RemoteStore`]: the hosted repository that receives published content, addressed by
//!   path and guarded by version tokens.
//!
//! Both are async, `Send + Sync`, and annotated for `mockall` so tests can script exact call
//! sequences. Concrete implementations live in [`crate::vault`] and in the binary crate's
//! GitHub client.

use async_trait::async_trait;
use mockall::automock;

/// A note or attachment in the vault, identified by its vault-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Vault-relative, `/`-separated path, e.g. `Notes/Idea.md`.
    pub path: String,
    /// File name with extension, e.g. `Idea.md`.
    pub name: String,
    /// File name without extension, e.g. `Idea`.
    pub basename: String,
    /// Extension without the dot, empty when there is none.
    pub extension: String,
}

impl Document {
    pub fn from_path(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let (basename, extension) = match name.rfind('.') {
            Some(dot) if dot > 0 => (name[..dot].to_string(), name[dot + 1..].to_string()),
            _ => (name.clone(), String::new()),
        };
        Self {
            path: path.to_string(),
            name,
            basename,
            extension,
        }
    }

    /// Folder part of the path, empty for notes at the vault root.
    pub fn folder(&self) -> &str {
        match self.path.rfind('/') {
            Some(slash) => &self.path[..slash],
            None => "",
        }
    }
}

/// Result of asking the store for a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Document),
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to enumerate vault: {0}")]
    Walk(String),
}

/// The local collection of notes.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resolve a vault-relative path to a live file.
    async fn lookup(&self, path: &str) -> Lookup;

    async fn read_text(&self, document: &Document) -> Result<String, StoreError>;

    async fn read_binary(&self, document: &Document) -> Result<Vec<u8>, StoreError>;

    /// All notes with the document extension, in a stable enumeration order.
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;
}

/// Opaque token the remote requires to update or delete existing content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken(pub String);

/// Repository coordinates every remote call is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCoordinates {
    pub owner: String,
    pub repo: String,
    /// Branch to write to; `None` means the repository default.
    pub branch: Option<String>,
}

impl RemoteCoordinates {
    /// Branch assumed when building raw-content URLs.
    pub fn branch_or_main(&self) -> &str {
        self.branch.as_deref().unwrap_or("main")
    }
}

/// A create-or-update of one remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub path: String,
    pub content_base64: String,
    pub message: String,
    /// Present when updating; must be the token read right before this write.
    pub token: Option<VersionToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("not found")]
    NotFound,
    /// The version token was stale or missing for existing content.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// The hosted repository that receives published notes and images.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn coordinates(&self) -> RemoteCoordinates;

    /// Verify the credentials can see the repository.
    async fn check_access(&self) -> Result<(), RemoteError>;

    /// Current version token at `path`; `Ok(None)` when nothing exists there.
    async fn get_existing(&self, path: &str) -> Result<Option<VersionToken>, RemoteError>;

    /// Create or update `request.path`, returning the new version token.
    async fn create_or_update(&self, request: WriteRequest) -> Result<VersionToken, RemoteError>;

    async fn delete(
        &self,
        path: &str,
        token: &VersionToken,
        message: &str,
    ) -> Result<(), RemoteError>;
}
