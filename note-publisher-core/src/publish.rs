//! Reconciliation engine: publishes one note, or every eligible note, to the remote.
//!
//! For a single note the steps run strictly in this order:
//!   1. eligibility gate (extension, excluded folders, marker field)
//!   2. fingerprint of the note as stored in the vault
//!   3. rename detection against the ledger (history tracking only)
//!   4. target path resolution
//!   5. image upload and reference rewrite
//!   6. retirement of the renamed predecessor's remote copy
//!   7. version-token lookup and create-or-update at the target path
//!   8. ledger upsert, committed only after the remote write succeeded
//!
//! Recoverable failures (missing images, a predecessor that cannot be deleted) are logged and
//! the publish continues. A failed write leaves the ledger entry of the note untouched.
//!
//! Batches run the same steps one note at a time in enumeration order; a failing note is
//! counted and the batch moves on. A [`CancelFlag`] stops a batch between notes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::PublishSettings;
use crate::contract::{
    Document, DocumentStore, Lookup, RemoteError, RemoteStore, StoreError, WriteRequest,
};
use crate::fingerprint::fingerprint;
use crate::frontmatter::FrontMatter;
use crate::images::ImageUploader;
use crate::ledger::{Ledger, LedgerError, PublishRecord};
use crate::path_resolver::{resolve_target_path, TargetRequest, DOCUMENT_EXTENSION};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("note not found: {0}")]
    DocumentNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Why a note is, or is not, publishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotMarkdown,
    Excluded { folder: String },
    NotMarked { marker_key: String },
}

impl std::fmt::Display for Eligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eligibility::Eligible => write!(f, "eligible"),
            Eligibility::NotMarkdown => write!(f, "not a markdown note"),
            Eligibility::Excluded { folder } => write!(f, "inside excluded folder '{folder}'"),
            Eligibility::NotMarked { marker_key } => {
                write!(f, "missing '{marker_key}: true' in its front matter")
            }
        }
    }
}

/// What one successful publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub local_path: String,
    pub remote_path: String,
    /// True when nothing existed at `remote_path` before the write.
    pub created: bool,
    pub images_uploaded: usize,
    /// Remote path of a renamed predecessor that was deleted.
    pub retired: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(PublishReport),
    Skipped(Eligibility),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub eligible: usize,
    pub published: Vec<PublishReport>,
    pub failures: Vec<(String, String)>,
    pub skipped: usize,
    /// The batch stopped early because its [`CancelFlag`] was raised.
    pub cancelled: bool,
}

/// A note as shown by [`Publisher::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteStatus {
    pub local_path: String,
    pub name: String,
    pub target_path: String,
    pub last_published: Option<DateTime<Utc>>,
}

/// Cooperative cancellation for batches; cheap to clone and share with a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Publisher<R, D> {
    remote: R,
    store: D,
    settings: PublishSettings,
}

impl<R, D> Publisher<R, D>
where
    R: RemoteStore,
    D: DocumentStore,
{
    /// Fails with [`PublishError::Config`] when the remote coordinates are incomplete, before
    /// anything touches the network.
    pub fn new(remote: R, store: D, settings: PublishSettings) -> Result<Self, PublishError> {
        let coords = remote.coordinates();
        if coords.owner.trim().is_empty() {
            return Err(PublishError::Config("remote owner is not set".into()));
        }
        if coords.repo.trim().is_empty() {
            return Err(PublishError::Config("remote repository is not set".into()));
        }
        settings.trace_loaded();
        Ok(Self {
            remote,
            store,
            settings,
        })
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    pub fn eligibility(&self, document: &Document, front: &FrontMatter) -> Eligibility {
        if document.extension != DOCUMENT_EXTENSION {
            return Eligibility::NotMarkdown;
        }
        if let Some(folder) = self.settings.excluded_prefix(&document.path) {
            return Eligibility::Excluded {
                folder: folder.to_string(),
            };
        }
        if !front.is_marked(&self.settings.marker_key) {
            return Eligibility::NotMarked {
                marker_key: self.settings.marker_key.clone(),
            };
        }
        Eligibility::Eligible
    }

    /// Publish the note at vault path `path`.
    pub async fn publish_document(
        &self,
        path: &str,
        ledger: &mut Ledger,
    ) -> Result<PublishOutcome, PublishError> {
        let document = match self.store.lookup(path).await {
            Lookup::Found(document) => document,
            Lookup::NotFound => return Err(PublishError::DocumentNotFound(path.to_string())),
        };
        let content = self.store.read_text(&document).await?;
        let front = FrontMatter::parse(&content);

        let eligibility = self.eligibility(&document, &front);
        if eligibility != Eligibility::Eligible {
            info!(note = %document.path, reason = %eligibility, "Note is not publishable, skipping");
            return Ok(PublishOutcome::Skipped(eligibility));
        }

        let content_fingerprint = fingerprint(&content);
        debug!(note = %document.path, fingerprint = %content_fingerprint, "Fingerprinted note");

        let predecessor = if self.settings.track_history {
            self.find_predecessor(&document.path, &content_fingerprint, ledger)
                .await
        } else {
            None
        };

        let target = resolve_target_path(&TargetRequest::for_document(
            &document,
            &front,
            &self.settings,
        ));
        info!(note = %document.path, target = %target, "Resolved target path");

        let (body, images_uploaded) = if self.settings.process_images {
            let outcome = ImageUploader::new(&self.remote, &self.store, &self.settings)
                .upload_and_rewrite(&content, &document)
                .await;
            (outcome.content, outcome.uploaded)
        } else {
            (content, 0)
        };

        let retired = match &predecessor {
            Some(old_path) => self.retire(old_path, &document, &target, ledger).await,
            None => None,
        };

        let token = self.remote.get_existing(&target).await?;
        let created = token.is_none();
        let request = WriteRequest {
            path: target.clone(),
            content_base64: STANDARD.encode(body.as_bytes()),
            message: format!("Update {} via note-publisher", document.name),
            token,
        };
        if let Err(e) = self.remote.create_or_update(request).await {
            error!(note = %document.path, target = %target, error = %e, "Remote write failed");
            return Err(e.into());
        }

        ledger.upsert(
            document.path.clone(),
            PublishRecord::new(content_fingerprint, target.clone()),
        );
        ledger.commit()?;

        info!(note = %document.path, target = %target, created, images_uploaded, "Published note");
        Ok(PublishOutcome::Published(PublishReport {
            local_path: document.path,
            remote_path: target,
            created,
            images_uploaded,
            retired,
        }))
    }

    /// Publish every eligible note, one at a time.
    pub async fn publish_all(
        &self,
        ledger: &mut Ledger,
        cancel: &CancelFlag,
    ) -> Result<BatchReport, PublishError> {
        let eligible = self.eligible_documents().await?;
        let mut report = BatchReport {
            eligible: eligible.len(),
            ..BatchReport::default()
        };
        info!(count = eligible.len(), "Publishing all eligible notes");

        for document in eligible {
            if cancel.is_cancelled() {
                warn!(remaining_from = %document.path, "Batch cancelled");
                report.cancelled = true;
                break;
            }
            match self.publish_document(&document.path, ledger).await {
                Ok(PublishOutcome::Published(published)) => report.published.push(published),
                Ok(PublishOutcome::Skipped(reason)) => {
                    debug!(note = %document.path, reason = %reason, "Skipped during batch");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(note = %document.path, error = %e, "Failed to publish note");
                    report.failures.push((document.path.clone(), e.to_string()));
                }
            }
        }

        info!(
            published = report.published.len(),
            failed = report.failures.len(),
            skipped = report.skipped,
            cancelled = report.cancelled,
            "Batch finished"
        );
        Ok(report)
    }

    /// Eligible notes with their resolved targets and last publish time. `filter` matches
    /// case-insensitively against the path or the file name.
    pub async fn status(
        &self,
        ledger: &Ledger,
        filter: Option<&str>,
    ) -> Result<Vec<NoteStatus>, PublishError> {
        let needle = filter.map(str::to_lowercase);
        let mut notes = Vec::new();
        for document in self.store.list_documents().await? {
            if let Some(needle) = &needle {
                if !document.path.to_lowercase().contains(needle)
                    && !document.name.to_lowercase().contains(needle)
                {
                    continue;
                }
            }
            let content = match self.store.read_text(&document).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(note = %document.path, error = %e, "Unreadable note, leaving it out");
                    continue;
                }
            };
            let front = FrontMatter::parse(&content);
            if self.eligibility(&document, &front) != Eligibility::Eligible {
                continue;
            }
            let target_path =
                resolve_target_path(&TargetRequest::for_document(&document, &front, &self.settings));
            notes.push(NoteStatus {
                last_published: ledger.get(&document.path).map(|r| r.last_published),
                local_path: document.path,
                name: document.name,
                target_path,
            });
        }
        Ok(notes)
    }

    async fn eligible_documents(&self) -> Result<Vec<Document>, PublishError> {
        let mut eligible = Vec::new();
        for document in self.store.list_documents().await? {
            let content = match self.store.read_text(&document).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(note = %document.path, error = %e, "Unreadable note, leaving it out");
                    continue;
                }
            };
            if self.eligibility(&document, &FrontMatter::parse(&content)) == Eligibility::Eligible {
                eligible.push(document);
            }
        }
        Ok(eligible)
    }

    /// The ledger entry this note was renamed from: a different path, gone from the vault, with
    /// the same fingerprint. More than one such entry is ambiguous and yields no predecessor.
    async fn find_predecessor(
        &self,
        current_path: &str,
        content_fingerprint: &str,
        ledger: &Ledger,
    ) -> Option<String> {
        let candidates: Vec<String> = ledger
            .entries()
            .filter(|(path, record)| {
                *path != current_path && record.fingerprint.as_deref() == Some(content_fingerprint)
            })
            .map(|(path, _)| path.to_string())
            .collect();

        let mut vanished = Vec::new();
        for candidate in candidates {
            if self.store.lookup(&candidate).await == Lookup::NotFound {
                vanished.push(candidate);
            }
        }

        match vanished.len() {
            0 => None,
            1 => {
                let predecessor = vanished.pop();
                info!(note = current_path, predecessor = ?predecessor, "Detected rename");
                predecessor
            }
            n => {
                warn!(
                    note = current_path,
                    candidates = n,
                    "Several vanished notes share this fingerprint, not treating any as renamed"
                );
                None
            }
        }
    }

    /// Delete the remote copy of a renamed note and drop its ledger entry. Returns the deleted
    /// remote path. Failures are logged; the entry then stays for a later attempt.
    async fn retire(
        &self,
        old_local_path: &str,
        document: &Document,
        target: &str,
        ledger: &mut Ledger,
    ) -> Option<String> {
        let old_remote = ledger
            .get(old_local_path)
            .and_then(|record| record.remote_path.clone())
            .unwrap_or_else(|| {
                resolve_target_path(&TargetRequest::for_ledger_path(
                    old_local_path,
                    &self.settings,
                ))
            });

        if old_remote == target {
            debug!(old = old_local_path, target, "Predecessor shares the target path, updating in place");
            self.forget(old_local_path, ledger);
            return None;
        }

        let token = match self.remote.get_existing(&old_remote).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!(old = %old_remote, "Predecessor no longer exists remotely");
                self.forget(old_local_path, ledger);
                return None;
            }
            Err(e) => {
                warn!(old = %old_remote, error = %e, "Could not look up predecessor, keeping it");
                return None;
            }
        };

        let message = format!("Delete {old_remote} (renamed to {})", document.name);
        match self.remote.delete(&old_remote, &token, &message).await {
            Ok(()) => {
                info!(old = %old_remote, note = %document.path, "Retired renamed predecessor");
                self.forget(old_local_path, ledger);
                Some(old_remote)
            }
            Err(e) => {
                warn!(old = %old_remote, error = %e, "Could not delete predecessor, continuing");
                None
            }
        }
    }

    fn forget(&self, old_local_path: &str, ledger: &mut Ledger) {
        ledger.remove(old_local_path);
        if let Err(e) = ledger.commit() {
            warn!(old = old_local_path, error = %e, "Failed to persist ledger after retirement");
        }
    }
}
