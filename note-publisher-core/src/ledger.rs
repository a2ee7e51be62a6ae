//! # ledger: what has been published, and as what
//!
//! One [`PublishRecord`] per local note path, kept in insertion order. A record exists only
//! after a confirmed remote write; it is removed when a renamed predecessor's remote copy is
//! retired.
//!
//! The ledger persists as JSON. Older state stored each entry as a single string, either a
//! bare ISO timestamp or `"<timestamp>:hash:<fingerprint>"`; such values are still accepted on
//! load and are written back in the structured form.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const LEGACY_HASH_SEPARATOR: &str = ":hash:";
const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub last_published: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Remote path written by the last publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
}

impl PublishRecord {
    pub fn new(fingerprint: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            last_published: Utc::now(),
            fingerprint: Some(fingerprint.into()),
            remote_path: Some(remote_path.into()),
        }
    }

    /// Decode the single-string encoding used by older state files.
    pub fn from_legacy(value: &str) -> Self {
        let (timestamp, fingerprint) = match value.split_once(LEGACY_HASH_SEPARATOR) {
            Some((timestamp, hash)) if !hash.is_empty() => (timestamp, Some(hash.to_string())),
            Some((timestamp, _)) => (timestamp, None),
            None => (value, None),
        };
        let last_published = match DateTime::parse_from_rfc3339(timestamp) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => {
                warn!(value, error = %e, "Unreadable legacy publish timestamp, using the epoch");
                DateTime::<Utc>::UNIX_EPOCH
            }
        };
        Self {
            last_published,
            fingerprint,
            remote_path: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to access ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse ledger {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Structured(PublishRecord),
    Legacy(String),
}

#[derive(Deserialize)]
struct StoredLedger {
    #[serde(default, alias = "publishedNotes")]
    published: IndexMap<String, StoredRecord>,
}

#[derive(Serialize)]
struct LedgerFile<'a> {
    version: u32,
    published: &'a IndexMap<String, PublishRecord>,
}

/// Map from local note path to its last publication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: IndexMap<String, PublishRecord>,
    backing: Option<PathBuf>,
}

impl Ledger {
    /// An in-memory ledger; [`Ledger::commit`] is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger persisted at `path`, or start empty when the file does not exist yet.
    /// Later commits write back to `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(raw) => parse_records(&path, &raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No ledger yet, starting empty");
                IndexMap::new()
            }
            Err(source) => return Err(LedgerError::Io { path, source }),
        };
        debug!(path = %path.display(), entries = records.len(), "Opened ledger");
        Ok(Self {
            records,
            backing: Some(path),
        })
    }

    pub fn get(&self, local_path: &str) -> Option<&PublishRecord> {
        self.records.get(local_path)
    }

    pub fn contains(&self, local_path: &str) -> bool {
        self.records.contains_key(local_path)
    }

    /// Insert or replace; an existing key keeps its position.
    pub fn upsert(&mut self, local_path: impl Into<String>, record: PublishRecord) {
        self.records.insert(local_path.into(), record);
    }

    pub fn remove(&mut self, local_path: &str) -> Option<PublishRecord> {
        self.records.shift_remove(local_path)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PublishRecord)> {
        self.records.iter().map(|(path, record)| (path.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget every record and persist the empty ledger. Returns how many records were dropped.
    pub fn clear(&mut self) -> Result<usize, LedgerError> {
        let dropped = self.records.len();
        self.records.clear();
        self.commit()?;
        info!(dropped, "Reset publish history");
        Ok(dropped)
    }

    /// Persist to the backing file, if any.
    pub fn commit(&self) -> Result<(), LedgerError> {
        match &self.backing {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }

    /// Write the ledger to `path` through a temporary file in the same folder.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let encoded = serde_json::to_vec_pretty(&LedgerFile {
            version: STATE_VERSION,
            published: &self.records,
        })?;
        let io_err = |source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&encoded).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        debug!(path = %path.display(), entries = self.records.len(), "Saved ledger");
        Ok(())
    }
}

fn parse_records(path: &Path, raw: &str) -> Result<IndexMap<String, PublishRecord>, LedgerError> {
    let stored: StoredLedger = serde_json::from_str(raw).map_err(|source| LedgerError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut migrated = 0usize;
    let records = stored
        .published
        .into_iter()
        .map(|(local_path, record)| {
            let record = match record {
                StoredRecord::Structured(record) => record,
                StoredRecord::Legacy(value) => {
                    migrated += 1;
                    PublishRecord::from_legacy(&value)
                }
            };
            (local_path, record)
        })
        .collect();
    if migrated > 0 {
        info!(path = %path.display(), migrated, "Migrated legacy ledger entries");
    }
    Ok(records)
}
