#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use note_publisher_core::contract::{
    RemoteCoordinates, RemoteError, RemoteStore, VersionToken, WriteRequest,
};
use tempfile::TempDir;

/// Remote call as seen by [`FakeRemote`], e.g. `"put notes/Idea.md"`.
pub type Call = String;

/// In-memory remote repository that enforces version tokens the way the hosted API does.
#[derive(Default)]
pub struct FakeRemote {
    files: Mutex<HashMap<String, (String, VersionToken)>>,
    calls: Mutex<Vec<Call>>,
    next_sha: Mutex<u64>,
    fail_writes_to: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, path: &str, content: &str) -> VersionToken {
        let token = self.mint();
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (content.to_string(), token.clone()));
        token
    }

    pub fn fail_writes_to(&self, path: &str) {
        self.fail_writes_to.lock().unwrap().push(path.to_string());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn token(&self, path: &str) -> Option<VersionToken> {
        self.files.lock().unwrap().get(path).map(|(_, t)| t.clone())
    }

    /// Decoded content at `path`.
    pub fn content(&self, path: &str) -> Option<String> {
        use base64::Engine;
        let files = self.files.lock().unwrap();
        let (encoded, _) = files.get(path)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .ok()?;
        String::from_utf8(bytes).ok()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn mint(&self) -> VersionToken {
        let mut next = self.next_sha.lock().unwrap();
        *next += 1;
        VersionToken(format!("sha-{next}"))
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    fn coordinates(&self) -> RemoteCoordinates {
        RemoteCoordinates {
            owner: "alice".into(),
            repo: "garden".into(),
            branch: None,
        }
    }

    async fn check_access(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn get_existing(&self, path: &str) -> Result<Option<VersionToken>, RemoteError> {
        self.record(format!("get {path}"));
        Ok(self.token(path))
    }

    async fn create_or_update(&self, request: WriteRequest) -> Result<VersionToken, RemoteError> {
        self.record(format!("put {}", request.path));
        if self.fail_writes_to.lock().unwrap().contains(&request.path) {
            return Err(RemoteError::Http {
                status: 500,
                message: "server error".into(),
            });
        }
        let current = self.token(&request.path);
        if current != request.token {
            return Err(RemoteError::Conflict(format!(
                "{} does not match",
                request.path
            )));
        }
        let token = self.mint();
        self.files
            .lock()
            .unwrap()
            .insert(request.path, (request.content_base64, token.clone()));
        Ok(token)
    }

    async fn delete(
        &self,
        path: &str,
        token: &VersionToken,
        _message: &str,
    ) -> Result<(), RemoteError> {
        self.record(format!("delete {path}"));
        let mut files = self.files.lock().unwrap();
        match files.get(path) {
            None => Err(RemoteError::NotFound),
            Some((_, current)) if current != token => {
                Err(RemoteError::Conflict(format!("{path} does not match")))
            }
            Some(_) => {
                files.remove(path);
                Ok(())
            }
        }
    }
}

/// A temporary vault; `files` are (vault path, content) pairs.
pub fn vault_with(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, content) in files {
        write_note(dir.path(), path, content);
    }
    dir
}

pub fn write_note(root: &Path, path: &str, content: &str) {
    let absolute = root.join(path);
    if let Some(parent) = absolute.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(absolute, content).unwrap();
}

pub const SHARED_IDEA: &str = "---\nshare: true\n---\nIdea body\n";
