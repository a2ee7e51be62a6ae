//! GitHub contents-API client: bridges the core [`RemoteStore`] contract to HTTPS calls.
//!
//! - Construct [`GitHubClient`] with [`GitHubClient::new_from_env`] (reads `GITHUB_TOKEN`, `.env`
//!   supported) or [`GitHubClient::new`] with an explicit token.
//! - Every call is addressed to `/repos/{owner}/{repo}/contents/{path}`; the configured branch
//!   is passed as `ref` on reads and `branch` on writes.
//! - Non-success statuses are mapped onto [`RemoteError`] carrying the API's own message.

use std::env;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use note_publisher_core::contract::{
    RemoteCoordinates, RemoteError, RemoteStore, VersionToken, WriteRequest,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
const USER_AGENT: &str = concat!("note-publisher/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
    coords: RemoteCoordinates,
}

#[derive(Serialize)]
struct PutBody<'a> {
    message: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    message: &'a str,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutResponse {
    content: ContentSha,
}

#[derive(Deserialize)]
struct ContentSha {
    sha: String,
}

impl GitHubClient {
    pub fn new(
        token: impl Into<String>,
        coords: RemoteCoordinates,
        api_url: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(anyhow!("Config error: {TOKEN_ENV} is empty"));
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            http,
            token,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            coords,
        })
    }

    pub fn new_from_env(coords: RemoteCoordinates, api_url: impl Into<String>) -> Result<Self> {
        dotenvy::dotenv().ok();
        match env::var(TOKEN_ENV) {
            Ok(token) => {
                tracing::info!(
                    token_set = !token.is_empty(),
                    owner = %coords.owner,
                    repo = %coords.repo,
                    "Initialized GitHubClient from environment"
                );
                Self::new(token, coords, api_url)
            }
            Err(e) => {
                tracing::error!(error = ?e, "{TOKEN_ENV} missing in environment");
                Err(anyhow!("Config error: {TOKEN_ENV} is not set"))
            }
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
    }

    fn branch(&self) -> Option<&str> {
        self.coords.branch.as_deref()
    }
}

/// `a b/c#d.md` -> `a%20b/c%23d.md`.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn contents_url(api_url: &str, coords: &RemoteCoordinates, path: &str) -> String {
    format!(
        "{}/repos/{}/{}/contents/{}",
        api_url.trim_end_matches('/'),
        urlencoding::encode(&coords.owner),
        urlencoding::encode(&coords.repo),
        encode_path(path.trim_start_matches('/'))
    )
}

pub fn repository_url(api_url: &str, coords: &RemoteCoordinates) -> String {
    format!(
        "{}/repos/{}/{}",
        api_url.trim_end_matches('/'),
        urlencoding::encode(&coords.owner),
        urlencoding::encode(&coords.repo)
    )
}

/// The API's `message` field, or the raw body when it is not JSON.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string()),
        Err(_) => body.trim().to_string(),
    }
}

pub fn map_status(status: u16, body: &str) -> RemoteError {
    let message = error_message(body);
    match status {
        404 => RemoteError::NotFound,
        409 | 422 => RemoteError::Conflict(message),
        401 | 403 => RemoteError::Unauthorized(message),
        _ => RemoteError::Http { status, message },
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

async fn failure(response: reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    map_status(status, &body)
}

#[async_trait]
impl RemoteStore for GitHubClient {
    fn coordinates(&self) -> RemoteCoordinates {
        self.coords.clone()
    }

    async fn check_access(&self) -> Result<(), RemoteError> {
        let url = repository_url(&self.api_url, &self.coords);
        tracing::info!(%url, "Checking repository access");
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(transport)?;
        if response.status().is_success() {
            Ok(())
        } else {
            let e = failure(response).await;
            tracing::error!(error = %e, "Repository is not reachable");
            Err(e)
        }
    }

    async fn get_existing(&self, path: &str) -> Result<Option<VersionToken>, RemoteError> {
        let url = contents_url(&self.api_url, &self.coords, path);
        let mut request = self.request(Method::GET, &url);
        if let Some(branch) = self.branch() {
            request = request.query(&[("ref", branch)]);
        }
        let response = request.send().await.map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(path, "Nothing at remote path");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        let json: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        match json.get("sha").and_then(Value::as_str) {
            Some(sha) => Ok(Some(VersionToken(sha.to_string()))),
            None => Err(RemoteError::Decode(format!("no sha for {path}"))),
        }
    }

    async fn create_or_update(&self, request: WriteRequest) -> Result<VersionToken, RemoteError> {
        let url = contents_url(&self.api_url, &self.coords, &request.path);
        tracing::info!(
            path = %request.path,
            update = request.token.is_some(),
            "Writing remote file"
        );
        let body = PutBody {
            message: &request.message,
            content: &request.content_base64,
            sha: request.token.as_ref().map(|t| t.0.as_str()),
            branch: self.branch(),
        };
        let response = self
            .request(Method::PUT, &url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            let e = failure(response).await;
            tracing::error!(path = %request.path, error = %e, "Remote write rejected");
            return Err(e);
        }
        let written: PutResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(VersionToken(written.content.sha))
    }

    async fn delete(
        &self,
        path: &str,
        token: &VersionToken,
        message: &str,
    ) -> Result<(), RemoteError> {
        let url = contents_url(&self.api_url, &self.coords, path);
        tracing::info!(path, "Deleting remote file");
        let body = DeleteBody {
            message,
            sha: &token.0,
            branch: self.branch(),
        };
        let response = self
            .request(Method::DELETE, &url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(failure(response).await)
        }
    }
}
