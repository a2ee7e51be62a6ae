//! Local images referenced by a note: find them, upload them next to the published notes,
//! and point the note at the uploaded copies.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::config::{ImageLayout, PublishSettings};
use crate::contract::{
    Document, DocumentStore, Lookup, RemoteCoordinates, RemoteStore, WriteRequest,
};
use crate::publish::PublishError;

static IMAGE_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").expect("valid regex"));

/// Original reference -> URL of the uploaded copy, for one publish.
pub type ImagePathMap = HashMap<String, String>;

/// Local image references in markup order, each once. Remote references are skipped.
pub fn extract_image_references(content: &str) -> Vec<String> {
    let mut references: Vec<String> = Vec::new();
    for caps in IMAGE_MARKUP.captures_iter(content) {
        let reference = &caps[1];
        if reference.is_empty() || reference.starts_with("http") {
            continue;
        }
        if !references.iter().any(|known| known == reference) {
            references.push(reference.to_string());
        }
    }
    references
}

/// Swap mapped references inside image markup; everything else is left as is.
pub fn rewrite_image_references(content: &str, map: &ImagePathMap) -> String {
    if map.is_empty() {
        return content.to_string();
    }
    IMAGE_MARKUP
        .replace_all(content, |caps: &Captures| {
            let markup = &caps[0];
            let offset = caps.get(0).map_or(0, |m| m.start());
            let mapped = caps
                .get(1)
                .and_then(|reference| map.get(reference.as_str()).map(|url| (reference, url)));
            match mapped {
                Some((reference, url)) => {
                    let start = reference.start() - offset;
                    let end = reference.end() - offset;
                    format!("{}{url}{}", &markup[..start], &markup[end..])
                }
                None => markup.to_string(),
            }
        })
        .into_owned()
}

/// Where an image lands in the remote repository.
pub fn image_remote_path(images_root: &str, image: &Document, layout: ImageLayout) -> String {
    let relative = match layout {
        ImageLayout::Nested => image.path.as_str(),
        ImageLayout::Flat => image.name.as_str(),
    };
    let root = images_root.trim_matches('/');
    if root.is_empty() {
        relative.to_string()
    } else {
        format!("{root}/{relative}")
    }
}

/// Raw-content URL for a remote path.
pub fn raw_content_url(raw_base: &str, coords: &RemoteCoordinates, remote_path: &str) -> String {
    let encoded: Vec<String> = remote_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!(
        "{}/{}/{}/{}/{}",
        raw_base.trim_end_matches('/'),
        coords.owner,
        coords.repo,
        coords.branch_or_main(),
        encoded.join("/")
    )
}

/// Candidate vault paths for a reference: as written from the vault root, then relative to the
/// note's folder. Percent-encoded references are also tried decoded.
fn candidate_paths(reference: &str, document: &Document) -> Vec<String> {
    let mut spellings = vec![reference.to_string()];
    if let Ok(decoded) = urlencoding::decode(reference) {
        if decoded != reference {
            spellings.push(decoded.into_owned());
        }
    }
    let mut candidates = Vec::new();
    for spelling in &spellings {
        let from_root = spelling.trim_start_matches('/');
        candidates.push(normalize(Path::new(from_root)));
        if !document.folder().is_empty() && !spelling.starts_with('/') {
            candidates.push(normalize(&Path::new(document.folder()).join(spelling)));
        }
    }
    candidates.retain(|candidate| !candidate.is_empty() && !candidate.starts_with(".."));
    candidates.dedup();
    candidates
}

fn normalize(path: &Path) -> String {
    use std::path::Component;

    let mut normalized: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !normalized.is_empty() && normalized.last() != Some(&"..") {
                    normalized.pop();
                } else {
                    normalized.push("..");
                }
            }
            Component::Normal(part) => {
                if let Some(part) = part.to_str() {
                    normalized.push(part);
                }
            }
            _ => {}
        }
    }
    normalized.join("/")
}

/// Result of processing a note's images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    pub content: String,
    pub uploaded: usize,
}

pub struct ImageUploader<'a, R, D> {
    remote: &'a R,
    store: &'a D,
    settings: &'a PublishSettings,
}

impl<'a, R, D> ImageUploader<'a, R, D>
where
    R: RemoteStore,
    D: DocumentStore,
{
    pub fn new(remote: &'a R, store: &'a D, settings: &'a PublishSettings) -> Self {
        Self {
            remote,
            store,
            settings,
        }
    }

    /// Upload every resolvable local image of `document` and rewrite its references.
    /// Missing images and failed uploads are logged and leave the reference untouched.
    pub async fn upload_and_rewrite(&self, content: &str, document: &Document) -> ImageOutcome {
        let references = extract_image_references(content);
        if references.is_empty() {
            return ImageOutcome {
                content: content.to_string(),
                uploaded: 0,
            };
        }

        let mut map = ImagePathMap::new();
        for reference in &references {
            match self.upload_one(reference, document).await {
                Ok(Some(url)) => {
                    map.insert(reference.clone(), url);
                }
                Ok(None) => {
                    warn!(note = %document.path, reference, "Image not found in vault, skipping");
                }
                Err(e) => {
                    warn!(note = %document.path, reference, error = %e, "Image upload failed, skipping");
                }
            }
        }

        let uploaded = map.len();
        info!(note = %document.path, found = references.len(), uploaded, "Processed note images");
        ImageOutcome {
            content: rewrite_image_references(content, &map),
            uploaded,
        }
    }

    async fn upload_one(
        &self,
        reference: &str,
        document: &Document,
    ) -> Result<Option<String>, PublishError> {
        let Some(image) = self.locate(reference, document).await else {
            return Ok(None);
        };
        let bytes = self.store.read_binary(&image).await?;
        let remote_path =
            image_remote_path(&self.settings.images_root, &image, self.settings.image_layout);

        let token = self.remote.get_existing(&remote_path).await?;
        debug!(image = %image.path, remote_path, update = token.is_some(), "Uploading image");
        self.remote
            .create_or_update(WriteRequest {
                path: remote_path.clone(),
                content_base64: STANDARD.encode(&bytes),
                message: format!("Upload image {}", image.name),
                token,
            })
            .await?;

        Ok(Some(raw_content_url(
            &self.settings.raw_base_url,
            &self.remote.coordinates(),
            &remote_path,
        )))
    }

    async fn locate(&self, reference: &str, document: &Document) -> Option<Document> {
        for candidate in candidate_paths(reference, document) {
            if let Lookup::Found(image) = self.store.lookup(&candidate).await {
                return Some(image);
            }
        }
        None
    }
}
