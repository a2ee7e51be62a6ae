use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Root marker meaning "publish at the repository root, no folder prefix".
pub const ROOT_SENTINEL: &str = "/";

/// How uploaded images are laid out under [`PublishSettings::images_root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageLayout {
    /// Keep the image's vault-relative folders, so equally named images never collide.
    #[default]
    Nested,
    /// Only the image's file name, directly under the images root.
    Flat,
}

/// Everything the publisher needs to decide what goes where.
///
/// Passed by value into [`crate::publish::Publisher::new`]; nothing reads settings from
/// ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Folder inside the remote repository that notes are published into.
    pub publish_root: String,
    /// Vault folders whose notes are never published.
    pub exclude: Vec<String>,
    /// Front-matter key that must be literally `true` for a note to be published.
    pub marker_key: String,
    /// Detect renamed notes through the ledger and retire their old remote copy.
    pub track_history: bool,
    /// Rewrite file names into lowercase ASCII slugs.
    pub slugify: bool,
    /// Front-matter key holding an optional language tag (`name.<tag>.md`).
    pub language_key: String,
    /// Remote folder receiving uploaded images.
    pub images_root: String,
    pub process_images: bool,
    pub image_layout: ImageLayout,
    /// Base of the URLs that rewritten image references point at.
    pub raw_base_url: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            publish_root: "notes".to_string(),
            exclude: Vec::new(),
            marker_key: "share".to_string(),
            track_history: true,
            slugify: false,
            language_key: "lang".to_string(),
            images_root: "assets/images".to_string(),
            process_images: true,
            image_layout: ImageLayout::default(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
        }
    }
}

impl PublishSettings {
    pub fn trace_loaded(&self) {
        info!(
            publish_root = %self.publish_root,
            marker_key = %self.marker_key,
            excluded = self.exclude.len(),
            track_history = self.track_history,
            slugify = self.slugify,
            process_images = self.process_images,
            "Loaded publish settings"
        );
        debug!(?self, "Publish settings (full debug)");
    }

    /// The excluded folder containing `path`, if any.
    pub fn excluded_prefix(&self, path: &str) -> Option<&str> {
        self.exclude
            .iter()
            .map(|folder| folder.trim_end_matches('/'))
            .filter(|folder| !folder.is_empty())
            .find(|folder| {
                path == *folder
                    || path
                        .strip_prefix(folder)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }
}
