//! Where a note lives in the remote repository.
//!
//! Resolution is a pure function applied in a fixed order: pick the file name (slug, then
//! title, then the note's own name), optionally slugify it, optionally add a language suffix,
//! then prefix the publish root. [`TargetRequest`] can only be built from a live note or from a
//! ledger key, so the resolver never sees its own output.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{PublishSettings, ROOT_SENTINEL};
use crate::contract::Document;
use crate::frontmatter::FrontMatter;

pub const DOCUMENT_EXTENSION: &str = "md";
const DOCUMENT_SUFFIX: &str = ".md";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Inputs of one path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRequest<'a> {
    file_name: String,
    slug: Option<String>,
    title: Option<String>,
    language: Option<String>,
    format_as_slug: bool,
    publish_root: &'a str,
}

impl<'a> TargetRequest<'a> {
    pub fn for_document(
        document: &Document,
        front: &FrontMatter,
        settings: &'a PublishSettings,
    ) -> Self {
        Self {
            file_name: document.name.clone(),
            slug: front.slug(),
            title: front.title(),
            language: front.language(&settings.language_key),
            format_as_slug: settings.slugify,
            publish_root: &settings.publish_root,
        }
    }

    /// A note known only by a ledger key: no front matter survives, so only its file name,
    /// the slug flag and the root apply.
    pub fn for_ledger_path(local_path: &str, settings: &'a PublishSettings) -> Self {
        Self {
            file_name: Document::from_path(local_path).name,
            slug: None,
            title: None,
            language: None,
            format_as_slug: settings.slugify,
            publish_root: &settings.publish_root,
        }
    }
}

/// Remote path for the request.
pub fn resolve_target_path(request: &TargetRequest<'_>) -> String {
    let mut file_name = match (&request.slug, &request.title) {
        (Some(slug), _) => format!("{slug}{DOCUMENT_SUFFIX}"),
        (None, Some(title)) => format!("{title}{DOCUMENT_SUFFIX}"),
        (None, None) => request.file_name.clone(),
    };
    if request.format_as_slug {
        file_name = slugify_filename(&file_name);
    }
    if let Some(tag) = &request.language {
        file_name = apply_language_suffix(&file_name, tag);
    }
    prefix_root(request.publish_root, &file_name)
}

/// Replace accented Latin letters with their closest ASCII spelling.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match ascii_equivalent(c) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

fn ascii_equivalent(c: char) -> Option<&'static str> {
    let replacement = match c {
        'ç' => "c",
        'Ç' => "C",
        'ğ' => "g",
        'Ğ' => "G",
        'ı' => "i",
        'İ' => "I",
        'ö' => "o",
        'Ö' => "O",
        'ş' => "s",
        'Ş' => "S",
        'ü' => "u",
        'Ü' => "U",
        'â' => "a",
        'Â' => "A",
        'î' => "i",
        'Î' => "I",
        'û' => "u",
        'Û' => "U",
        'é' => "e",
        'É' => "E",
        'è' => "e",
        'È' => "E",
        'à' => "a",
        'À' => "A",
        'ñ' => "n",
        'Ñ' => "N",
        'ß' => "ss",
        'å' => "a",
        'Å' => "A",
        'ä' => "a",
        'Ä' => "A",
        'æ' => "ae",
        'Æ' => "AE",
        _ => return None,
    };
    Some(replacement)
}

/// `"İdea Çöz.md"` -> `"idea-coz.md"`.
pub fn slugify_filename(file_name: &str) -> String {
    let stem = file_name.strip_suffix(DOCUMENT_SUFFIX).unwrap_or(file_name);
    let lowered = transliterate(stem).to_lowercase();
    let hyphenated = WHITESPACE.replace_all(&lowered, "-");
    let slug: String = hyphenated
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    format!("{slug}{DOCUMENT_SUFFIX}")
}

/// `"name.md"` + `"tr"` -> `"name.tr.md"`. Blank tags leave the name unchanged.
pub fn apply_language_suffix(file_name: &str, tag: &str) -> String {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        return file_name.to_string();
    }
    let stem = file_name.strip_suffix(DOCUMENT_SUFFIX).unwrap_or(file_name);
    format!("{stem}.{tag}{DOCUMENT_SUFFIX}")
}

fn prefix_root(publish_root: &str, file_name: &str) -> String {
    let root = publish_root.trim();
    if root.is_empty() || root == ROOT_SENTINEL {
        return file_name.to_string();
    }
    format!("{}/{file_name}", root.trim_end_matches('/'))
}
