//! Reads the YAML header block at the top of a note.

use serde_yaml::{Mapping, Value};
use tracing::warn;

const DELIMITER: &str = "---";

/// Parsed front matter of a note. Missing or malformed headers read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    fields: Mapping,
}

impl FrontMatter {
    pub fn parse(content: &str) -> Self {
        let Some(block) = header_block(content) else {
            return Self::default();
        };
        match serde_yaml::from_str::<Value>(block) {
            Ok(Value::Mapping(fields)) => Self { fields },
            Ok(Value::Null) => Self::default(),
            Ok(other) => {
                warn!(kind = ?other, "Front matter is not a mapping, ignoring it");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "Malformed front matter, ignoring it");
                Self::default()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// True only when `key` holds the YAML boolean `true`; `"true"` or `yes` strings do not count.
    pub fn is_marked(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    /// A non-blank string value, trimmed.
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    fn scalar(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => self.string(key).map(str::to_string),
        }
    }

    pub fn title(&self) -> Option<String> {
        self.scalar("title")
    }

    pub fn slug(&self) -> Option<String> {
        self.scalar("slug")
    }

    /// Language tag under `key`, trimmed and lowercased.
    pub fn language(&self, key: &str) -> Option<String> {
        self.string(key).map(str::to_lowercase)
    }
}

fn header_block(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }
    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some(&content[start..offset]);
        }
        offset += line.len();
    }
    None
}
