use std::ops::Range;

use serde::{Deserialize, Deserializer, Serialize};

/// Normalize a logical note path.
///
/// Note paths are forward-slash strings relative to the vault root and always
/// carry a `.md` suffix: a bare name `"foo"` and `"foo.md"` denote the same
/// document.
pub fn normalize_note_path(path: &str) -> String {
    let mut p = path.trim().replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    while let Some(rest) = p.strip_prefix('/') {
        p = rest.to_string();
    }
    if !p.ends_with(".md") {
        p.push_str(".md");
    }
    p
}

/// Strip the `.md` suffix, yielding the bare target form used in links.
pub fn strip_md_suffix(path: &str) -> &str {
    path.strip_suffix(".md").unwrap_or(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    Wiki,     // [[target]] or [[target|display]]
    Markdown, // [display](target)
    External, // [display](http://...)
}

/// A single hyperlink reference extracted from a note body.
///
/// `target` is the raw text as written; resolution against the source
/// document happens in the graph layer. `span` is the byte range of the whole
/// link in the body it was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub kind: LinkKind,
    pub target: String,
    pub display: Option<String>,
    pub span: Range<usize>,
}

/// Frontmatter metadata: a small set of well-known optional fields plus an
/// open extension mapping for everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "string_or_list"
    )]
    pub tags: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "string_or_list"
    )]
    pub aliases: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_empty() && self.aliases.is_empty() && self.extra.is_empty()
    }
}

/// Accept both `tags: foo` and `tags: [foo, bar]`.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(coerce_string_list(&value))
}

fn coerce_string_list(value: &serde_yaml::Value) -> Vec<String> {
    match value {
        serde_yaml::Value::String(s) => vec![s.clone()],
        serde_yaml::Value::Number(n) => vec![n.to_string()],
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| match v {
                serde_yaml::Value::String(s) => Some(s.clone()),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// A fully parsed note.
///
/// `frontmatter`, `body` and `tags` are derived from `raw` on access; only
/// the raw text is ever cached.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub path: String,
    pub raw: String,
    pub frontmatter: Frontmatter,
    pub body: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// A non-fatal per-item failure inside a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub path: Option<String>,
    pub operation: Option<String>,
    pub message: String,
}

impl ItemError {
    pub fn new(path: &str, operation: &str, message: impl ToString) -> Self {
        Self {
            path: Some(path.to_string()),
            operation: Some(operation.to_string()),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub total_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
}

/// Uniform partial-failure envelope: `data` carries every successfully
/// produced result, `errors` every per-item failure. A batch never silently
/// drops an item and never aborts wholesale for one bad document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report<T> {
    pub data: T,
    pub errors: Vec<ItemError>,
    pub metadata: ReportMetadata,
}

impl<T> Report<T> {
    /// A report over `total` processed items, of which `errors.len()` failed.
    pub fn new(data: T, errors: Vec<ItemError>, total_processed: usize) -> Self {
        let error_count = errors.len();
        Self {
            data,
            errors,
            metadata: ReportMetadata {
                total_processed,
                success_count: total_processed.saturating_sub(error_count),
                error_count,
            },
        }
    }

    pub fn ok(data: T) -> Self {
        Self::new(data, Vec::new(), 0)
    }
}
