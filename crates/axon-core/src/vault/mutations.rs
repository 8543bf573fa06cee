use log::info;
use serde::{Deserialize, Serialize};

use super::Vault;
use crate::error::{AxonError, Result};
use crate::graph::resolve_link_target;
use crate::model::{normalize_note_path, strip_md_suffix, ItemError, LinkKind, Report};
use crate::parser;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameOutcome {
    pub old_path: String,
    pub new_path: String,
    /// Referring notes whose links were rewritten
    pub updated_notes: Vec<String>,
}

impl Vault {
    /// Create a new note. Refuses to overwrite an existing one.
    pub fn create_note(&mut self, path: &str, content: &str) -> Result<String> {
        let normalized = normalize_note_path(path);
        if self.store.exists(&normalized) {
            return Err(AxonError::AlreadyExists { path: normalized });
        }
        self.store.write(&normalized, content)?;
        self.invalidate(&normalized);
        Ok(normalized)
    }

    /// Replace an existing note's content wholesale.
    pub fn update_note(&mut self, path: &str, content: &str) -> Result<()> {
        let normalized = normalize_note_path(path);
        if !self.store.exists(&normalized) {
            return Err(AxonError::NotFound { path: normalized });
        }
        self.store.write(&normalized, content)?;
        self.invalidate(&normalized);
        Ok(())
    }

    pub fn delete_note(&mut self, path: &str) -> Result<()> {
        let normalized = normalize_note_path(path);
        self.store.delete(&normalized)?;
        self.invalidate(&normalized);
        Ok(())
    }

    /// Rename a note, optionally rewriting every referring document's links.
    ///
    /// Link rewriting is resolution-aware: each referring link is resolved
    /// against its own source document, and only links that resolve to the
    /// renamed path are spliced. A rewrite failure in one referring document
    /// is reported and does not abort the rest.
    pub fn rename_note(
        &mut self,
        old_path: &str,
        new_path: &str,
        update_links: bool,
    ) -> Result<Report<RenameOutcome>> {
        let old = normalize_note_path(old_path);
        let new = normalize_note_path(new_path);
        self.store.rename(&old, &new)?;
        self.content_cache.delete(&old);
        self.invalidate(&new);
        info!("renamed '{}' -> '{}'", old, new);

        let mut errors: Vec<ItemError> = Vec::new();
        let mut updated_notes: Vec<String> = Vec::new();
        let mut total = 0;

        if update_links {
            let sources = self.store.list(None)?;
            total = sources.len();
            for source in sources {
                if source == new {
                    continue;
                }
                match self.rewrite_links_in(&source, &old, &new) {
                    Ok(true) => updated_notes.push(source),
                    Ok(false) => {}
                    Err(err) => errors.push(ItemError::new(&source, "update-links", &err)),
                }
            }
        }

        Ok(Report::new(
            RenameOutcome {
                old_path: old,
                new_path: new,
                updated_notes,
            },
            errors,
            total,
        ))
    }

    /// Splice new targets into every link of `source` that resolves to
    /// `old`. Returns whether the document changed.
    fn rewrite_links_in(&mut self, source: &str, old: &str, new: &str) -> Result<bool> {
        let raw = self.read_raw(source)?;
        let document = parser::parse_frontmatter(&raw);
        let body_start = raw.len() - document.body.len();

        let mut rewritten = raw.clone();
        let mut changed = false;
        for link in parser::extract_all_links(&document.body).iter().rev() {
            if link.kind == LinkKind::External {
                continue;
            }
            if resolve_link_target(&link.target, source).as_deref() != Some(old) {
                continue;
            }
            let target = relink_target(&link.target, source, new);
            let span = link.span.start + body_start..link.span.end + body_start;
            rewritten.replace_range(span, &parser::rebuild_link(link, &target));
            changed = true;
        }

        if changed {
            self.store.write(source, &rewritten)?;
            self.content_cache.delete(source);
        }
        Ok(changed)
    }
}

/// Raw target pointing at `new_path`, keeping the style of the original raw
/// target where possible: sibling-style stays a bare stem when the renamed
/// note is still in the source's directory, everything else becomes
/// root-absolute.
fn relink_target(old_raw: &str, source: &str, new_path: &str) -> String {
    let directory = |path: &str| path.rfind('/').map(|idx| path[..idx].to_string());
    let source_dir = directory(source);
    let new_dir = directory(new_path);

    if !old_raw.starts_with('/') && !old_raw.contains('/') && source_dir == new_dir {
        let stem = new_path.rsplit('/').next().unwrap_or(new_path);
        return strip_md_suffix(stem).to_string();
    }
    format!("/{}", strip_md_suffix(new_path))
}
