use log::{debug, warn};

use super::{GraphSnapshot, NodeInfo};
use crate::cache::BoundedCache;
use crate::error::Result;
use crate::model::{normalize_note_path, strip_md_suffix, ItemError, LinkKind};
use crate::parser;
use crate::store::NoteStore;

/// Resolve a raw link target against its source document.
///
/// Heuristic, not a vault-wide name index: a leading `/` is vault-root
/// absolute; any other target (with or without `/`) is relative to the
/// source document's directory. External targets and targets escaping the
/// root resolve to `None`. The result is deterministic given
/// `(target, source)`.
pub fn resolve_link_target(target: &str, source: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() || target.starts_with("http://") || target.starts_with("https://") {
        return None;
    }

    let stripped = strip_md_suffix(target);
    let (base, relative): (&str, &str) = match stripped.strip_prefix('/') {
        Some(absolute) => ("", absolute),
        None => {
            let source_dir = match source.rfind('/') {
                Some(idx) => &source[..idx],
                None => "",
            };
            (source_dir, stripped)
        }
    };

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return None;
                }
            }
            normal => segments.push(normal),
        }
    }
    if segments.is_empty() {
        return None;
    }

    Some(normalize_note_path(&segments.join("/")))
}

/// Full two-pass build over every listed document.
///
/// Pass 1 reads each document (through the content cache), parses it, and
/// records its resolved forward-link set and node metadata. Pass 2 inverts
/// the forward sets into the backlink map. A read failure on one document is
/// recorded and that document contributes no links; construction never
/// aborts for a single bad file.
pub(super) fn build_graph(
    store: &NoteStore,
    content_cache: &mut BoundedCache<String>,
) -> Result<GraphSnapshot> {
    let paths = store.list(None)?;
    let mut snapshot = GraphSnapshot::default();

    for path in paths {
        let raw = match read_through(store, content_cache, &path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("graph build: skipping '{}': {}", path, err);
                snapshot.errors.push(ItemError::new(&path, "read", &err));
                snapshot.forward.insert(path.clone(), Vec::new());
                snapshot.nodes.insert(
                    path.clone(),
                    NodeInfo {
                        title: parser::note_title(&Default::default(), &path),
                        tags: Vec::new(),
                    },
                );
                snapshot.order.push(path);
                continue;
            }
        };

        let document = parser::parse_frontmatter(&raw);
        let tags = parser::extract_tags(&document.body, &document.frontmatter);
        let title = parser::note_title(&document.frontmatter, &path);

        let mut targets: Vec<String> = Vec::new();
        for link in parser::extract_all_links(&document.body) {
            if link.kind == LinkKind::External {
                continue;
            }
            let Some(resolved) = resolve_link_target(&link.target, &path) else {
                debug!("broken link '{}' in '{}'", link.target, path);
                continue;
            };
            if resolved == path {
                continue; // self-loops discarded
            }
            if !targets.contains(&resolved) {
                targets.push(resolved);
            }
        }

        snapshot.forward.insert(path.clone(), targets);
        snapshot.nodes.insert(path.clone(), NodeInfo { title, tags });
        snapshot.order.push(path);
    }

    // pass 2: invert forward sets into the backlink map, in listing order
    for path in &snapshot.order {
        if let Some(targets) = snapshot.forward.get(path) {
            for target in targets {
                snapshot
                    .backward
                    .entry(target.clone())
                    .or_default()
                    .push(path.clone());
            }
        }
    }

    Ok(snapshot)
}

fn read_through(
    store: &NoteStore,
    cache: &mut BoundedCache<String>,
    path: &str,
) -> Result<String> {
    if let Some(cached) = cache.get(path) {
        return Ok(cached.clone());
    }
    let raw = store.read(path)?;
    cache.set(path, raw.clone(), raw.len());
    Ok(raw)
}
