//! Pure text transforms over raw note content. No I/O.

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::error::Result;
use crate::model::{strip_md_suffix, Frontmatter, Heading, Link, LinkKind};

static FRONTMATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A---\r?\n(?s:(.*?)\r?\n)?---(?:\r?\n|\z)").unwrap());

/// Inline tag token: letters, digits, `_`, `-`, `/`, preceded by start of
/// text or whitespace.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)#([A-Za-z0-9_/-]+)").unwrap());

/// Raw content split into structured frontmatter and body.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Split a leading `---` YAML block, if present, from the body.
///
/// Content without the delimiter (or with YAML that fails to parse) yields a
/// default frontmatter and the input unchanged as body.
pub fn parse_frontmatter(raw: &str) -> Document {
    let Some(captures) = FRONTMATTER_RE.captures(raw) else {
        return Document {
            frontmatter: Frontmatter::default(),
            body: raw.to_string(),
        };
    };

    let yaml = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    let frontmatter = if yaml.trim().is_empty() {
        Frontmatter::default()
    } else {
        match serde_yaml::from_str::<Frontmatter>(yaml) {
            Ok(frontmatter) => frontmatter,
            Err(err) => {
                log::warn!("unparseable frontmatter treated as body: {}", err);
                return Document {
                    frontmatter: Frontmatter::default(),
                    body: raw.to_string(),
                };
            }
        }
    };

    let body_start = captures.get(0).map(|m| m.end()).unwrap_or(0);
    Document {
        frontmatter,
        body: raw[body_start..].to_string(),
    }
}

/// Inverse of [`parse_frontmatter`]. Empty frontmatter returns the body
/// unchanged; an empty `---\n---\n` block is never emitted, so a document
/// with no metadata round-trips losslessly.
pub fn stringify_with_frontmatter(frontmatter: &Frontmatter, body: &str) -> Result<String> {
    if frontmatter.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("---\n{}---\n{}", yaml, body))
}

/// Union of frontmatter `tags` (leading `#` stripped) and inline `#token`
/// matches in the body, deduplicated and sorted.
pub fn extract_tags(body: &str, frontmatter: &Frontmatter) -> Vec<String> {
    let mut tags = std::collections::BTreeSet::new();

    for tag in &frontmatter.tags {
        let tag = tag.trim_start_matches('#');
        if !tag.is_empty() {
            tags.insert(tag.to_string());
        }
    }
    for captures in TAG_RE.captures_iter(body) {
        tags.insert(captures[1].to_string());
    }

    tags.into_iter().collect()
}

struct PendingLink {
    wiki: bool,
    aliased: bool,
    target: String,
    text: String,
    start: usize,
}

/// Extract wiki and markdown links, ordered by ascending byte offset.
/// Markdown targets beginning with `http://`/`https://` are tagged
/// [`LinkKind::External`].
pub fn extract_all_links(body: &str) -> Vec<Link> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_WIKILINKS);

    let parser = Parser::new_ext(body, options);
    let mut links = Vec::new();
    let mut pending: Option<PendingLink> = None;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) => {
                let (wiki, aliased) = match link_type {
                    LinkType::WikiLink { has_pothole } => (true, has_pothole),
                    _ => (false, false),
                };
                pending = Some(PendingLink {
                    wiki,
                    aliased,
                    target: dest_url.to_string(),
                    text: String::new(),
                    start: range.start,
                });
            }
            Event::End(TagEnd::Link) => {
                if let Some(link) = pending.take() {
                    // pulldown-cmark can report a wikilink range ending
                    // before the trailing ']'
                    let mut end = range.end;
                    if link.wiki {
                        while end < body.len() && body.as_bytes()[end] == b']' {
                            end += 1;
                        }
                    }

                    let kind = if link.wiki {
                        LinkKind::Wiki
                    } else if link.target.starts_with("http://")
                        || link.target.starts_with("https://")
                    {
                        LinkKind::External
                    } else {
                        LinkKind::Markdown
                    };

                    let text = link.text.trim().to_string();
                    let display = if link.wiki {
                        if link.aliased && !text.is_empty() {
                            Some(text)
                        } else {
                            None
                        }
                    } else if text.is_empty() {
                        None
                    } else {
                        Some(text)
                    };

                    links.push(Link {
                        kind,
                        target: link.target.trim().to_string(),
                        display,
                        span: link.start..end,
                    });
                }
            }
            Event::Text(text) => {
                if let Some(link) = pending.as_mut() {
                    link.text.push_str(&text);
                }
            }
            Event::Code(code) => {
                if let Some(link) = pending.as_mut() {
                    link.text.push_str(&code);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(link) = pending.as_mut() {
                    link.text.push(' ');
                }
            }
            _ => {}
        }
    }

    links
}

pub fn extract_wiki_links(body: &str) -> Vec<Link> {
    extract_all_links(body)
        .into_iter()
        .filter(|link| link.kind == LinkKind::Wiki)
        .collect()
}

pub fn extract_markdown_links(body: &str) -> Vec<Link> {
    extract_all_links(body)
        .into_iter()
        .filter(|link| matches!(link.kind, LinkKind::Markdown | LinkKind::External))
        .collect()
}

fn targets_match(raw: &str, target: &str) -> bool {
    strip_md_suffix(raw) == strip_md_suffix(target)
}

pub(crate) fn rebuild_link(link: &Link, new_target: &str) -> String {
    match link.kind {
        LinkKind::Wiki => match &link.display {
            Some(display) => format!("[[{}|{}]]", strip_md_suffix(new_target), display),
            None => format!("[[{}]]", strip_md_suffix(new_target)),
        },
        LinkKind::Markdown | LinkKind::External => {
            // keep the `.md`-suffix style of the original raw target
            let target = if link.target.ends_with(".md") {
                format!("{}.md", strip_md_suffix(new_target))
            } else {
                strip_md_suffix(new_target).to_string()
            };
            format!("[{}]({})", link.display.as_deref().unwrap_or(""), target)
        }
    }
}

/// Rewrite every wiki and markdown link whose raw target denotes
/// `old_target` (with or without the `.md` suffix) to point at `new_target`,
/// preserving display text. Idempotent: a second application with the same
/// arguments finds nothing left to match.
pub fn update_links(body: &str, old_target: &str, new_target: &str) -> String {
    let mut updated = body.to_string();
    for link in extract_all_links(body).iter().rev() {
        if link.kind == LinkKind::External {
            continue;
        }
        if targets_match(&link.target, old_target) {
            updated.replace_range(link.span.clone(), &rebuild_link(link, new_target));
        }
    }
    updated
}

/// Replace every link to `target` with its display text (or nothing), used
/// when repairing broken links.
pub fn remove_link(body: &str, target: &str) -> String {
    let mut updated = body.to_string();
    for link in extract_all_links(body).iter().rev() {
        if link.kind == LinkKind::External {
            continue;
        }
        if targets_match(&link.target, target) {
            let replacement = link.display.clone().unwrap_or_default();
            updated.replace_range(link.span.clone(), &replacement);
        }
    }
    updated
}

/// Frontmatter `title` if present, else the filename without extension.
pub fn note_title(frontmatter: &Frontmatter, path: &str) -> String {
    if let Some(title) = &frontmatter.title {
        return title.clone();
    }
    let stem = path.rsplit('/').next().unwrap_or(path);
    strip_md_suffix(stem).to_string()
}

pub fn extract_headings(body: &str) -> Vec<Heading> {
    let parser = Parser::new_ext(body, Options::empty());
    let mut headings = Vec::new();
    let mut current: Option<(u8, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((level as u8, String::new()));
            }
            Event::End(TagEnd::Heading(..)) => {
                if let Some((level, text)) = current.take() {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        headings.push(Heading { level, text });
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buffer)) = current.as_mut() {
                    buffer.push_str(&text);
                }
            }
            _ => {}
        }
    }

    headings
}

/// First body paragraph (headings skipped), truncated to `max_len` chars on a
/// char boundary.
pub fn summarize(body: &str, max_len: usize) -> String {
    let mut paragraph = String::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }
        if !paragraph.is_empty() {
            paragraph.push(' ');
        }
        paragraph.push_str(trimmed);
    }

    if paragraph.chars().count() <= max_len {
        return paragraph;
    }
    let truncated: String = paragraph.chars().take(max_len).collect();
    format!("{}...", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frontmatter() {
        let doc = parse_frontmatter("---\ntitle: My Note\ntags: [a, b]\n---\n# Content");
        assert_eq!(doc.frontmatter.title.as_deref(), Some("My Note"));
        assert_eq!(doc.frontmatter.tags, vec!["a", "b"]);
        assert_eq!(doc.body, "# Content");
    }

    #[test]
    fn test_parse_without_frontmatter() {
        let doc = parse_frontmatter("Just a body");
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "Just a body");
    }

    #[test]
    fn test_parse_empty_frontmatter_block() {
        let doc = parse_frontmatter("---\n---\nBody");
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "Body");
    }

    #[test]
    fn test_empty_frontmatter_round_trip_is_lossless() {
        let raw = "No metadata here.\n\nJust text.";
        let doc = parse_frontmatter(raw);
        let out = stringify_with_frontmatter(&Frontmatter::default(), &doc.body).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_stringify_round_trip_with_data() {
        let mut frontmatter = Frontmatter::default();
        frontmatter.title = Some("X".to_string());
        frontmatter.tags = vec!["a".to_string()];

        let raw = stringify_with_frontmatter(&frontmatter, "Body\n").unwrap();
        let doc = parse_frontmatter(&raw);
        assert_eq!(doc.frontmatter, frontmatter);
        assert_eq!(doc.body, "Body\n");
    }

    #[test]
    fn test_extract_tags_union_sorted() {
        let doc = parse_frontmatter("---\ntitle: X\ntags: [a, b]\n---\nBody #c");
        let tags = extract_tags(&doc.body, &doc.frontmatter);
        assert_eq!(tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_extract_tags_strips_hash_and_dedupes() {
        let doc = parse_frontmatter("---\ntags: ['#x', y]\n---\n#x #z-1 #a/b");
        let tags = extract_tags(&doc.body, &doc.frontmatter);
        assert_eq!(tags, vec!["a/b", "x", "y", "z-1"]);
    }

    #[test]
    fn test_heading_marker_is_not_a_tag() {
        let tags = extract_tags("# Heading\n\nText #real", &Frontmatter::default());
        assert_eq!(tags, vec!["real"]);
    }

    #[test]
    fn test_extract_wiki_link() {
        let links = extract_wiki_links("See [[note2]] for details");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "note2");
        assert_eq!(links[0].display, None);
        assert_eq!(links[0].kind, LinkKind::Wiki);
    }

    #[test]
    fn test_extract_wiki_link_with_display() {
        let links = extract_wiki_links("[[note2|the second note]]");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "note2");
        assert_eq!(links[0].display.as_deref(), Some("the second note"));
    }

    #[test]
    fn test_extract_markdown_and_external() {
        let body = "[local](other.md) and [site](https://example.com)";
        let links = extract_markdown_links(body);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].kind, LinkKind::Markdown);
        assert_eq!(links[0].target, "other.md");
        assert_eq!(links[0].display.as_deref(), Some("local"));
        assert_eq!(links[1].kind, LinkKind::External);
        assert_eq!(links[1].target, "https://example.com");
    }

    #[test]
    fn test_links_ordered_by_offset() {
        let body = "[md](a.md) then [[b]] then [[c|see]]";
        let links = extract_all_links(body);
        assert_eq!(links.len(), 3);
        assert!(links[0].span.start < links[1].span.start);
        assert!(links[1].span.start < links[2].span.start);
        assert_eq!(&body[links[1].span.clone()], "[[b]]");
    }

    #[test]
    fn test_update_links_preserves_display() {
        let body = "See [[old|Display]] and [text](old.md) and [[other]]";
        let updated = update_links(body, "old", "new");
        assert_eq!(updated, "See [[new|Display]] and [text](new.md) and [[other]]");
    }

    #[test]
    fn test_update_links_matches_md_suffix_forms() {
        let body = "[[old]] and [t](old)";
        let updated = update_links(body, "old.md", "new.md");
        assert_eq!(updated, "[[new]] and [t](new)");
    }

    #[test]
    fn test_update_links_idempotent() {
        let body = "Link [[old]] here";
        let once = update_links(body, "old", "new");
        let twice = update_links(&once, "old", "new");
        assert_eq!(once, twice);
        assert_eq!(once, "Link [[new]] here");
    }

    #[test]
    fn test_remove_link() {
        let body = "Keep [[gone|shown text]] and [[gone]] and [[stays]]";
        let updated = remove_link(body, "gone");
        assert_eq!(updated, "Keep shown text and  and [[stays]]");
    }

    #[test]
    fn test_note_title() {
        let mut frontmatter = Frontmatter::default();
        assert_eq!(note_title(&frontmatter, "dir/some-note.md"), "some-note");

        frontmatter.title = Some("Custom".to_string());
        assert_eq!(note_title(&frontmatter, "dir/some-note.md"), "Custom");
    }

    #[test]
    fn test_extract_headings() {
        let headings = extract_headings("# Title\n\nText\n\n## Section");
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].level, 1);
        assert_eq!(headings[0].text, "Title");
        assert_eq!(headings[1].level, 2);
        assert_eq!(headings[1].text, "Section");
    }

    #[test]
    fn test_summarize() {
        let body = "# Heading\n\nFirst paragraph\ncontinues here.\n\nSecond paragraph.";
        assert_eq!(summarize(body, 100), "First paragraph continues here.");
        assert_eq!(summarize(body, 5), "First...");
    }
}
