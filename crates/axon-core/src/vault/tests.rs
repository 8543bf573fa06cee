use std::fs;

use tempfile::TempDir;

use super::*;
use crate::config::VaultConfig;
use crate::error::AxonError;
use crate::similarity::MatchKind;
use crate::vault::queries::SearchOptions;

fn create_test_vault() -> (Vault, TempDir) {
    let temp = TempDir::new().unwrap();
    let vault = Vault::open(VaultConfig::new(temp.path())).unwrap();
    (vault, temp)
}

#[test]
fn test_create_read_note() {
    let (mut vault, _temp) = create_test_vault();
    let path = vault
        .create_note("ideas/first", "---\ntitle: First\ntags: [seed]\n---\nBody #extra")
        .unwrap();
    assert_eq!(path, "ideas/first.md");

    let note = vault.read_note("ideas/first").unwrap();
    assert_eq!(note.frontmatter.title.as_deref(), Some("First"));
    assert_eq!(note.tags, vec!["extra", "seed"]);
    assert_eq!(note.body, "Body #extra");
}

#[test]
fn test_create_refuses_existing() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("a", "one").unwrap();
    assert!(matches!(
        vault.create_note("a.md", "two"),
        Err(AxonError::AlreadyExists { .. })
    ));
}

#[test]
fn test_update_requires_existing() {
    let (mut vault, _temp) = create_test_vault();
    assert!(vault.update_note("missing", "x").unwrap_err().is_not_found());
}

#[test]
fn test_read_is_cache_backed() {
    let (mut vault, temp) = create_test_vault();
    vault.create_note("cached", "original").unwrap();
    assert_eq!(vault.read_note("cached").unwrap().raw, "original");

    // an external edit the vault was never told about: there is no file
    // watching, so the cache still serves the old content
    fs::write(temp.path().join("cached.md"), "external edit").unwrap();
    assert_eq!(vault.read_note("cached").unwrap().raw, "original");

    // a mutation through the vault invalidates and refreshes
    vault.update_note("cached", "through the vault").unwrap();
    assert_eq!(vault.read_note("cached").unwrap().raw, "through the vault");
}

#[test]
fn test_delete_invalidates_cache() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("gone", "content").unwrap();
    vault.read_note("gone").unwrap();

    vault.delete_note("gone").unwrap();
    assert!(vault.read_note("gone").unwrap_err().is_not_found());
}

#[test]
fn test_graph_queries_through_vault() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("A", "Start [[B]]").unwrap();
    vault.create_note("B", "Middle [[C]] and back [[A]]").unwrap();
    vault.create_note("C", "End").unwrap();

    let backlinks = vault.backlinks("A").unwrap();
    assert_eq!(backlinks.data, vec!["B.md"]);
    assert_eq!(backlinks.metadata.total_processed, 3);
    assert!(backlinks.errors.is_empty());

    let path = vault.shortest_path("A", "C").unwrap();
    assert_eq!(path.data, vec!["A.md", "B.md", "C.md"]);

    assert!(vault.orphaned_notes().unwrap().data.is_empty());
}

#[test]
fn test_query_cache_serves_repeat_queries() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("a", "[[b]]").unwrap();
    vault.create_note("b", "").unwrap();

    let first = vault.backlinks("b").unwrap();
    let second = vault.backlinks("b").unwrap();
    assert_eq!(first.data, second.data);
    assert!(vault.query_cache_stats().item_count >= 1);
}

#[test]
fn test_rename_updates_links_and_invalidates() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("old", "The target").unwrap();
    vault.create_note("referrer", "Points at [[old]] twice: [[old|alias]]").unwrap();

    // warm both caches
    vault.read_note("referrer").unwrap();
    assert_eq!(vault.forward_links("referrer").unwrap().data, vec!["old.md"]);

    let report = vault.rename_note("old", "new", true).unwrap();
    assert_eq!(report.data.old_path, "old.md");
    assert_eq!(report.data.new_path, "new.md");
    assert_eq!(report.data.updated_notes, vec!["referrer.md"]);
    assert!(report.errors.is_empty());

    let referrer = vault.read_note("referrer").unwrap();
    assert!(referrer.raw.contains("[[new]]"));
    assert!(referrer.raw.contains("[[new|alias]]"));
    assert!(!referrer.raw.contains("[[old"));

    // graph cache was invalidated: the fresh build sees the new target
    assert_eq!(vault.forward_links("referrer").unwrap().data, vec!["new.md"]);
    assert_eq!(vault.backlinks("new").unwrap().data, vec!["referrer.md"]);
    assert!(vault.read_note("old").unwrap_err().is_not_found());
}

#[test]
fn test_rename_without_link_updates() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("old", "The target").unwrap();
    vault.create_note("referrer", "Points at [[old]]").unwrap();

    let report = vault.rename_note("old", "new", false).unwrap();
    assert!(report.data.updated_notes.is_empty());

    let referrer = vault.read_note("referrer").unwrap();
    assert!(referrer.raw.contains("[[old]]"), "links left untouched");
}

#[test]
fn test_rename_preserves_markdown_and_subdir_links() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("docs/target", "content").unwrap();
    vault
        .create_note("docs/sibling", "See [md link](target.md)")
        .unwrap();
    vault
        .create_note("index", "From root: [[docs/target]]")
        .unwrap();

    vault.rename_note("docs/target", "docs/renamed", true).unwrap();

    let sibling = vault.read_note("docs/sibling").unwrap();
    assert!(
        sibling.raw.contains("[md link](renamed.md)"),
        "sibling markdown link keeps its style: {}",
        sibling.raw
    );

    let index = vault.read_note("index").unwrap();
    assert!(
        index.raw.contains("[[/docs/renamed]]"),
        "cross-directory link becomes root-absolute: {}",
        index.raw
    );
    assert_eq!(
        vault.forward_links("index").unwrap().data,
        vec!["docs/renamed.md"]
    );
}

#[test]
fn test_search_substring_and_case() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("a", "Alpha line\nsecond LINE here").unwrap();
    vault.create_note("b", "nothing relevant").unwrap();

    let report = vault
        .search_notes("line", &SearchOptions::default())
        .unwrap();
    assert_eq!(report.data.len(), 2);
    assert_eq!(report.data[0].path, "a.md");
    assert_eq!(report.data[0].line, 1);
    assert_eq!(report.metadata.total_processed, 2);

    let sensitive = vault
        .search_notes(
            "LINE",
            &SearchOptions {
                case_sensitive: true,
                regex: false,
            },
        )
        .unwrap();
    assert_eq!(sensitive.data.len(), 1);
    assert_eq!(sensitive.data[0].line, 2);
}

#[test]
fn test_search_regex() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("a", "order-123\nno match").unwrap();

    let report = vault
        .search_notes(
            r"order-\d+",
            &SearchOptions {
                case_sensitive: false,
                regex: true,
            },
        )
        .unwrap();
    assert_eq!(report.data.len(), 1);
    assert_eq!(report.data[0].text, "order-123");

    let invalid = vault.search_notes(
        "(unclosed",
        &SearchOptions {
            case_sensitive: false,
            regex: true,
        },
    );
    assert!(invalid.is_err(), "a bad pattern fails the whole operation");
}

#[test]
fn test_find_duplicates_via_vault() {
    let (mut vault, _temp) = create_test_vault();
    let content = "repeated body\n".repeat(140); // ~2 KB
    vault.create_note("copy-one", &content).unwrap();
    vault.create_note("copy-two", &content).unwrap();
    vault.create_note("other", "unrelated text entirely").unwrap();

    let report = vault.find_duplicates(None).unwrap();
    assert_eq!(report.data.len(), 1);
    assert_eq!(report.data[0].notes, vec!["copy-one.md", "copy-two.md"]);
    assert_eq!(report.data[0].similarity, 1.0);
    assert_eq!(report.data[0].kind, MatchKind::Content);
}

#[test]
fn test_vault_statistics() {
    let (mut vault, _temp) = create_test_vault();
    vault.create_note("a", "#x #y [[b]]").unwrap();
    vault.create_note("b", "#x").unwrap();
    vault.create_note("island", "").unwrap();

    let report = vault.vault_statistics().unwrap();
    assert_eq!(report.data.total_notes, 3);
    assert_eq!(report.data.total_links, 1);
    assert_eq!(report.data.distinct_tags, 2);
    assert_eq!(report.data.orphaned_notes, 1);
}

#[test]
fn test_invalid_cache_config_rejected_at_open() {
    let temp = TempDir::new().unwrap();
    let mut config = VaultConfig::new(temp.path());
    config.content_cache.max_size = 0;
    assert!(matches!(Vault::open(config), Err(AxonError::Config(_))));
}
