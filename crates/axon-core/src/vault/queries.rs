use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use super::Vault;
use crate::error::Result;
use crate::graph::{ConnectedNote, GraphSnapshot, GraphStatistics, NoteConnections};
use crate::model::{normalize_note_path, ItemError, Note, Report};
use crate::parser;
use crate::similarity::{DuplicateGroup, DuplicateMatch, SimilarityEngine};
use crate::store::LARGE_FILE_THRESHOLD;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: String,
    /// 1-based line number
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub regex: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultStatistics {
    pub total_notes: usize,
    pub total_links: usize,
    pub distinct_tags: usize,
    pub orphaned_notes: usize,
    pub average_connections: f64,
}

enum Matcher {
    Pattern(regex::Regex),
    Substring { needle: String, case_sensitive: bool },
}

impl Matcher {
    fn new(query: &str, options: &SearchOptions) -> Result<Self> {
        if options.regex {
            let pattern = RegexBuilder::new(query)
                .case_insensitive(!options.case_sensitive)
                .build()?;
            Ok(Matcher::Pattern(pattern))
        } else {
            Ok(Matcher::Substring {
                needle: if options.case_sensitive {
                    query.to_string()
                } else {
                    query.to_lowercase()
                },
                case_sensitive: options.case_sensitive,
            })
        }
    }

    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Pattern(pattern) => pattern.is_match(line),
            Matcher::Substring {
                needle,
                case_sensitive,
            } => {
                if *case_sensitive {
                    line.contains(needle.as_str())
                } else {
                    line.to_lowercase().contains(needle.as_str())
                }
            }
        }
    }
}

impl Vault {
    /// Read one note, parsing frontmatter, body and tags from the (possibly
    /// cached) raw content.
    pub fn read_note(&mut self, path: &str) -> Result<Note> {
        let normalized = normalize_note_path(path);
        let raw = self.read_raw(&normalized)?;
        let document = parser::parse_frontmatter(&raw);
        let tags = parser::extract_tags(&document.body, &document.frontmatter);
        Ok(Note {
            path: normalized,
            raw,
            frontmatter: document.frontmatter,
            body: document.body,
            tags,
        })
    }

    pub fn backlinks(&mut self, path: &str) -> Result<Report<Vec<String>>> {
        let key = format!("graph:backlinks:{}", normalize_note_path(path));
        self.graph_query(&key, |snapshot| snapshot.backlinks(path))
    }

    pub fn forward_links(&mut self, path: &str) -> Result<Report<Vec<String>>> {
        let key = format!("graph:forward:{}", normalize_note_path(path));
        self.graph_query(&key, |snapshot| snapshot.forward_links(path))
    }

    pub fn orphaned_notes(&mut self) -> Result<Report<Vec<String>>> {
        self.graph_query("graph:orphans", |snapshot| snapshot.orphaned_notes())
    }

    pub fn note_connections(
        &mut self,
        path: &str,
        depth: usize,
    ) -> Result<Report<BTreeMap<String, NoteConnections>>> {
        let key = format!("graph:connections:{}:{}", normalize_note_path(path), depth);
        self.graph_query(&key, |snapshot| snapshot.connections(path, depth))
    }

    pub fn most_connected(&mut self, limit: usize) -> Result<Report<Vec<ConnectedNote>>> {
        let key = format!("graph:most-connected:{}", limit);
        self.graph_query(&key, |snapshot| snapshot.most_connected(limit))
    }

    pub fn shortest_path(&mut self, source: &str, target: &str) -> Result<Report<Vec<String>>> {
        let key = format!(
            "graph:path:{}:{}",
            normalize_note_path(source),
            normalize_note_path(target)
        );
        self.graph_query(&key, |snapshot| snapshot.shortest_path(source, target))
    }

    pub fn graph_statistics(&mut self) -> Result<Report<GraphStatistics>> {
        self.graph_query("graph:statistics", |snapshot| snapshot.statistics())
    }

    pub fn vault_statistics(&mut self) -> Result<Report<VaultStatistics>> {
        self.graph_query("vault:statistics", |snapshot| {
            let tags: BTreeSet<&str> = snapshot
                .nodes
                .values()
                .flat_map(|node| node.tags.iter().map(String::as_str))
                .collect();
            let statistics = snapshot.statistics();
            VaultStatistics {
                total_notes: statistics.total_notes,
                total_links: statistics.total_links,
                distinct_tags: tags.len(),
                orphaned_notes: statistics.orphaned_notes.len(),
                average_connections: statistics.average_connections,
            }
        })
    }

    /// Substring or regex line scan over every note. Files above the
    /// large-file threshold are streamed line by line instead of buffered
    /// whole (and bypass the content cache).
    pub fn search_notes(
        &mut self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Report<Vec<SearchMatch>>> {
        let matcher = Matcher::new(query, options)?;
        let paths = self.store.list(None)?;
        let total = paths.len();
        let mut matches = Vec::new();
        let mut errors = Vec::new();

        for path in paths {
            let result = self.scan_note(&path, &matcher, &mut matches);
            if let Err(err) = result {
                errors.push(ItemError::new(&path, "search", &err));
            }
        }

        Ok(Report::new(matches, errors, total))
    }

    fn scan_note(
        &mut self,
        path: &str,
        matcher: &Matcher,
        matches: &mut Vec<SearchMatch>,
    ) -> Result<()> {
        let size = self.store.stat(path)?.size;
        if size > LARGE_FILE_THRESHOLD {
            for (index, line) in self.store.read_lines(path)?.enumerate() {
                let line = line.map_err(|err| crate::error::AxonError::Io {
                    path: path.into(),
                    source: err,
                })?;
                if matcher.matches(&line) {
                    matches.push(SearchMatch {
                        path: path.to_string(),
                        line: index + 1,
                        text: line,
                    });
                }
            }
            return Ok(());
        }

        let raw = self.read_raw(path)?;
        for (index, line) in raw.lines().enumerate() {
            if matcher.matches(line) {
                matches.push(SearchMatch {
                    path: path.to_string(),
                    line: index + 1,
                    text: line.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Compare two notes by title and content similarity.
    pub fn compare_notes(&self, path_a: &str, path_b: &str) -> Result<DuplicateMatch> {
        let engine = SimilarityEngine::new(&self.store, self.config.similarity);
        engine.compare(
            &normalize_note_path(path_a),
            &normalize_note_path(path_b),
        )
    }

    /// Vault-wide near-duplicate scan.
    pub fn find_duplicates(&self, threshold: Option<f64>) -> Result<Report<Vec<DuplicateGroup>>> {
        let engine = SimilarityEngine::new(&self.store, self.config.similarity);
        engine.find_duplicates(threshold)
    }

    /// Run a graph query through the query-result cache. Cache failures are
    /// never fatal; they degrade to "not cached".
    fn graph_query<T, F>(&mut self, key: &str, query: F) -> Result<Report<T>>
    where
        T: Serialize + serde::de::DeserializeOwned,
        F: FnOnce(&GraphSnapshot) -> T,
    {
        if let Some(json) = self.query_cache.get(key).cloned() {
            match serde_json::from_str::<Report<T>>(&json) {
                Ok(report) => return Ok(report),
                Err(err) => {
                    warn!("query cache: dropping undecodable entry '{}': {}", key, err);
                    self.query_cache.delete(key);
                }
            }
        }

        let snapshot = self.graph.snapshot(&self.store, &mut self.content_cache)?;
        let report = Report::new(
            query(snapshot),
            snapshot.errors().to_vec(),
            snapshot.note_count(),
        );

        match serde_json::to_string(&report) {
            Ok(json) => {
                let size = json.len();
                self.query_cache.set(key, json, size);
            }
            Err(err) => warn!("query cache: serialization failed for '{}': {}", key, err),
        }
        Ok(report)
    }
}
