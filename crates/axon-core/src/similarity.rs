//! Near-duplicate detection with strictly size-gated comparison tiers.
//!
//! The ceilings here are load-bearing: the Levenshtein matrix is O(n*m) in
//! time, so a hard length ceiling plus a sampled fallback keeps a single pair
//! of large documents from stalling the process, and the size-proximity gate
//! avoids paying a full-file hash on pairs whose sizes already prove they
//! cannot be equal.

use std::collections::HashSet;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SimilarityConfig;
use crate::error::Result;
use crate::model::{strip_md_suffix, ItemError, Report};
use crate::store::NoteStore;

/// Documents above this byte size are never read whole for string diffing.
pub const DIRECT_COMPARISON_CEILING: u64 = 50 * 1024;
/// Strings longer than this fall back to sampled-window comparison.
pub const LEVENSHTEIN_CEILING: usize = 1000;
/// Width of one sampled comparison window, in chars.
pub const SAMPLE_WINDOW: usize = 500;
/// Number of equally spaced sample windows.
pub const SAMPLE_COUNT: usize = 5;
/// Hash-tier pairs whose sizes differ by more than this fraction score 0.0.
pub const SIZE_PROXIMITY_GATE: f64 = 0.1;
/// Sampled-tier pairs with a length ratio below this score 0.0.
pub const LENGTH_RATIO_FLOOR: f64 = 0.5;
/// Blend weights for the sampled tier.
const LENGTH_RATIO_WEIGHT: f64 = 0.3;
const WINDOW_WEIGHT: f64 = 0.7;
/// Default pairwise grouping threshold.
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.8;

/// Reads per in-flight batch during vault-wide scans.
const SCAN_WINDOW: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    Title,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub similarity: f64,
    pub kind: MatchKind,
}

/// One group of near-duplicates, anchored by the first unscanned member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub notes: Vec<String>,
    pub similarity: f64,
    pub kind: MatchKind,
}

/// Levenshtein edit distance over chars, two-row dynamic programming.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - levenshtein(a, b)) as f64 / max_len as f64
}

/// String similarity in [0, 1]: exact Levenshtein up to the ceiling, sampled
/// windows beyond it.
pub fn string_similarity(a: &str, b: &str, config: &SimilarityConfig) -> f64 {
    if a == b {
        return 1.0;
    }
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a.max(len_b) > config.levenshtein_ceiling {
        sampled_similarity(a, b, len_a, len_b, config)
    } else {
        levenshtein_similarity(a, b)
    }
}

/// Sampled fallback: a length-ratio gate, then true Levenshtein inside
/// equally spaced fixed-width windows, blended with the length ratio.
fn sampled_similarity(
    a: &str,
    b: &str,
    len_a: usize,
    len_b: usize,
    config: &SimilarityConfig,
) -> f64 {
    let max_len = len_a.max(len_b);
    let min_len = len_a.min(len_b);
    if max_len == 0 {
        return 1.0;
    }

    let length_ratio = min_len as f64 / max_len as f64;
    if length_ratio < config.length_ratio_floor {
        return 0.0;
    }

    let chars_a: Vec<char> = a.chars().collect();
    let chars_b: Vec<char> = b.chars().collect();
    let samples = config.sample_count;
    let window = config.sample_window;

    let step = |len: usize| -> usize {
        if samples <= 1 {
            0
        } else {
            len.saturating_sub(window) / (samples - 1)
        }
    };
    let step_a = step(len_a);
    let step_b = step(len_b);

    let mut total = 0.0;
    for i in 0..samples {
        let window_a = sample_window(&chars_a, i * step_a, window);
        let window_b = sample_window(&chars_b, i * step_b, window);
        total += levenshtein_similarity(&window_a, &window_b);
    }
    let window_average = total / samples as f64;

    LENGTH_RATIO_WEIGHT * length_ratio + WINDOW_WEIGHT * window_average
}

fn sample_window(chars: &[char], start: usize, window: usize) -> String {
    let start = start.min(chars.len());
    let end = (start + window).min(chars.len());
    chars[start..end].iter().collect()
}

/// Case-insensitive similarity of filenames without extension.
pub fn title_similarity(path_a: &str, path_b: &str, config: &SimilarityConfig) -> f64 {
    let stem = |path: &str| -> String {
        let name = path.rsplit('/').next().unwrap_or(path);
        strip_md_suffix(name).to_lowercase()
    };
    string_similarity(&stem(path_a), &stem(path_b), config)
}

/// Per-document scan state: size, content for directly comparable files,
/// lazily memoized hash for oversized ones.
struct DocProfile {
    path: String,
    size: u64,
    content: Option<String>,
    hash: Option<String>,
}

pub struct SimilarityEngine<'a> {
    store: &'a NoteStore,
    config: SimilarityConfig,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(store: &'a NoteStore, config: SimilarityConfig) -> Self {
        Self { store, config }
    }

    fn profile(&self, path: &str) -> Result<DocProfile> {
        let size = self.store.stat(path)?.size;
        let content = if size <= self.config.direct_comparison_ceiling {
            Some(self.store.read(path)?)
        } else {
            None
        };
        Ok(DocProfile {
            path: path.to_string(),
            size,
            content,
            hash: None,
        })
    }

    fn ensure_hash(&self, profile: &mut DocProfile) -> Result<String> {
        if let Some(hash) = &profile.hash {
            return Ok(hash.clone());
        }
        let hash = self.store.content_hash(&profile.path)?;
        profile.hash = Some(hash.clone());
        Ok(hash)
    }

    /// Content similarity for a pair of profiles, tier chosen by size.
    fn content_similarity(&self, a: &mut DocProfile, b: &mut DocProfile) -> Result<f64> {
        match (&a.content, &b.content) {
            (Some(content_a), Some(content_b)) => {
                Ok(string_similarity(content_a, content_b, &self.config))
            }
            _ => {
                // hash tier: only worth a full-file hash when the sizes are
                // close enough that equality is possible
                let average = (a.size as f64 + b.size as f64) / 2.0;
                if average == 0.0 {
                    return Ok(1.0);
                }
                let proximity = (a.size as f64 - b.size as f64).abs() / average;
                if proximity >= self.config.size_proximity_gate {
                    return Ok(0.0);
                }
                let hash_a = self.ensure_hash(a)?;
                let hash_b = self.ensure_hash(b)?;
                Ok(if hash_a == hash_b { 1.0 } else { 0.0 })
            }
        }
    }

    fn best_match(&self, a: &mut DocProfile, b: &mut DocProfile) -> Result<DuplicateMatch> {
        let content = self.content_similarity(a, b)?;
        let title = title_similarity(&a.path, &b.path, &self.config);
        Ok(if title > content {
            DuplicateMatch {
                similarity: title,
                kind: MatchKind::Title,
            }
        } else {
            DuplicateMatch {
                similarity: content,
                kind: MatchKind::Content,
            }
        })
    }

    /// Compare two notes; the higher of title and content similarity wins.
    pub fn compare(&self, path_a: &str, path_b: &str) -> Result<DuplicateMatch> {
        let mut a = self.profile(path_a)?;
        let mut b = self.profile(path_b)?;
        self.best_match(&mut a, &mut b)
    }

    /// Vault-wide pairwise scan, partitioning notes into duplicate groups.
    ///
    /// Each unscanned note anchors at most one group; members are marked
    /// scanned and never reconsidered as anchors, so transitive-but-uneven
    /// chains may group asymmetrically. This is the accepted approximation,
    /// not a defect.
    pub fn find_duplicates(&self, threshold: Option<f64>) -> Result<Report<Vec<DuplicateGroup>>> {
        let threshold = threshold.unwrap_or(self.config.duplicate_threshold);
        let paths = self.store.list(None)?;
        let total = paths.len();
        let mut errors: Vec<ItemError> = Vec::new();

        // bounded-window prefetch: at most SCAN_WINDOW reads in flight
        let mut profiles: Vec<DocProfile> = Vec::with_capacity(total);
        for chunk in paths.chunks(SCAN_WINDOW) {
            let batch: Vec<(String, Result<DocProfile>)> = chunk
                .par_iter()
                .map(|path| (path.clone(), self.profile(path)))
                .collect();
            for (path, result) in batch {
                match result {
                    Ok(profile) => profiles.push(profile),
                    Err(err) => errors.push(ItemError::new(&path, "profile", err)),
                }
            }
        }

        let mut groups = Vec::new();
        let mut scanned: HashSet<usize> = HashSet::new();

        for anchor in 0..profiles.len() {
            if scanned.contains(&anchor) {
                continue;
            }
            let mut members = vec![anchor];
            let mut best: Option<DuplicateMatch> = None;

            for candidate in anchor + 1..profiles.len() {
                if scanned.contains(&candidate) {
                    continue;
                }
                let (left, right) = profiles.split_at_mut(candidate);
                let pair = self.best_match(&mut left[anchor], &mut right[0]);
                match pair {
                    Ok(found) if found.similarity >= threshold => {
                        members.push(candidate);
                        if best.map(|b| found.similarity > b.similarity).unwrap_or(true) {
                            best = Some(found);
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        errors.push(ItemError::new(&profiles[candidate].path, "compare", err));
                    }
                }
            }

            if members.len() > 1 {
                for member in &members {
                    scanned.insert(*member);
                }
                let found = best.unwrap_or(DuplicateMatch {
                    similarity: threshold,
                    kind: MatchKind::Content,
                });
                debug!(
                    "duplicate group of {} anchored at '{}'",
                    members.len(),
                    profiles[anchor].path
                );
                groups.push(DuplicateGroup {
                    notes: members
                        .into_iter()
                        .map(|idx| profiles[idx].path.clone())
                        .collect(),
                    similarity: found.similarity,
                    kind: found.kind,
                });
            }
        }

        Ok(Report::new(groups, errors, total))
    }
}
