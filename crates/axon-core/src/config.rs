use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AxonError, Result};
use crate::similarity;

/// Top-level configuration for a vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Root directory of the note tree
    pub root: PathBuf,
    /// Limits for the raw-document-content cache
    #[serde(default = "CacheLimits::content_default")]
    pub content_cache: CacheLimits,
    /// Limits for the serialized-query-result cache
    #[serde(default = "CacheLimits::query_default")]
    pub query_cache: CacheLimits,
    #[serde(default)]
    pub similarity: SimilarityConfig,
}

impl VaultConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            content_cache: CacheLimits::content_default(),
            query_cache: CacheLimits::query_default(),
            similarity: SimilarityConfig::default(),
        }
    }

    /// Load config from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.content_cache.validate()?;
        self.query_cache.validate()?;
        self.similarity.validate()
    }
}

/// Size, count and expiry limits for one [`crate::cache::BoundedCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLimits {
    /// Maximum accounted byte size across all entries
    pub max_size: usize,
    /// Maximum number of entries
    pub max_items: usize,
    /// Entries untouched for longer than this are treated as absent
    pub ttl_secs: u64,
}

impl CacheLimits {
    pub fn new(max_size: usize, max_items: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            max_items,
            ttl_secs: ttl.as_secs(),
        }
    }

    pub(crate) fn content_default() -> Self {
        Self {
            max_size: 10 * 1024 * 1024,
            max_items: 500,
            ttl_secs: 300,
        }
    }

    pub(crate) fn query_default() -> Self {
        Self {
            max_size: 5 * 1024 * 1024,
            max_items: 200,
            ttl_secs: 60,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// A zero size or item limit is a programmer/config error, not runtime
    /// data, and is rejected at construction.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(AxonError::Config("cache max_size must be positive".into()));
        }
        if self.max_items == 0 {
            return Err(AxonError::Config("cache max_items must be positive".into()));
        }
        Ok(())
    }
}

/// Thresholds of the similarity engine. The defaults are load-bearing
/// performance decisions, not arbitrary; see `similarity` for the ceilings
/// they protect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Pairs scoring at or above this are grouped as duplicates
    pub duplicate_threshold: f64,
    /// Documents above this byte size are never read whole for diffing
    pub direct_comparison_ceiling: u64,
    /// Strings longer than this fall back to sampled-window comparison
    pub levenshtein_ceiling: usize,
    /// Width of one sampled comparison window, in chars
    pub sample_window: usize,
    /// Number of equally spaced windows
    pub sample_count: usize,
    /// Hash-tier pairs whose sizes differ by more than this fraction are 0.0
    pub size_proximity_gate: f64,
    /// Sampled-tier pairs with a length ratio below this are 0.0
    pub length_ratio_floor: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: similarity::DEFAULT_DUPLICATE_THRESHOLD,
            direct_comparison_ceiling: similarity::DIRECT_COMPARISON_CEILING,
            levenshtein_ceiling: similarity::LEVENSHTEIN_CEILING,
            sample_window: similarity::SAMPLE_WINDOW,
            sample_count: similarity::SAMPLE_COUNT,
            size_proximity_gate: similarity::SIZE_PROXIMITY_GATE,
            length_ratio_floor: similarity::LENGTH_RATIO_FLOOR,
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.duplicate_threshold) {
            return Err(AxonError::Config(
                "duplicate_threshold must be within 0.0..=1.0".into(),
            ));
        }
        if self.sample_count == 0 || self.sample_window == 0 {
            return Err(AxonError::Config(
                "sample_count and sample_window must be positive".into(),
            ));
        }
        if self.levenshtein_ceiling == 0 {
            return Err(AxonError::Config("levenshtein_ceiling must be positive".into()));
        }
        Ok(())
    }
}
