//! Axon Core Library
//!
//! Link-graph and bounded-cache engine over a directory of interlinked
//! Markdown notes: parsing primitives (frontmatter, tags, links), graph
//! construction and traversal (backlinks, connectivity, shortest paths,
//! orphans), near-duplicate detection, and the vault facade that keeps the
//! caches consistent with its own mutations.

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod parser;
pub mod similarity;
pub mod store;
pub mod vault;

pub use cache::{BoundedCache, CacheStats};
pub use config::{CacheLimits, SimilarityConfig, VaultConfig};
pub use error::{AxonError, Result};
pub use graph::{GraphStatistics, LinkGraph};
pub use model::{normalize_note_path, Frontmatter, ItemError, Link, LinkKind, Note, Report};
pub use similarity::{DuplicateGroup, SimilarityEngine};
pub use store::NoteStore;
pub use vault::Vault;
