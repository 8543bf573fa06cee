//! Link-graph construction and traversal over the document set.

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cache::BoundedCache;
use crate::error::Result;
use crate::model::ItemError;
use crate::store::NoteStore;

mod builder;
mod queries;


pub use builder::resolve_link_target;
pub use queries::{ConnectedNote, GraphStatistics, NoteConnections};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub title: String,
    pub tags: Vec<String>,
}

/// An immutable snapshot of the vault's link structure.
///
/// Adjacency values keep insertion order: forward links in document order,
/// backlinks in the order sources were visited during the build.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub(crate) forward: HashMap<String, Vec<String>>,
    pub(crate) backward: HashMap<String, Vec<String>>,
    pub(crate) nodes: HashMap<String, NodeInfo>,
    /// Listing order, used for stable tie-breaking
    pub(crate) order: Vec<String>,
    /// Per-document read/parse failures accumulated during the build
    pub(crate) errors: Vec<ItemError>,
}

impl GraphSnapshot {
    pub fn note_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(|targets| targets.len()).sum()
    }

    pub fn errors(&self) -> &[ItemError] {
        &self.errors
    }

    pub fn out_degree(&self, path: &str) -> usize {
        self.forward.get(path).map(|t| t.len()).unwrap_or(0)
    }

    pub fn in_degree(&self, path: &str) -> usize {
        self.backward.get(path).map(|s| s.len()).unwrap_or(0)
    }

    pub fn total_degree(&self, path: &str) -> usize {
        self.out_degree(path) + self.in_degree(path)
    }
}

/// Explicit lifecycle of the cached graph.
///
/// A vault with zero notes is `Ready` with an empty snapshot, which is not
/// the same thing as `Uninitialized`; an empty-map sentinel cannot tell the
/// two apart.
enum GraphState {
    Uninitialized,
    Ready(GraphSnapshot),
    Stale,
}

/// Lazily built, explicitly invalidated link graph.
///
/// There is no incremental patching: a rename can touch arbitrarily many
/// other documents' outgoing edges, so any mutation moves the state to
/// `Stale` and the next query rebuilds from scratch.
pub struct LinkGraph {
    state: GraphState,
}

impl Default for LinkGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkGraph {
    pub fn new() -> Self {
        Self {
            state: GraphState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, GraphState::Ready(_))
    }

    /// Drop the cached snapshot. Invoked by every mutation path.
    pub fn invalidate(&mut self) {
        if matches!(self.state, GraphState::Ready(_)) {
            debug!("link graph invalidated");
            self.state = GraphState::Stale;
        }
    }

    /// Return the current snapshot, rebuilding it first when the state is
    /// `Uninitialized` or `Stale`.
    pub fn snapshot(
        &mut self,
        store: &NoteStore,
        content_cache: &mut BoundedCache<String>,
    ) -> Result<&GraphSnapshot> {
        if !self.is_ready() {
            let snapshot = builder::build_graph(store, content_cache)?;
            info!(
                "link graph built: {} notes, {} edges, {} errors",
                snapshot.note_count(),
                snapshot.edge_count(),
                snapshot.errors.len()
            );
            self.state = GraphState::Ready(snapshot);
        }
        match &self.state {
            GraphState::Ready(snapshot) => Ok(snapshot),
            _ => unreachable!("graph state is Ready after rebuild"),
        }
    }
}
