use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::GraphSnapshot;
use crate::model::normalize_note_path;

/// Number of hub documents reported in statistics.
const HUB_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteConnections {
    pub backlinks: Vec<String>,
    pub forward_links: Vec<String>,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedNote {
    pub path: String,
    pub connections: usize,
    pub backlinks: usize,
    pub forward_links: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_notes: usize,
    pub total_links: usize,
    pub orphaned_notes: Vec<String>,
    pub most_connected: Vec<ConnectedNote>,
    pub average_connections: f64,
}

impl GraphSnapshot {
    /// Incoming references, in the order sources were visited during the
    /// build (not sorted).
    pub fn backlinks(&self, path: &str) -> Vec<String> {
        self.backward
            .get(&normalize_note_path(path))
            .cloned()
            .unwrap_or_default()
    }

    /// Outgoing resolved references, in document order.
    pub fn forward_links(&self, path: &str) -> Vec<String> {
        self.forward
            .get(&normalize_note_path(path))
            .cloned()
            .unwrap_or_default()
    }

    /// Documents with no forward links and no backlinks.
    pub fn orphaned_notes(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|path| self.total_degree(path) == 0)
            .cloned()
            .collect()
    }

    /// Breadth-first expansion from `path` up to `depth` hops, a hop being
    /// either link direction. Each reached note is recorded exactly once at
    /// its shortest-hop depth.
    pub fn connections(&self, path: &str, depth: usize) -> BTreeMap<String, NoteConnections> {
        let start = normalize_note_path(path);
        let mut result = BTreeMap::new();
        if !self.nodes.contains_key(&start) {
            return result;
        }

        let mut visited: HashMap<String, usize> = HashMap::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        visited.insert(start.clone(), 0);
        queue.push_back((start, 0));

        while let Some((current, current_depth)) = queue.pop_front() {
            let backlinks = self.backlinks(&current);
            let forward_links = self.forward_links(&current);

            if current_depth < depth {
                for neighbor in backlinks.iter().chain(forward_links.iter()) {
                    if !self.nodes.contains_key(neighbor) {
                        continue;
                    }
                    if !visited.contains_key(neighbor) {
                        visited.insert(neighbor.clone(), current_depth + 1);
                        queue.push_back((neighbor.clone(), current_depth + 1));
                    }
                }
            }

            result.insert(
                current,
                NoteConnections {
                    backlinks,
                    forward_links,
                    depth: current_depth,
                },
            );
        }

        result
    }

    /// Top `limit` documents by total degree, descending; ties keep listing
    /// order (stable sort).
    pub fn most_connected(&self, limit: usize) -> Vec<ConnectedNote> {
        let mut ranked: Vec<ConnectedNote> = self
            .order
            .iter()
            .map(|path| ConnectedNote {
                path: path.clone(),
                connections: self.total_degree(path),
                backlinks: self.in_degree(path),
                forward_links: self.out_degree(path),
            })
            .collect();
        ranked.sort_by(|a, b| b.connections.cmp(&a.connections));
        ranked.truncate(limit);
        ranked
    }

    /// Shortest directed path over forward edges, source and target
    /// inclusive. `source == target` is a single-element path; an unreachable
    /// target yields an empty vec, never an error.
    pub fn shortest_path(&self, source: &str, target: &str) -> Vec<String> {
        let source = normalize_note_path(source);
        let target = normalize_note_path(target);
        if !self.nodes.contains_key(&source) {
            return Vec::new();
        }
        if source == target {
            return vec![source];
        }

        let mut parent: HashMap<String, String> = HashMap::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(source.clone());

        while let Some(current) = queue.pop_front() {
            for next in self.forward_links(&current) {
                if next == source || parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next.clone(), current.clone());
                if next == target {
                    let mut path = vec![target.clone()];
                    let mut cursor = target.clone();
                    while let Some(previous) = parent.get(&cursor) {
                        path.push(previous.clone());
                        cursor = previous.clone();
                    }
                    path.reverse();
                    return path;
                }
                queue.push_back(next);
            }
        }

        Vec::new()
    }

    pub fn statistics(&self) -> GraphStatistics {
        let total_notes = self.note_count();
        let total_links = self.edge_count();
        GraphStatistics {
            total_notes,
            total_links,
            orphaned_notes: self.orphaned_notes(),
            most_connected: self.most_connected(HUB_LIMIT),
            average_connections: if total_notes == 0 {
                0.0
            } else {
                total_links as f64 / total_notes as f64
            },
        }
    }
}
