//! Graph index: typed nodes, labeled edges, short-range reachability.
//!
//! The graph is a flat set of `(from, relation, to)` triples with adjacency
//! maps in both directions. Nodes are logical: created on demand when an
//! edge references them, identified solely by their `Type:Name` label.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::types::Relation;

#[derive(Default)]
pub struct GraphIndex {
    nodes: HashSet<String>,
    /// from -> set of (relation, to)
    out: HashMap<String, HashSet<(Relation, String)>>,
    /// to -> set of (relation, from)
    inbound: HashMap<String, HashSet<(Relation, String)>>,
    edge_count: usize,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn has_node(&self, label: &str) -> bool {
        self.nodes.contains(label)
    }

    pub fn has_edge(&self, from: &str, relation: Relation, to: &str) -> bool {
        self.out
            .get(from)
            .is_some_and(|edges| edges.contains(&(relation, to.to_string())))
    }

    /// Add a node. Idempotent.
    pub fn add_node(&mut self, label: &str) {
        self.nodes.insert(label.to_string());
    }

    /// Add an edge, creating endpoint nodes on demand. Idempotent: inserting
    /// an existing triple is a no-op.
    pub fn add_edge(&mut self, from: &str, relation: Relation, to: &str) {
        self.add_node(from);
        self.add_node(to);

        let inserted = self
            .out
            .entry(from.to_string())
            .or_default()
            .insert((relation, to.to_string()));

        if inserted {
            self.inbound
                .entry(to.to_string())
                .or_default()
                .insert((relation, from.to_string()));
            self.edge_count += 1;
        }
    }

    /// Remove a node and every incident edge, in both directions.
    pub fn remove_node(&mut self, label: &str) {
        if !self.nodes.remove(label) {
            return;
        }

        if let Some(edges) = self.out.remove(label) {
            for (relation, to) in edges {
                if let Some(rev) = self.inbound.get_mut(&to) {
                    rev.remove(&(relation, label.to_string()));
                }
                self.edge_count -= 1;
            }
        }

        if let Some(edges) = self.inbound.remove(label) {
            for (relation, from) in edges {
                if let Some(fwd) = self.out.get_mut(&from) {
                    if fwd.remove(&(relation, label.to_string())) {
                        self.edge_count -= 1;
                    }
                }
            }
        }
    }

    /// One-hop neighbors in either direction, optionally filtered by
    /// relation type.
    pub fn neighbors(&self, label: &str, relations: Option<&[Relation]>) -> BTreeSet<String> {
        let keep = |rel: &Relation| relations.is_none_or(|allowed| allowed.contains(rel));
        let mut result = BTreeSet::new();

        if let Some(edges) = self.out.get(label) {
            for (rel, to) in edges {
                if keep(rel) {
                    result.insert(to.clone());
                }
            }
        }
        if let Some(edges) = self.inbound.get(label) {
            for (rel, from) in edges {
                if keep(rel) {
                    result.insert(from.clone());
                }
            }
        }

        result
    }

    /// Reachability within `max_hops`, ignoring edge direction. Used by the
    /// matchmaker's graph-boost rule.
    pub fn linked(&self, a: &str, b: &str, max_hops: usize) -> bool {
        if !self.nodes.contains(a) || !self.nodes.contains(b) {
            return false;
        }
        if a == b {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::from([a]);
        let mut frontier: VecDeque<(&str, usize)> = VecDeque::from([(a, 0)]);

        while let Some((node, depth)) = frontier.pop_front() {
            if depth == max_hops {
                continue;
            }

            for next in self.adjacent(node) {
                if next == b {
                    return true;
                }
                if visited.insert(next) {
                    frontier.push_back((next, depth + 1));
                }
            }
        }

        false
    }

    fn adjacent<'a>(&'a self, label: &str) -> impl Iterator<Item = &'a str> {
        let fwd = self
            .out
            .get(label)
            .into_iter()
            .flatten()
            .map(|(_, to)| to.as_str());
        let rev = self
            .inbound
            .get(label)
            .into_iter()
            .flatten()
            .map(|(_, from)| from.as_str());
        fwd.chain(rev)
    }

    /// Dump every edge triple, for snapshots.
    pub fn edges(&self) -> Vec<(String, Relation, String)> {
        let mut edges: Vec<_> = self
            .out
            .iter()
            .flat_map(|(from, set)| {
                set.iter()
                    .map(|(rel, to)| (from.clone(), *rel, to.clone()))
            })
            .collect();
        edges.sort();
        edges
    }
}
