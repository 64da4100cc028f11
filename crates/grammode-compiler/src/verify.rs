//! Static no-progress check.
//!
//! Walks every path made of edges that can match without consuming input,
//! tracking the return addresses pushed by calls along the way. A path that
//! comes back to a node without having returned below the depth it first
//! saw it at would repeat forever at runtime, so the grammar is rejected.

use std::collections::HashSet;

use grammode_core::{Edge, Graph, NodeId};

use crate::diagnostics::{DiagnosticKind, Diagnostics};

#[cfg(test)]
#[path = "verify_tests.rs"]
mod verify_tests;

/// Reports every cycle in `graph` that can be traversed without consuming input.
pub fn check_progress(graph: &Graph, diagnostics: &mut Diagnostics) {
    let mut walker = Walker {
        graph,
        max_depth: graph.live_count() * 2,
        path: Vec::new(),
        stack: Vec::new(),
        reported: HashSet::new(),
        visited: HashSet::new(),
        diagnostics,
    };
    for id in graph.live_nodes() {
        walker.walk(id);
    }
}

/// One node on the current path and the call depth it was reached at.
struct Visit {
    node: NodeId,
    depth: usize,
    /// Lowest call depth seen on the path since this visit.
    floor: usize,
}

struct Walker<'g, 'd> {
    graph: &'g Graph,
    max_depth: usize,
    path: Vec<Visit>,
    stack: Vec<NodeId>,
    /// Cycles already reported, as sorted node sets.
    reported: HashSet<Vec<NodeId>>,
    /// `(node, pending returns)` pairs fully explored from some root.
    visited: HashSet<(NodeId, Vec<NodeId>)>,
    diagnostics: &'d mut Diagnostics,
}

impl Walker<'_, '_> {
    fn walk(&mut self, node: NodeId) {
        let depth = self.stack.len();
        if let Some(pos) = self
            .path
            .iter()
            .position(|v| v.node == node && v.floor >= v.depth && v.depth <= depth)
        {
            self.report(pos);
            return;
        }
        if depth > self.max_depth {
            // Calls keep nesting without consuming input: left recursion.
            self.report(0);
            return;
        }
        if !self.visited.insert((node, self.stack.clone())) {
            return;
        }

        self.path.push(Visit {
            node,
            depth,
            floor: depth,
        });
        let graph = self.graph;
        for edge in graph.edges(node) {
            if edge.matcher.is_nullable() {
                self.follow(edge);
            }
        }
        self.path.pop();
    }

    fn follow(&mut self, edge: &Edge) {
        let saved = self.stack.clone();
        for (_, return_to) in edge.calls() {
            self.stack.push(return_to);
        }

        let next = match edge.to {
            Some(to) => Some(to),
            None => self.stack.pop(),
        };
        if let Some(next) = next {
            let depth = self.stack.len();
            for visit in &mut self.path {
                visit.floor = visit.floor.min(depth);
            }
            let floors: Vec<usize> = self.path.iter().map(|v| v.floor).collect();
            self.walk(next);
            for (visit, floor) in self.path.iter_mut().zip(floors) {
                visit.floor = floor;
            }
        }
        // A return with no recorded caller leaves the region this walk can see.

        self.stack = saved;
    }

    fn report(&mut self, from: usize) {
        let nodes: Vec<NodeId> = self.path[from..].iter().map(|v| v.node).collect();
        let mut key = nodes.clone();
        key.sort_unstable();
        key.dedup();
        if !self.reported.insert(key) {
            return;
        }

        let Some(&first) = nodes.first() else {
            return;
        };
        let labels: Vec<&str> = nodes
            .iter()
            .chain(std::iter::once(&first))
            .map(|&id| self.graph.node(id).label.as_str())
            .collect();
        self.diagnostics
            .report(DiagnosticKind::NoProgressCycle, self.graph.node(first).span)
            .message(labels.join(" → "))
            .emit();
    }
}
